use crate::{
    entities::{order_item, product},
    errors::ServiceError,
    services::pricing::PricingService,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, OnConflict},
    ActiveValue::{NotSet, Set},
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;

/// Pending cart line joined with its product's display data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct CartLineView {
    pub id: i32,
    pub product_id: i32,
    pub product_name: String,
    pub image: Option<String>,
    pub quantity: i32,
    #[schema(value_type = String, example = "80.00")]
    pub price: Decimal,
    #[schema(value_type = String, example = "160.00")]
    pub total: Decimal,
}

/// Pending line items per user.
///
/// A line is pending while its `order_id` is null. There is at most one
/// pending line per (user, product), enforced by a partial unique index, so
/// repeated adds merge into the existing line instead of creating new ones.
///
/// # Examples
///
/// ```ignore
/// let cart = CartService::new(db.clone(), pricing);
///
/// cart.add_line(user_id, lamp_id).await?;
/// cart.add_line(user_id, lamp_id).await?; // quantity is now 2
/// cart.update_quantity(user_id, lamp_id, 0).await?; // line removed
/// ```
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    pricing: PricingService,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>, pricing: PricingService) -> Self {
        Self { db, pricing }
    }

    /// Adds one unit of `product_id` to the user's cart.
    ///
    /// The unit price is resolved now and stored on a new line. When a pending
    /// line already exists it is incremented in the same statement and keeps
    /// the price captured when it was created.
    ///
    /// # Returns
    ///
    /// * `Ok(order_item::Model)` - the pending line after the add
    /// * `Err(ServiceError::NotFound)` - the product does not exist
    #[instrument(skip(self))]
    pub async fn add_line(
        &self,
        user_id: i32,
        product_id: i32,
    ) -> Result<order_item::Model, ServiceError> {
        let unit_price = self.pricing.resolve_unit_price(product_id).await?;

        let line = order_item::ActiveModel {
            id: NotSet,
            user_id: Set(user_id),
            product_id: Set(product_id),
            quantity: Set(1),
            price: Set(unit_price),
            total: Set(unit_price),
            order_id: Set(None),
            product_name: Set(None),
            product_image: Set(None),
            created_at: Set(Utc::now()),
        };

        let merge = OnConflict::columns([order_item::Column::UserId, order_item::Column::ProductId])
            .target_and_where(Expr::col(order_item::Column::OrderId).is_null())
            .value(
                order_item::Column::Quantity,
                Expr::col((order_item::Entity, order_item::Column::Quantity)).add(1),
            )
            .value(
                order_item::Column::Total,
                Expr::cust(r#"("order_items"."quantity" + 1) * "order_items"."price""#),
            )
            .to_owned();

        let line = order_item::Entity::insert(line)
            .on_conflict(merge)
            .exec_with_returning(&*self.db)
            .await
            .map_err(|e| ServiceError::store("upsert_cart_line", e))?;

        info!(
            line_id = line.id,
            quantity = line.quantity,
            "cart line added"
        );
        Ok(line)
    }

    /// Sets the quantity of the user's pending line for `product_id`.
    ///
    /// A quantity of zero removes the line and returns `None`. The total is
    /// recomputed from the stored unit price in the same statement.
    ///
    /// # Errors
    ///
    /// * `ServiceError::ValidationError` - negative quantity
    /// * `ServiceError::NotFound` - no pending line for this product
    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        user_id: i32,
        product_id: i32,
        quantity: i32,
    ) -> Result<Option<order_item::Model>, ServiceError> {
        if quantity < 0 {
            return Err(ServiceError::ValidationError(
                "quantity must not be negative".to_string(),
            ));
        }

        if quantity == 0 {
            let res = order_item::Entity::delete_many()
                .filter(order_item::Column::UserId.eq(user_id))
                .filter(order_item::Column::ProductId.eq(product_id))
                .filter(order_item::Column::OrderId.is_null())
                .exec(&*self.db)
                .await
                .map_err(|e| ServiceError::store("delete_cart_line", e))?;

            if res.rows_affected == 0 {
                return Err(ServiceError::NotFound(format!(
                    "no cart line for product {}",
                    product_id
                )));
            }
            info!(product_id, "cart line removed by zero quantity");
            return Ok(None);
        }

        let updated = order_item::Entity::update_many()
            .col_expr(order_item::Column::Quantity, Expr::value(quantity))
            .col_expr(
                order_item::Column::Total,
                Expr::col(order_item::Column::Price).mul(quantity),
            )
            .filter(order_item::Column::UserId.eq(user_id))
            .filter(order_item::Column::ProductId.eq(product_id))
            .filter(order_item::Column::OrderId.is_null())
            .exec_with_returning(&*self.db)
            .await
            .map_err(|e| ServiceError::store("update_cart_quantity", e))?;

        let line = updated.into_iter().next().ok_or_else(|| {
            ServiceError::NotFound(format!("no cart line for product {}", product_id))
        })?;

        info!(line_id = line.id, quantity, "cart quantity updated");
        Ok(Some(line))
    }

    /// Deletes a pending line owned by the user.
    #[instrument(skip(self))]
    pub async fn delete_line(&self, line_id: i32, user_id: i32) -> Result<(), ServiceError> {
        let res = order_item::Entity::delete_many()
            .filter(order_item::Column::Id.eq(line_id))
            .filter(order_item::Column::UserId.eq(user_id))
            .filter(order_item::Column::OrderId.is_null())
            .exec(&*self.db)
            .await
            .map_err(|e| ServiceError::store("delete_cart_line", e))?;

        if res.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "cart line {} not found",
                line_id
            )));
        }

        info!(line_id, "cart line deleted");
        Ok(())
    }

    /// Pending lines with product name and thumbnail, oldest first.
    #[instrument(skip(self))]
    pub async fn list_lines(&self, user_id: i32) -> Result<Vec<CartLineView>, ServiceError> {
        let rows = order_item::Entity::find()
            .filter(order_item::Column::UserId.eq(user_id))
            .filter(order_item::Column::OrderId.is_null())
            .find_also_related(product::Entity)
            .order_by_asc(order_item::Column::Id)
            .all(&*self.db)
            .await
            .map_err(|e| ServiceError::store("list_cart_lines", e))?;

        Ok(rows
            .into_iter()
            .map(|(line, product)| CartLineView {
                id: line.id,
                product_id: line.product_id,
                product_name: product
                    .as_ref()
                    .map(|p| p.name.clone())
                    .unwrap_or_default(),
                image: product.as_ref().and_then(product::Model::thumbnail),
                quantity: line.quantity,
                price: line.price,
                total: line.total,
            })
            .collect())
    }

    /// Number of pending lines, not units.
    #[instrument(skip(self))]
    pub async fn count_lines(&self, user_id: i32) -> Result<u64, ServiceError> {
        order_item::Entity::find()
            .filter(order_item::Column::UserId.eq(user_id))
            .filter(order_item::Column::OrderId.is_null())
            .count(&*self.db)
            .await
            .map_err(|e| ServiceError::store("count_cart_lines", e))
    }
}
