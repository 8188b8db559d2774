use crate::{
    db::with_deadline,
    entities::{order, order_item, product, user},
    errors::ServiceError,
    services::is_lock_contention,
};
use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr,
    ActiveModelTrait,
    ActiveValue::{NotSet, Set},
    ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
    time::Duration,
};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

/// Immutable view of one committed order line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OrderLineSnapshot {
    pub product_id: i32,
    pub product_name: String,
    pub image: Option<String>,
    pub quantity: i32,
    #[schema(value_type = String, example = "200.00")]
    pub subtotal_price: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub order_id: i32,
    pub items: Vec<OrderLineSnapshot>,
    pub shipping_address: Option<String>,
    #[schema(value_type = String, example = "250.00")]
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Converts pending cart lines into a committed order.
///
/// The whole conversion runs in one transaction bounded by a deadline:
///
/// 1. select the user's pending lines for the requested products and total them
/// 2. snapshot the shipping address from the user's address list
/// 3. insert the order row
/// 4. attach each selected line to the order, guarded by `order_id IS NULL`
/// 5. re-read the attached lines and check they add up to the order total
/// 6. commit
///
/// Any failure, including the deadline expiring, rolls back every step so no
/// order row exists and every line stays pending. When two checkouts race for
/// the same lines exactly one of them attaches each line; the other sees an
/// empty selection or a conflict.
#[derive(Clone)]
pub struct OrderBuilder {
    db: Arc<DatabaseConnection>,
    deadline: Duration,
}

impl OrderBuilder {
    pub fn new(db: Arc<DatabaseConnection>, deadline: Duration) -> Self {
        Self { db, deadline }
    }

    /// Creates an order from the user's pending lines for `product_ids`.
    ///
    /// Products without a pending line are ignored; lines for products not in
    /// `product_ids` stay in the cart. `address_index` selects the shipping
    /// address and falls back to the first address when out of range.
    ///
    /// # Errors
    ///
    /// * `ServiceError::EmptyOrder` - nothing in the cart matches `product_ids`
    /// * `ServiceError::NotFound` - the user does not exist
    /// * `ServiceError::Conflict` - a concurrent checkout took one of the lines
    ///   or held the lock the checkout needed
    /// * `ServiceError::Timeout` - the transaction did not finish in time
    #[instrument(skip(self, product_ids), fields(products = product_ids.len()))]
    pub async fn create_order(
        &self,
        user_id: i32,
        product_ids: &[i32],
        address_index: Option<usize>,
    ) -> Result<OrderResponse, ServiceError> {
        let product_ids: Vec<i32> = product_ids
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        if product_ids.is_empty() {
            return Err(ServiceError::EmptyOrder(
                "no products were selected for checkout".to_string(),
            ));
        }

        let result = with_deadline(&self.db, self.deadline, "create_order", move |txn| {
            Box::pin(async move {
                let lines = select_pending(txn, user_id, &product_ids).await?;
                finish_order(txn, user_id, lines, address_index).await
            })
        })
        .await
        .map_err(|err| match err {
            ServiceError::DatabaseError(e) if is_lock_contention(&e) => ServiceError::Conflict(
                "cart lines are being checked out concurrently".to_string(),
            ),
            other => other,
        });

        match &result {
            Ok(order) => {
                counter!("storefront_checkout.orders_created", 1);
                info!(
                    order_id = order.order_id,
                    user_id,
                    lines = order.items.len(),
                    total = %order.total_amount,
                    "order created"
                );
            }
            Err(err) => {
                counter!("storefront_checkout.failed", 1);
                warn!(user_id, error = %err, "checkout failed");
            }
        }

        result
    }
}

/// Pending lines of `user_id` for `product_ids`, locked on Postgres.
async fn select_pending(
    txn: &DatabaseTransaction,
    user_id: i32,
    product_ids: &[i32],
) -> Result<Vec<order_item::Model>, ServiceError> {
    let mut pending = order_item::Entity::find()
        .filter(order_item::Column::UserId.eq(user_id))
        .filter(order_item::Column::OrderId.is_null())
        .filter(order_item::Column::ProductId.is_in(product_ids.iter().copied()))
        .order_by_asc(order_item::Column::Id);
    if txn.get_database_backend() == DbBackend::Postgres {
        pending = pending.lock_exclusive();
    }
    let lines = pending
        .all(txn)
        .await
        .map_err(|e| ServiceError::store("select_pending_lines", e))?;

    if lines.is_empty() {
        return Err(ServiceError::EmptyOrder(
            "no pending cart lines match the requested products".to_string(),
        ));
    }
    Ok(lines)
}

/// Turns the selected `lines` into an order: address snapshot, order row,
/// guarded attach and the final total check.
async fn finish_order(
    txn: &DatabaseTransaction,
    user_id: i32,
    lines: Vec<order_item::Model>,
    address_index: Option<usize>,
) -> Result<OrderResponse, ServiceError> {
    let total: Decimal = lines
        .iter()
        .map(|line| line.price * Decimal::from(line.quantity))
        .sum();

    let products: HashMap<i32, product::Model> = product::Entity::find()
        .filter(product::Column::Id.is_in(lines.iter().map(|line| line.product_id)))
        .all(txn)
        .await
        .map_err(|e| ServiceError::store("load_line_products", e))?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    // shipping address snapshot
    let user = user::Entity::find_by_id(user_id)
        .one(txn)
        .await
        .map_err(|e| ServiceError::store("load_user", e))?
        .ok_or_else(|| ServiceError::NotFound(format!("user {} not found", user_id)))?;
    let shipping_address = pick_address(&user.addresses(), address_index);

    // order row
    let order = order::ActiveModel {
        id: NotSet,
        user_id: Set(user_id),
        total_amount: Set(total),
        shipping_address: Set(shipping_address.clone()),
        created_at: Set(Utc::now()),
    }
    .insert(txn)
    .await
    .map_err(|e| ServiceError::store("insert_order", e))?;

    // attach lines
    for line in &lines {
        let product = products.get(&line.product_id);
        let res = order_item::Entity::update_many()
            .col_expr(order_item::Column::OrderId, Expr::value(order.id))
            .col_expr(
                order_item::Column::ProductName,
                Expr::value(product.map(|p| p.name.clone())),
            )
            .col_expr(
                order_item::Column::ProductImage,
                Expr::value(product.and_then(product::Model::thumbnail)),
            )
            .filter(order_item::Column::Id.eq(line.id))
            .filter(order_item::Column::OrderId.is_null())
            .exec(txn)
            .await
            .map_err(|e| ServiceError::store("attach_order_line", e))?;

        if res.rows_affected != 1 {
            return Err(ServiceError::Conflict(format!(
                "cart line {} was checked out concurrently",
                line.id
            )));
        }
    }

    // materialize and verify
    let attached = order_item::Entity::find()
        .filter(order_item::Column::OrderId.eq(order.id))
        .order_by_asc(order_item::Column::Id)
        .all(txn)
        .await
        .map_err(|e| ServiceError::store("read_order_lines", e))?;

    let items: Vec<OrderLineSnapshot> = attached.into_iter().map(snapshot).collect();
    let attached_total: Decimal = items.iter().map(|item| item.subtotal_price).sum();

    if items.len() != lines.len() || attached_total != total {
        return Err(ServiceError::Conflict(format!(
            "order {} lines total {} but {} was selected",
            order.id, attached_total, total
        )));
    }

    Ok(OrderResponse {
        order_id: order.id,
        items,
        shipping_address,
        total_amount: order.total_amount,
        created_at: order.created_at,
    })
}

fn snapshot(line: order_item::Model) -> OrderLineSnapshot {
    OrderLineSnapshot {
        product_id: line.product_id,
        product_name: line.product_name.unwrap_or_default(),
        image: line.product_image,
        quantity: line.quantity,
        subtotal_price: line.price * Decimal::from(line.quantity),
    }
}

/// Address at `index`, else the first address, else none.
fn pick_address(addresses: &[String], index: Option<usize>) -> Option<String> {
    index
        .and_then(|i| addresses.get(i))
        .or_else(|| addresses.first())
        .cloned()
}
