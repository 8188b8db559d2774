use crate::{
    entities::{product, wishlist},
    errors::ServiceError,
    services::is_unique_violation,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, Set,
};
use std::sync::Arc;
use tracing::{info, instrument};

#[derive(Clone)]
pub struct WishlistService {
    db: Arc<DatabaseConnection>,
}

impl WishlistService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Saves `product_id` to the user's wishlist.
    ///
    /// # Errors
    ///
    /// * `ServiceError::NotFound` - unknown product
    /// * `ServiceError::Conflict` - the product is already on the wishlist
    #[instrument(skip(self))]
    pub async fn add(&self, user_id: i32, product_id: i32) -> Result<wishlist::Model, ServiceError> {
        let exists = product::Entity::find_by_id(product_id)
            .count(&*self.db)
            .await
            .map_err(|e| ServiceError::store("check_product", e))?;
        if exists == 0 {
            return Err(ServiceError::NotFound(format!(
                "product {} not found",
                product_id
            )));
        }

        let entry = wishlist::ActiveModel {
            id: NotSet,
            user_id: Set(user_id),
            product_id: Set(product_id),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ServiceError::Conflict(format!(
                    "product {} is already on the wishlist",
                    product_id
                ))
            } else {
                ServiceError::store("insert_wishlist", e)
            }
        })?;

        info!(wishlist_id = entry.id, "wishlist entry added");
        Ok(entry)
    }

    /// Removes a wishlist entry owned by the user.
    #[instrument(skip(self))]
    pub async fn remove(&self, wishlist_id: i32, user_id: i32) -> Result<(), ServiceError> {
        let res = wishlist::Entity::delete_many()
            .filter(wishlist::Column::Id.eq(wishlist_id))
            .filter(wishlist::Column::UserId.eq(user_id))
            .exec(&*self.db)
            .await
            .map_err(|e| ServiceError::store("delete_wishlist", e))?;

        if res.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "wishlist entry {} not found",
                wishlist_id
            )));
        }
        Ok(())
    }
}
