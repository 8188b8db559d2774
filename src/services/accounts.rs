use crate::{
    auth::password::{hash_password, verify_password},
    entities::user,
    errors::ServiceError,
    services::is_unique_violation,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend,
    EntityTrait, QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;

/// Public view of an account; never carries the password hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct UserProfile {
    pub id: i32,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub addresses: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&user::Model> for UserProfile {
    fn from(user: &user::Model) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            addresses: user.addresses(),
            created_at: user.created_at,
        }
    }
}

/// Profile changes. Changing the password requires the current one.
#[derive(Clone, Debug, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub old_password: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Clone)]
pub struct AccountService {
    db: Arc<DatabaseConnection>,
}

impl AccountService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn detail(&self, user_id: i32) -> Result<UserProfile, ServiceError> {
        let user = find_user(&*self.db, user_id, false).await?;
        Ok(UserProfile::from(&user))
    }

    #[instrument(skip(self, update))]
    pub async fn update_profile(
        &self,
        user_id: i32,
        update: ProfileUpdate,
    ) -> Result<UserProfile, ServiceError> {
        let user = find_user(&*self.db, user_id, false).await?;

        let new_hash = match update.new_password.as_deref() {
            Some(new_password) => {
                let old_password = update.old_password.as_deref().ok_or_else(|| {
                    ServiceError::ValidationError(
                        "old_password is required to change the password".to_string(),
                    )
                })?;
                if !verify_password(old_password, &user.password_hash)? {
                    return Err(ServiceError::Unauthorized(
                        "old password does not match".to_string(),
                    ));
                }
                Some(hash_password(new_password)?)
            }
            None => None,
        };

        let mut active: user::ActiveModel = user.into();
        if let Some(name) = update.name {
            active.name = Set(name);
        }
        if let Some(email) = update.email {
            active.email = Set(Some(email));
        }
        if let Some(phone) = update.phone {
            active.phone = Set(Some(phone));
        }
        if let Some(hash) = new_hash {
            active.password_hash = Set(hash);
        }
        active.updated_at = Set(Some(Utc::now()));

        let user = active.update(&*self.db).await.map_err(|e| {
            if is_unique_violation(&e) {
                ServiceError::Conflict("email or phone already registered".to_string())
            } else {
                ServiceError::store("update_user", e)
            }
        })?;

        info!(user_id, "profile updated");
        Ok(UserProfile::from(&user))
    }

    pub async fn list_addresses(&self, user_id: i32) -> Result<Vec<String>, ServiceError> {
        Ok(find_user(&*self.db, user_id, false).await?.addresses())
    }

    /// Appends an address; the first address ever added is the default.
    #[instrument(skip(self, address))]
    pub async fn add_address(
        &self,
        user_id: i32,
        address: String,
    ) -> Result<Vec<String>, ServiceError> {
        self.modify_addresses(user_id, move |addresses| {
            addresses.push(address);
            Ok(())
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn delete_address(
        &self,
        user_id: i32,
        index: usize,
    ) -> Result<Vec<String>, ServiceError> {
        self.modify_addresses(user_id, move |addresses| {
            if index >= addresses.len() {
                return Err(ServiceError::NotFound(format!(
                    "address {} not found",
                    index
                )));
            }
            addresses.remove(index);
            Ok(())
        })
        .await
    }

    /// Address at `index`, falling back to the first one.
    pub async fn address_at(&self, user_id: i32, index: usize) -> Result<String, ServiceError> {
        let addresses = self.list_addresses(user_id).await?;
        addresses
            .get(index)
            .or_else(|| addresses.first())
            .cloned()
            .ok_or_else(|| ServiceError::NotFound("user has no saved address".to_string()))
    }

    async fn modify_addresses<F>(&self, user_id: i32, change: F) -> Result<Vec<String>, ServiceError>
    where
        F: FnOnce(&mut Vec<String>) -> Result<(), ServiceError>,
    {
        let txn: DatabaseTransaction = self
            .db
            .begin()
            .await
            .map_err(|e| ServiceError::store("begin_address_update", e))?;

        let user = find_user(&txn, user_id, true).await?;
        let mut addresses = user.addresses();
        change(&mut addresses)?;

        let mut active: user::ActiveModel = user.into();
        active.address = Set(json!(addresses));
        active.updated_at = Set(Some(Utc::now()));
        active
            .update(&txn)
            .await
            .map_err(|e| ServiceError::store("update_addresses", e))?;

        txn.commit()
            .await
            .map_err(|e| ServiceError::store("commit_address_update", e))?;

        info!(user_id, count = addresses.len(), "addresses updated");
        Ok(addresses)
    }
}

async fn find_user<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    for_update: bool,
) -> Result<user::Model, ServiceError> {
    let mut query = user::Entity::find_by_id(user_id);
    if for_update && conn.get_database_backend() == DbBackend::Postgres {
        query = query.lock_exclusive();
    }
    query
        .one(conn)
        .await
        .map_err(|e| ServiceError::store("load_user", e))?
        .ok_or_else(|| ServiceError::NotFound(format!("user {} not found", user_id)))
}
