//! Session-based authentication.
//!
//! Login issues an opaque random bearer token. Only its SHA-256 digest is
//! persisted in `sessions`, together with an expiry that is checked every
//! time the token is presented.

pub mod password;

use crate::{
    entities::{session, user},
    errors::{ApiError, ServiceError},
    services::{accounts::UserProfile, is_unique_violation},
};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, DatabaseConnection,
    EntityTrait, QueryFilter, Set,
};
use serde::Serialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

const TOKEN_LENGTH: usize = 48;
const INVALID_CREDENTIALS: &str = "invalid username or password";

/// Identity attached to a request by [`auth_middleware`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: i32,
    pub session_id: i32,
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or(ApiError::Unauthorized)
    }
}

#[derive(Clone, Debug)]
pub struct RegisterInput {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: String,
}

#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct LoginResult {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserProfile,
}

fn generate_token() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[derive(Clone)]
pub struct AuthService {
    db: Arc<DatabaseConnection>,
    session_ttl: Duration,
}

impl AuthService {
    pub fn new(db: Arc<DatabaseConnection>, session_ttl: Duration) -> Self {
        Self { db, session_ttl }
    }

    /// Creates an account with an Argon2id password hash.
    ///
    /// # Errors
    ///
    /// * `ServiceError::ValidationError` - neither email nor phone given
    /// * `ServiceError::Conflict` - email or phone already registered
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn register(&self, input: RegisterInput) -> Result<UserProfile, ServiceError> {
        if input.email.is_none() && input.phone.is_none() {
            return Err(ServiceError::ValidationError(
                "either email or phone is required".to_string(),
            ));
        }

        let password_hash = password::hash_password(&input.password)?;
        let user = user::ActiveModel {
            id: NotSet,
            name: Set(input.name),
            email: Set(input.email),
            phone: Set(input.phone),
            password_hash: Set(password_hash),
            address: Set(json!([])),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(&*self.db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ServiceError::Conflict("email or phone already registered".to_string())
            } else {
                ServiceError::store("insert_user", e)
            }
        })?;

        info!(user_id = user.id, "user registered");
        Ok(UserProfile::from(&user))
    }

    /// Verifies credentials and opens a session.
    ///
    /// `identifier` is matched against both email and phone.
    #[instrument(skip(self, password))]
    pub async fn login(&self, identifier: &str, password: &str) -> Result<LoginResult, ServiceError> {
        let user = user::Entity::find()
            .filter(
                Condition::any()
                    .add(user::Column::Email.eq(identifier))
                    .add(user::Column::Phone.eq(identifier)),
            )
            .one(&*self.db)
            .await
            .map_err(|e| ServiceError::store("load_user_for_login", e))?
            .ok_or_else(|| ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

        if !password::verify_password(password, &user.password_hash)? {
            warn!(user_id = user.id, "login rejected");
            return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }

        let now = Utc::now();
        session::Entity::delete_many()
            .filter(session::Column::UserId.eq(user.id))
            .filter(session::Column::ExpiresAt.lte(now))
            .exec(&*self.db)
            .await
            .map_err(|e| ServiceError::store("purge_expired_sessions", e))?;

        let ttl = chrono::Duration::from_std(self.session_ttl)
            .map_err(|e| ServiceError::InternalError(e.to_string()))?;
        let token = generate_token();
        let session = session::ActiveModel {
            id: NotSet,
            user_id: Set(user.id),
            token_hash: Set(hash_token(&token)),
            expires_at: Set(now + ttl),
            created_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .map_err(|e| ServiceError::store("insert_session", e))?;

        info!(user_id = user.id, session_id = session.id, "session opened");
        Ok(LoginResult {
            token,
            expires_at: session.expires_at,
            user: UserProfile::from(&user),
        })
    }

    /// Ends a session. Ending an unknown session is not an error.
    #[instrument(skip(self))]
    pub async fn logout(&self, session_id: i32) -> Result<(), ServiceError> {
        session::Entity::delete_by_id(session_id)
            .exec(&*self.db)
            .await
            .map_err(|e| ServiceError::store("delete_session", e))?;
        debug!(session_id, "session closed");
        Ok(())
    }

    /// Resolves a bearer token to its user. Expired sessions are deleted.
    pub async fn verify_token(&self, token: &str) -> Result<AuthenticatedUser, ServiceError> {
        let session = session::Entity::find()
            .filter(session::Column::TokenHash.eq(hash_token(token)))
            .one(&*self.db)
            .await
            .map_err(|e| ServiceError::store("load_session", e))?
            .ok_or_else(|| ServiceError::Unauthorized("invalid session token".to_string()))?;

        if session.is_expired(Utc::now()) {
            session::Entity::delete_by_id(session.id)
                .exec(&*self.db)
                .await
                .map_err(|e| ServiceError::store("delete_expired_session", e))?;
            return Err(ServiceError::Unauthorized("session expired".to_string()));
        }

        Ok(AuthenticatedUser {
            user_id: session.user_id,
            session_id: session.id,
        })
    }
}

/// Rejects requests without a valid bearer session and attaches
/// [`AuthenticatedUser`] to the request extensions.
pub async fn auth_middleware(
    State(auth): State<AuthService>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(request.headers()).map(str::to_owned) else {
        return ApiError::Unauthorized.into_response();
    };

    match auth.verify_token(&token).await {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    }
}
