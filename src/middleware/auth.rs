use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{DatabaseConnection, EntityTrait};
use serde::{Deserialize, Serialize};
use std::{str::FromStr, sync::Arc};
use thiserror::Error;
use tracing::debug;

use crate::config::Config;
use crate::entities::user::{Entity as UserEntity, Role};
use crate::error::ApiError;

/// Resolves the bearer token, if any, into a [`Viewer`] request extension.
///
/// A request without an `Authorization` header is anonymous. A header that is
/// present but does not carry a valid token is rejected outright.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Response {
    let auth_header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let viewer = match auth_header {
        None => Viewer::Anonymous,
        Some(header) => {
            let token = match header
                .strip_prefix("Bearer ")
                .or_else(|| header.strip_prefix("Token "))
            {
                Some(token) => token.trim(),
                None => {
                    return ApiError::Unauthorized("Malformed authorization header".into())
                        .into_response();
                }
            };

            match validate_token(&state.db, token, &state.config.secret).await {
                Ok(user) => Viewer::Authenticated(user),
                Err(err) => {
                    debug!(error = %err, "Rejected token");
                    return ApiError::Unauthorized(err.to_string()).into_response();
                }
            }
        }
    };

    req.extensions_mut().insert(viewer);
    next.run(req).await
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i32,
    pub role: String,
    pub exp: usize,
}

#[derive(Clone, Debug)]
pub struct AuthState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<Config>,
}

/// Who is making the request.
#[derive(Clone, Debug)]
pub enum Viewer {
    Anonymous,
    Authenticated(CurrentUser),
}

impl Viewer {
    pub fn user_id(&self) -> Option<i32> {
        match self {
            Viewer::Anonymous => None,
            Viewer::Authenticated(user) => Some(user.id),
        }
    }
}

/// An authenticated caller. Extracting it rejects anonymous requests with 401.
#[derive(Clone, Copy, Debug)]
pub struct CurrentUser {
    pub id: i32,
    pub role: Role,
}

/// An authenticated administrator. Other callers get 401 or 403.
#[derive(Clone, Copy, Debug)]
pub struct AdminUser(pub CurrentUser);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Viewer {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<Viewer>()
            .cloned()
            .unwrap_or(Viewer::Anonymous))
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Viewer::from_request_parts(parts, state).await? {
            Viewer::Authenticated(user) => Ok(user),
            Viewer::Anonymous => Err(ApiError::Unauthorized(
                "Authentication credentials were not provided".into(),
            )),
        }
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        if user.role.permits(Role::Admin) {
            Ok(AdminUser(user))
        } else {
            Err(ApiError::Forbidden(
                "You do not have permission to perform this action".into(),
            ))
        }
    }
}

pub fn generate_token(
    user_id: i32,
    role: Role,
    config: &Config,
) -> Result<String, AuthMiddlewareError> {
    let exp = Utc::now()
        .checked_add_signed(Duration::hours(config.token_ttl_hours))
        .ok_or(AuthMiddlewareError::GenerationFail)?
        .timestamp() as usize;

    let claims = Claims {
        user_id,
        role: role.to_string(),
        exp,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(|_| AuthMiddlewareError::GenerationFail)
}

pub async fn validate_token(
    db: &DatabaseConnection,
    token: &str,
    secret: &str,
) -> Result<CurrentUser, AuthMiddlewareError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|_| AuthMiddlewareError::TokenExpired)?
    .claims;

    Role::from_str(&claims.role).map_err(|_| AuthMiddlewareError::ValidationFail)?;

    // The role stored in the database wins over the one baked into the token.
    match UserEntity::find_by_id(claims.user_id).one(db).await {
        Ok(Some(user)) => Ok(CurrentUser {
            id: user.id,
            role: user.role,
        }),
        Ok(None) => Err(AuthMiddlewareError::InvalidUserOrRole),
        Err(_) => Err(AuthMiddlewareError::InternalServerError),
    }
}

#[derive(Error, Debug)]
pub enum AuthMiddlewareError {
    #[error("Invalid user id or role")]
    InvalidUserOrRole,
    #[error("Token expired or invalid")]
    TokenExpired,
    #[error("Failed to validate token")]
    ValidationFail,
    #[error("Failed to generate token")]
    GenerationFail,
    #[error("Internal server error")]
    InternalServerError,
}
