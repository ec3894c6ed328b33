use axum::{extract::Extension, http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::entities::user::{self, Entity as UserEntity};
use crate::error::ApiError;
use crate::middleware::auth::generate_token;

pub fn auth_router() -> Router {
    Router::new().route("/auth/token/login", post(login))
}

async fn login(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(config): Extension<Arc<Config>>,
    Json(payload): Json<UserLogin>,
) -> Result<impl IntoResponse, ApiError> {
    let invalid = || ApiError::BadRequest("Unable to log in with provided credentials".into());

    let user = UserEntity::find()
        .filter(user::Column::Email.eq(payload.email.trim()))
        .one(&*db)
        .await?
        .ok_or_else(invalid)?;

    user.check_hash(&payload.password).map_err(|_| invalid())?;

    let token = generate_token(user.id, user.role, &config)
        .map_err(|err| ApiError::TokenGeneration(err.to_string()))?;

    info!(user_id = user.id, "Issued token");
    Ok((StatusCode::OK, Json(json!({ "auth_token": token }))))
}

#[derive(Deserialize)]
struct UserLogin {
    email: String,
    password: String,
}
