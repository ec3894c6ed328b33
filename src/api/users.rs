use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use super::representation::{user_view, user_views};
use crate::entities::user::{self, hash_password, Entity as UserEntity, Role};
use crate::error::{conflict_or_db, ensure_valid, ApiError, FieldErrors};
use crate::middleware::auth::{CurrentUser, Viewer};

pub fn users_router() -> Router {
    Router::new()
        .route("/users", get(get_users).post(register_user))
        .route("/users/me", get(get_me))
        .route("/users/set_password", post(set_password))
        .route("/users/:id", get(get_user))
}

async fn get_users(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    viewer: Viewer,
) -> Result<impl IntoResponse, ApiError> {
    let users = UserEntity::find()
        .order_by_asc(user::Column::Id)
        .all(&*db)
        .await?;

    Ok(Json(user_views(&*db, users, viewer.user_id()).await?))
}

async fn get_user(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    viewer: Viewer,
) -> Result<impl IntoResponse, ApiError> {
    let user = UserEntity::find_by_id(id)
        .one(&*db)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No user with {id} id was found.")))?;

    Ok(Json(user_view(&*db, user, viewer.user_id()).await?))
}

async fn get_me(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    current: CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let user = UserEntity::find_by_id(current.id)
        .one(&*db)
        .await?
        .ok_or_else(|| ApiError::NotFound("User no longer exists".into()))?;

    Ok(Json(user_view(&*db, user, Some(current.id)).await?))
}

async fn register_user(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<CreateUser>,
) -> Result<impl IntoResponse, ApiError> {
    let mut errors = FieldErrors::new();
    if payload.username.eq_ignore_ascii_case("me") {
        errors
            .entry("username".into())
            .or_default()
            .push("This username is reserved".into());
    }
    ensure_valid(payload.validate(), errors)?;

    let txn = db.begin().await?;

    let taken = UserEntity::find()
        .filter(
            Condition::any()
                .add(user::Column::Email.eq(payload.email.as_str()))
                .add(user::Column::Username.eq(payload.username.as_str())),
        )
        .all(&txn)
        .await?;
    let mut errors = FieldErrors::new();
    for existing in taken {
        if existing.email == payload.email {
            errors
                .entry("email".into())
                .or_default()
                .push("A user with this email already exists".into());
        }
        if existing.username == payload.username {
            errors
                .entry("username".into())
                .or_default()
                .push("A user with this username already exists".into());
        }
    }
    ensure_valid(Ok(()), errors)?;

    let password =
        hash_password(&payload.password).map_err(|err| ApiError::PasswordHash(err.to_string()))?;

    let new_user = user::ActiveModel {
        email: Set(payload.email),
        username: Set(payload.username),
        first_name: Set(payload.first_name),
        last_name: Set(payload.last_name),
        password: Set(password),
        role: Set(Role::User),
        ..Default::default()
    };

    let created = new_user
        .insert(&txn)
        .await
        .map_err(|err| conflict_or_db(err, "username", "A user with these credentials already exists"))?;
    txn.commit().await?;

    info!(user_id = created.id, username = %created.username, "Registered user");
    let view = user_view(&*db, created, None).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn set_password(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    current: CurrentUser,
    Json(payload): Json<SetPassword>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()?;

    let txn = db.begin().await?;
    let user = UserEntity::find_by_id(current.id)
        .one(&txn)
        .await?
        .ok_or_else(|| ApiError::NotFound("User no longer exists".into()))?;

    if user.check_hash(&payload.current_password).is_err() {
        return Err(ApiError::field("current_password", "Invalid password"));
    }

    let password = hash_password(&payload.new_password)
        .map_err(|err| ApiError::PasswordHash(err.to_string()))?;

    let mut user: user::ActiveModel = user.into();
    user.password = Set(password);
    user.update(&txn).await?;
    txn.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

// Letters, digits and @/./+/-/_ only.
static USERNAME_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\w.@+-]+$").unwrap());

#[derive(Deserialize, Validate)]
struct CreateUser {
    #[validate(
        email(message = "Enter a valid email address"),
        length(max = 254, message = "Email is too long")
    )]
    email: String,
    #[validate(
        length(min = 1, max = 150, message = "Username must be 1 to 150 characters long"),
        regex(
            path = *USERNAME_REGEX,
            message = "Username may contain only letters, digits and @/./+/-/_"
        )
    )]
    username: String,
    #[validate(length(max = 150, message = "First name is too long"))]
    first_name: String,
    #[validate(length(max = 150, message = "Last name is too long"))]
    last_name: String,
    #[validate(length(min = 8, max = 128, message = "Password must be 8 to 128 characters long"))]
    password: String,
}

#[derive(Deserialize, Validate)]
struct SetPassword {
    current_password: String,
    #[validate(length(min = 8, max = 128, message = "Password must be 8 to 128 characters long"))]
    new_password: String,
}
