use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::{
    ActiveModelTrait, DatabaseConnection, EntityTrait, QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use crate::entities::tag::{self, Entity as TagEntity, TagColor};
use crate::error::{conflict_or_db, ApiError};
use crate::middleware::auth::AdminUser;

pub fn tags_router() -> Router {
    Router::new()
        .route("/tags", get(get_tags).post(create_tag))
        .route(
            "/tags/:id",
            get(get_tag).patch(patch_tag).delete(delete_tag),
        )
}

async fn get_tags(
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<impl IntoResponse, ApiError> {
    let tags = TagEntity::find()
        .order_by_asc(tag::Column::Id)
        .all(&*db)
        .await?;

    Ok(Json(tags))
}

async fn get_tag(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<impl IntoResponse, ApiError> {
    let tag = TagEntity::find_by_id(id)
        .one(&*db)
        .await?
        .ok_or_else(|| not_found(id))?;

    Ok(Json(tag))
}

async fn create_tag(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    AdminUser(admin): AdminUser,
    Json(mut payload): Json<CreateTag>,
) -> Result<impl IntoResponse, ApiError> {
    payload.name = payload.name.trim().to_string();
    payload.validate()?;

    let txn = db.begin().await?;
    let new_tag = tag::ActiveModel {
        name: Set(payload.name),
        color: Set(payload.color),
        slug: Set(payload.slug),
        ..Default::default()
    };
    let created = new_tag
        .insert(&txn)
        .await
        .map_err(|err| conflict_or_db(err, "slug", SLUG_TAKEN))?;
    txn.commit().await?;

    info!(tag_id = created.id, admin = admin.id, "Created tag");
    Ok((StatusCode::CREATED, Json(created)))
}

async fn patch_tag(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    _admin: AdminUser,
    Json(mut payload): Json<PatchTag>,
) -> Result<impl IntoResponse, ApiError> {
    payload.name = payload.name.map(|n| n.trim().to_string());
    payload.validate()?;

    let txn = db.begin().await?;
    let mut tag: tag::ActiveModel = TagEntity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| not_found(id))?
        .into();

    if let Some(name) = payload.name {
        tag.name = Set(name);
    }
    if let Some(color) = payload.color {
        tag.color = Set(color);
    }
    if let Some(slug) = payload.slug {
        tag.slug = Set(slug);
    }

    let updated = tag
        .update(&txn)
        .await
        .map_err(|err| conflict_or_db(err, "slug", SLUG_TAKEN))?;
    txn.commit().await?;

    Ok(Json(updated))
}

async fn delete_tag(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    _admin: AdminUser,
) -> Result<impl IntoResponse, ApiError> {
    let result = TagEntity::delete_by_id(id).exec(&*db).await?;
    if result.rows_affected == 0 {
        return Err(not_found(id));
    }

    Ok(StatusCode::NO_CONTENT)
}

fn not_found(id: i32) -> ApiError {
    ApiError::NotFound(format!("No tag with {id} id was found."))
}

const SLUG_TAKEN: &str = "A tag with this slug already exists";

static SLUG_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").unwrap());

#[derive(Deserialize, Validate)]
struct CreateTag {
    #[validate(length(min = 1, max = 200, message = "Name must be 1 to 200 characters long"))]
    name: String,
    color: TagColor,
    #[validate(
        length(min = 1, max = 50, message = "Slug must be 1 to 50 characters long"),
        regex(path = *SLUG_REGEX, message = "Slug may contain only latin letters, digits, '-' and '_'")
    )]
    slug: String,
}

#[derive(Deserialize, Validate)]
struct PatchTag {
    #[validate(length(min = 1, max = 200, message = "Name must be 1 to 200 characters long"))]
    name: Option<String>,
    color: Option<TagColor>,
    #[validate(
        length(min = 1, max = 50, message = "Slug must be 1 to 50 characters long"),
        regex(path = *SLUG_REGEX, message = "Slug may contain only latin letters, digits, '-' and '_'")
    )]
    slug: Option<String>,
}
