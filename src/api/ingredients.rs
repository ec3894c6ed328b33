use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use crate::entities::ingredient::{self, Entity as IngredientEntity};
use crate::error::{conflict_or_db, ApiError};
use crate::middleware::auth::AdminUser;

pub fn ingredients_router() -> Router {
    Router::new()
        .route("/ingredients", get(get_ingredients).post(create_ingredient))
        .route(
            "/ingredients/:id",
            get(get_ingredient)
                .patch(patch_ingredient)
                .delete(delete_ingredient),
        )
}

async fn get_ingredients(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Query(query): Query<IngredientsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let mut finder = IngredientEntity::find();

    if let Some(name) = query.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        finder = finder.filter(ingredient::Column::Name.starts_with(name));
    }

    let ingredients = finder
        .order_by_asc(ingredient::Column::Name)
        .order_by_asc(ingredient::Column::MeasurementUnit)
        .all(&*db)
        .await?;

    Ok(Json(ingredients))
}

async fn get_ingredient(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<impl IntoResponse, ApiError> {
    let ingredient = IngredientEntity::find_by_id(id)
        .one(&*db)
        .await?
        .ok_or_else(|| not_found(id))?;

    Ok(Json(ingredient))
}

async fn create_ingredient(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    AdminUser(admin): AdminUser,
    Json(payload): Json<CreateIngredient>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = payload.trimmed();
    payload.validate()?;

    let txn = db.begin().await?;
    let new_ingredient = ingredient::ActiveModel {
        name: Set(payload.name),
        measurement_unit: Set(payload.measurement_unit),
        ..Default::default()
    };
    let created = new_ingredient
        .insert(&txn)
        .await
        .map_err(|err| conflict_or_db(err, "name", DUPLICATE))?;
    txn.commit().await?;

    info!(ingredient_id = created.id, admin = admin.id, "Created ingredient");
    Ok((StatusCode::CREATED, Json(created)))
}

async fn patch_ingredient(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    _admin: AdminUser,
    Json(payload): Json<PatchIngredient>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = payload.trimmed();
    payload.validate()?;

    let txn = db.begin().await?;
    let mut ingredient: ingredient::ActiveModel = IngredientEntity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| not_found(id))?
        .into();

    if let Some(name) = payload.name {
        ingredient.name = Set(name);
    }
    if let Some(unit) = payload.measurement_unit {
        ingredient.measurement_unit = Set(unit);
    }

    let updated = ingredient
        .update(&txn)
        .await
        .map_err(|err| conflict_or_db(err, "name", DUPLICATE))?;
    txn.commit().await?;

    Ok(Json(updated))
}

async fn delete_ingredient(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    _admin: AdminUser,
) -> Result<impl IntoResponse, ApiError> {
    let result = IngredientEntity::delete_by_id(id).exec(&*db).await?;
    if result.rows_affected == 0 {
        return Err(not_found(id));
    }

    Ok(StatusCode::NO_CONTENT)
}

fn not_found(id: i32) -> ApiError {
    ApiError::NotFound(format!("No ingredient with {id} id was found."))
}

const DUPLICATE: &str = "An ingredient with this name and measurement unit already exists";

#[derive(Deserialize)]
struct IngredientsQuery {
    name: Option<String>,
}

#[derive(Deserialize, Validate)]
struct CreateIngredient {
    #[validate(length(min = 1, max = 256, message = "Name must be 1 to 256 characters long"))]
    name: String,
    #[validate(length(min = 1, max = 64, message = "Unit must be 1 to 64 characters long"))]
    measurement_unit: String,
}

impl CreateIngredient {
    fn trimmed(self) -> Self {
        CreateIngredient {
            name: self.name.trim().to_string(),
            measurement_unit: self.measurement_unit.trim().to_string(),
        }
    }
}

#[derive(Deserialize, Validate)]
struct PatchIngredient {
    #[validate(length(min = 1, max = 256, message = "Name must be 1 to 256 characters long"))]
    name: Option<String>,
    #[validate(length(min = 1, max = 64, message = "Unit must be 1 to 64 characters long"))]
    measurement_unit: Option<String>,
}

impl PatchIngredient {
    fn trimmed(self) -> Self {
        PatchIngredient {
            name: self.name.map(|n| n.trim().to_string()),
            measurement_unit: self.measurement_unit.map(|u| u.trim().to_string()),
        }
    }
}
