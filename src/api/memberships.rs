use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use sea_orm::{
    sea_query::OnConflict, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::info;

use super::representation::ShortRecipe;
use crate::entities::{favorite, recipe, shopping_cart};
use crate::error::ApiError;
use crate::middleware::auth::CurrentUser;

pub fn memberships_router() -> Router {
    Router::new()
        .route(
            "/recipes/:id/favorite",
            post(add_favorite).delete(remove_favorite),
        )
        .route(
            "/recipes/:id/shopping_cart",
            post(add_to_cart).delete(remove_from_cart),
        )
}

/// Per-user recipe collections toggled through the same endpoints shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Membership {
    Favorite,
    ShoppingCart,
}

impl Membership {
    fn label(self) -> &'static str {
        match self {
            Membership::Favorite => "favorites",
            Membership::ShoppingCart => "shopping cart",
        }
    }

    /// Returns false when the pair was already present.
    async fn insert<C: ConnectionTrait>(
        self,
        db: &C,
        user_id: i32,
        recipe_id: i32,
    ) -> Result<bool, DbErr> {
        let inserted = match self {
            Membership::Favorite => {
                favorite::Entity::insert(favorite::ActiveModel {
                    user_id: Set(user_id),
                    recipe_id: Set(recipe_id),
                })
                .on_conflict(
                    OnConflict::columns([favorite::Column::UserId, favorite::Column::RecipeId])
                        .do_nothing()
                        .to_owned(),
                )
                .exec_without_returning(db)
                .await?
            }
            Membership::ShoppingCart => {
                shopping_cart::Entity::insert(shopping_cart::ActiveModel {
                    user_id: Set(user_id),
                    recipe_id: Set(recipe_id),
                })
                .on_conflict(
                    OnConflict::columns([
                        shopping_cart::Column::UserId,
                        shopping_cart::Column::RecipeId,
                    ])
                    .do_nothing()
                    .to_owned(),
                )
                .exec_without_returning(db)
                .await?
            }
        };

        Ok(inserted > 0)
    }

    /// Returns false when there was nothing to remove.
    async fn remove<C: ConnectionTrait>(
        self,
        db: &C,
        user_id: i32,
        recipe_id: i32,
    ) -> Result<bool, DbErr> {
        let result = match self {
            Membership::Favorite => {
                favorite::Entity::delete_many()
                    .filter(favorite::Column::UserId.eq(user_id))
                    .filter(favorite::Column::RecipeId.eq(recipe_id))
                    .exec(db)
                    .await?
            }
            Membership::ShoppingCart => {
                shopping_cart::Entity::delete_many()
                    .filter(shopping_cart::Column::UserId.eq(user_id))
                    .filter(shopping_cart::Column::RecipeId.eq(recipe_id))
                    .exec(db)
                    .await?
            }
        };

        Ok(result.rows_affected > 0)
    }
}

async fn add_favorite(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    current: CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    add(Membership::Favorite, id, &db, current).await
}

async fn remove_favorite(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    current: CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    remove(Membership::Favorite, id, &db, current).await
}

async fn add_to_cart(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    current: CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    add(Membership::ShoppingCart, id, &db, current).await
}

async fn remove_from_cart(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    current: CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    remove(Membership::ShoppingCart, id, &db, current).await
}

async fn add(
    membership: Membership,
    recipe_id: i32,
    db: &DatabaseConnection,
    current: CurrentUser,
) -> Result<(StatusCode, Json<ShortRecipe>), ApiError> {
    let txn = db.begin().await?;
    let recipe = find_recipe(&txn, recipe_id).await?;

    if !membership.insert(&txn, current.id, recipe_id).await? {
        return Err(ApiError::BadRequest(format!(
            "Recipe is already in {}",
            membership.label()
        )));
    }
    txn.commit().await?;

    info!(user_id = current.id, recipe_id, list = membership.label(), "Added recipe");
    Ok((StatusCode::CREATED, Json(ShortRecipe::new(recipe))))
}

async fn remove(
    membership: Membership,
    recipe_id: i32,
    db: &DatabaseConnection,
    current: CurrentUser,
) -> Result<StatusCode, ApiError> {
    let txn = db.begin().await?;
    find_recipe(&txn, recipe_id).await?;

    if !membership.remove(&txn, current.id, recipe_id).await? {
        return Err(ApiError::BadRequest(format!(
            "Recipe is not in {}",
            membership.label()
        )));
    }
    txn.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn find_recipe<C: ConnectionTrait>(db: &C, id: i32) -> Result<recipe::Model, ApiError> {
    recipe::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No recipe with {id} id was found.")))
}
