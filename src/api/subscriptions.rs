use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use sea_orm::{
    sea_query::OnConflict, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    Set, TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use super::representation::subscription_views;
use crate::entities::{follow, user};
use crate::error::ApiError;
use crate::middleware::auth::CurrentUser;

pub fn subscriptions_router() -> Router {
    Router::new()
        .route("/users/subscriptions", get(get_subscriptions))
        .route("/users/:id/subscribe", post(subscribe).delete(unsubscribe))
}

async fn get_subscriptions(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    current: CurrentUser,
    Query(query): Query<RecipesLimitQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let following: Vec<i32> = follow::Entity::find()
        .filter(follow::Column::UserId.eq(current.id))
        .all(&*db)
        .await?
        .into_iter()
        .map(|f| f.following_id)
        .collect();

    let authors = if following.is_empty() {
        vec![]
    } else {
        user::Entity::find()
            .filter(user::Column::Id.is_in(following))
            .order_by_asc(user::Column::Id)
            .all(&*db)
            .await?
    };

    Ok(Json(
        subscription_views(&*db, authors, current.id, query.recipes_limit).await?,
    ))
}

async fn subscribe(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    current: CurrentUser,
    Query(query): Query<RecipesLimitQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let txn = db.begin().await?;

    let author = user::Entity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No user with {id} id was found.")))?;

    if author.id == current.id {
        return Err(ApiError::BadRequest("You cannot subscribe to yourself".into()));
    }

    let inserted = follow::Entity::insert(follow::ActiveModel {
        user_id: Set(current.id),
        following_id: Set(author.id),
    })
    .on_conflict(
        OnConflict::columns([follow::Column::UserId, follow::Column::FollowingId])
            .do_nothing()
            .to_owned(),
    )
    .exec_without_returning(&txn)
    .await?;

    if inserted == 0 {
        return Err(ApiError::BadRequest(
            "You are already subscribed to this user".into(),
        ));
    }

    let mut views = subscription_views(&txn, vec![author], current.id, query.recipes_limit).await?;
    txn.commit().await?;

    info!(follower = current.id, following = id, "Subscribed");
    let view = views
        .pop()
        .ok_or_else(|| ApiError::Db("Subscription view went missing".into()))?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn unsubscribe(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    current: CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let txn = db.begin().await?;

    if user::Entity::find_by_id(id).one(&txn).await?.is_none() {
        return Err(ApiError::NotFound(format!("No user with {id} id was found.")));
    }

    let result = follow::Entity::delete_many()
        .filter(follow::Column::UserId.eq(current.id))
        .filter(follow::Column::FollowingId.eq(id))
        .exec(&txn)
        .await?;

    if result.rows_affected == 0 {
        return Err(ApiError::BadRequest(
            "You are not subscribed to this user".into(),
        ));
    }
    txn.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct RecipesLimitQuery {
    recipes_limit: Option<usize>,
}
