pub mod auth;
pub mod ingredients;
pub mod media;
pub mod memberships;
pub mod recipes;
pub mod representation;
pub mod shopping_list;
pub mod subscriptions;
pub mod tags;
pub mod users;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    Extension, Router,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::middleware::auth::{auth_middleware, AuthState};
use crate::middleware::logging::logging_middleware;

use auth::auth_router;
use ingredients::ingredients_router;
use media::media_router;
use memberships::memberships_router;
use recipes::recipes_router;
use shopping_list::shopping_list_router;
use subscriptions::subscriptions_router;
use tags::tags_router;
use users::users_router;

pub fn create_api_router(db: Arc<DatabaseConnection>, config: Arc<Config>) -> Router {
    let api = Router::new()
        .merge(auth_router())
        .merge(users_router())
        .merge(subscriptions_router())
        .merge(tags_router())
        .merge(ingredients_router())
        .merge(recipes_router())
        .merge(memberships_router())
        .merge(shopping_list_router());

    let auth_state = AuthState {
        db: db.clone(),
        config: config.clone(),
    };

    Router::new()
        .nest("/api", api)
        .merge(media_router())
        .layer(from_fn_with_state(auth_state, auth_middleware))
        .layer(Extension(db))
        .layer(Extension(config))
        .layer(from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http())
}
