//! Recipe-sharing service: users publish recipes, follow authors, keep
//! favorites and a shopping cart that exports as a plain-text list.

pub mod api;
pub mod config;
pub mod entities;
pub mod error;
pub mod media;
pub mod middleware;

use axum::Router;
use sea_orm::{Database, DatabaseConnection, DbErr};
use std::sync::Arc;

use crate::config::Config;
use crate::entities::{seed_admin, setup_schema};

/// Opens the database, creates missing tables and seeds the admin account.
pub async fn connect(config: &Config) -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect(&config.database_url).await?;
    setup_schema(&db).await?;

    if let Some(admin) = &config.admin {
        seed_admin(&db, admin).await?;
    }

    Ok(db)
}

pub fn app(db: DatabaseConnection, config: Config) -> Router {
    api::create_api_router(Arc::new(db), Arc::new(config))
}
