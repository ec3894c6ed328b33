use axum::{
    extract::Extension,
    http::{header, HeaderMap, HeaderValue},
    response::IntoResponse,
    routing::get,
    Router,
};
use sea_orm::{
    sea_query::Query as SqlQuery, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    FromQueryResult, QueryFilter, QueryOrder, QuerySelect,
};
use std::fmt::Write;
use std::sync::Arc;

use crate::entities::{ingredient, recipe_ingredient, shopping_cart};
use crate::error::ApiError;
use crate::middleware::auth::CurrentUser;

const SHOPPING_LIST_DISPOSITION: &str = "attachment; filename=\"shopping_cart.txt\"";

pub fn shopping_list_router() -> Router {
    Router::new().route("/recipes/download_shopping_cart", get(download_shopping_cart))
}

/// One ingredient summed over every recipe in a cart.
#[derive(Debug, Clone, PartialEq, FromQueryResult)]
pub struct ShoppingListLine {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

async fn download_shopping_cart(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    current: CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let lines = shopping_list(&db, current.id).await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_static(SHOPPING_LIST_DISPOSITION),
    );

    Ok((headers, render_shopping_list(&lines)))
}

/// Totals per ingredient across the user's cart, ordered by name then unit.
pub async fn shopping_list(
    db: &DatabaseConnection,
    user_id: i32,
) -> Result<Vec<ShoppingListLine>, DbErr> {
    recipe_ingredient::Entity::find()
        .select_only()
        .column(ingredient::Column::Name)
        .column(ingredient::Column::MeasurementUnit)
        .column_as(recipe_ingredient::Column::Amount.sum(), "amount")
        .inner_join(ingredient::Entity)
        .filter(
            recipe_ingredient::Column::RecipeId.in_subquery(
                SqlQuery::select()
                    .column(shopping_cart::Column::RecipeId)
                    .from(shopping_cart::Entity)
                    .and_where(shopping_cart::Column::UserId.eq(user_id))
                    .to_owned(),
            ),
        )
        .group_by(ingredient::Column::Name)
        .group_by(ingredient::Column::MeasurementUnit)
        .order_by_asc(ingredient::Column::Name)
        .order_by_asc(ingredient::Column::MeasurementUnit)
        .into_model::<ShoppingListLine>()
        .all(db)
        .await
}

pub fn render_shopping_list(lines: &[ShoppingListLine]) -> String {
    let mut out = String::from("Shopping list:\n--------------\n");
    for (n, line) in lines.iter().enumerate() {
        // Writing into a String cannot fail.
        let _ = writeln!(
            out,
            "{}. {}: {} ({})",
            n + 1,
            line.name,
            line.amount,
            line.measurement_unit
        );
    }
    out
}
