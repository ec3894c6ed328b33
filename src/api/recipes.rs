use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use sea_orm::{
    sea_query::{Expr, Query as SqlQuery},
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use super::representation::{recipe_view, recipe_views};
use crate::config::Config;
use crate::entities::{
    favorite, ingredient, recipe, recipe_ingredient, recipe_tag, shopping_cart, tag,
};
use crate::error::{ensure_valid, ApiError, FieldErrors};
use crate::media::{decode_data_uri, remove_media, save_recipe_image, DecodedImage};
use crate::middleware::auth::{CurrentUser, Viewer};

pub fn recipes_router() -> Router {
    Router::new()
        .route("/recipes", get(get_recipes).post(create_recipe))
        .route(
            "/recipes/:id",
            get(get_recipe).patch(patch_recipe).delete(delete_recipe),
        )
}

async fn get_recipes(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    viewer: Viewer,
    Query(query): Query<RecipesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let mut finder = recipe::Entity::find().order_by_desc(recipe::Column::Id);

    if let Some(author) = query.author {
        finder = finder.filter(recipe::Column::AuthorId.eq(author));
    }

    let slugs = query.tag_slugs();
    if !slugs.is_empty() {
        finder = finder.filter(
            recipe::Column::Id.in_subquery(
                SqlQuery::select()
                    .column((recipe_tag::Entity, recipe_tag::Column::RecipeId))
                    .from(recipe_tag::Entity)
                    .inner_join(
                        tag::Entity,
                        Expr::col((tag::Entity, tag::Column::Id))
                            .equals((recipe_tag::Entity, recipe_tag::Column::TagId)),
                    )
                    .and_where(tag::Column::Slug.is_in(slugs))
                    .to_owned(),
            ),
        );
    }

    if let Some(user_id) = viewer.user_id() {
        if is_truthy(query.is_favorited.as_deref()) {
            finder = finder.filter(
                recipe::Column::Id.in_subquery(
                    SqlQuery::select()
                        .column(favorite::Column::RecipeId)
                        .from(favorite::Entity)
                        .and_where(favorite::Column::UserId.eq(user_id))
                        .to_owned(),
                ),
            );
        }
        if is_truthy(query.is_in_shopping_cart.as_deref()) {
            finder = finder.filter(
                recipe::Column::Id.in_subquery(
                    SqlQuery::select()
                        .column(shopping_cart::Column::RecipeId)
                        .from(shopping_cart::Entity)
                        .and_where(shopping_cart::Column::UserId.eq(user_id))
                        .to_owned(),
                ),
            );
        }
    }

    let recipes = finder.all(&*db).await?;
    Ok(Json(recipe_views(&*db, recipes, viewer.user_id()).await?))
}

async fn get_recipe(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    viewer: Viewer,
) -> Result<impl IntoResponse, ApiError> {
    let recipe = recipe::Entity::find_by_id(id)
        .one(&*db)
        .await?
        .ok_or_else(|| not_found(id))?;

    Ok(Json(recipe_view(&*db, recipe, viewer.user_id()).await?))
}

async fn create_recipe(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(config): Extension<Arc<Config>>,
    current: CurrentUser,
    Json(payload): Json<CreateRecipe>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = payload.trimmed();
    let mut errors = FieldErrors::new();
    check_tags(&payload.tags, &mut errors);
    check_ingredients(&payload.ingredients, &mut errors);
    let image = decode_image(payload.image.as_deref(), &config, &mut errors);
    ensure_valid(payload.validate(), errors)?;

    let txn = db.begin().await?;
    ensure_valid(
        Ok(()),
        missing_references(
            &txn,
            Some(payload.tags.as_slice()),
            Some(payload.ingredients.as_slice()),
        )
        .await?,
    )?;

    let stored = store_image(&config, image).await?;
    let result = async {
        let created = recipe::ActiveModel {
            author_id: Set(current.id),
            name: Set(payload.name),
            text: Set(payload.text),
            cooking_time: Set(payload.cooking_time),
            image: Set(stored.clone()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        replace_tags(&txn, created.id, &payload.tags).await?;
        replace_ingredients(&txn, created.id, &payload.ingredients).await?;
        txn.commit().await?;
        Ok::<_, DbErr>(created)
    }
    .await;

    let created = match result {
        Ok(created) => created,
        Err(err) => {
            if let Some(path) = &stored {
                remove_media(&config.media_root, path).await;
            }
            return Err(err.into());
        }
    };

    info!(recipe_id = created.id, author = current.id, "Created recipe");
    let view = recipe_view(&*db, created, Some(current.id)).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn patch_recipe(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(config): Extension<Arc<Config>>,
    current: CurrentUser,
    Json(payload): Json<PatchRecipe>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = payload.trimmed();
    let txn = db.begin().await?;
    let existing = recipe::Entity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| not_found(id))?;
    if existing.author_id != current.id {
        return Err(ApiError::Forbidden(
            "Only the author may change this recipe".into(),
        ));
    }

    let mut errors = FieldErrors::new();
    if let Some(tags) = &payload.tags {
        check_tags(tags, &mut errors);
    }
    if let Some(ingredients) = &payload.ingredients {
        check_ingredients(ingredients, &mut errors);
    }
    let image = decode_image(
        payload.image.as_ref().and_then(|image| image.as_deref()),
        &config,
        &mut errors,
    );
    ensure_valid(payload.validate(), errors)?;
    ensure_valid(
        Ok(()),
        missing_references(&txn, payload.tags.as_deref(), payload.ingredients.as_deref()).await?,
    )?;

    let previous_image = existing.image.clone();
    let clears_image = matches!(payload.image, Some(None));
    let stored = store_image(&config, image).await?;
    let result = async {
        let mut recipe: recipe::ActiveModel = existing.clone().into();
        if let Some(name) = &payload.name {
            recipe.name = Set(name.clone());
        }
        if let Some(text) = &payload.text {
            recipe.text = Set(text.clone());
        }
        if let Some(cooking_time) = payload.cooking_time {
            recipe.cooking_time = Set(cooking_time);
        }
        if stored.is_some() || clears_image {
            recipe.image = Set(stored.clone());
        }
        let updated = if recipe.is_changed() {
            recipe.update(&txn).await?
        } else {
            existing
        };

        if let Some(tags) = &payload.tags {
            replace_tags(&txn, id, tags).await?;
        }
        if let Some(ingredients) = &payload.ingredients {
            replace_ingredients(&txn, id, ingredients).await?;
        }
        txn.commit().await?;
        Ok::<_, DbErr>(updated)
    }
    .await;

    let updated = match result {
        Ok(updated) => updated,
        Err(err) => {
            if let Some(path) = &stored {
                remove_media(&config.media_root, path).await;
            }
            return Err(err.into());
        }
    };

    if stored.is_some() || clears_image {
        if let Some(old) = &previous_image {
            remove_media(&config.media_root, old).await;
        }
    }

    Ok(Json(recipe_view(&*db, updated, Some(current.id)).await?))
}

async fn delete_recipe(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(config): Extension<Arc<Config>>,
    current: CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let txn = db.begin().await?;
    let existing = recipe::Entity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| not_found(id))?;
    if existing.author_id != current.id {
        return Err(ApiError::Forbidden(
            "Only the author may delete this recipe".into(),
        ));
    }

    recipe::Entity::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;

    if let Some(image) = &existing.image {
        remove_media(&config.media_root, image).await;
    }

    info!(recipe_id = id, author = current.id, "Deleted recipe");
    Ok(StatusCode::NO_CONTENT)
}

// Helpers

fn not_found(id: i32) -> ApiError {
    ApiError::NotFound(format!("No recipe with {id} id was found."))
}

fn push_error(errors: &mut FieldErrors, field: &str, message: String) {
    errors.entry(field.to_string()).or_default().push(message);
}

fn check_tags(tags: &[i32], errors: &mut FieldErrors) {
    if tags.is_empty() {
        push_error(errors, "tags", "Add at least one tag".into());
    }
    let mut seen = HashSet::new();
    for id in tags {
        if !seen.insert(*id) {
            push_error(errors, "tags", format!("Tag {id} is listed more than once"));
        }
    }
}

fn check_ingredients(ingredients: &[IngredientAmount], errors: &mut FieldErrors) {
    if ingredients.is_empty() {
        push_error(errors, "ingredients", "Add at least one ingredient".into());
    }
    let mut seen = HashSet::new();
    for item in ingredients {
        if !seen.insert(item.id) {
            push_error(
                errors,
                "ingredients",
                format!("Ingredient {} is listed more than once", item.id),
            );
        }
        if item.amount < 1 {
            push_error(
                errors,
                "ingredients",
                format!("Amount of ingredient {} must be at least 1", item.id),
            );
        }
    }
}

fn decode_image(
    value: Option<&str>,
    config: &Config,
    errors: &mut FieldErrors,
) -> Option<DecodedImage> {
    match decode_data_uri(value?, config.max_image_bytes) {
        Ok(image) => Some(image),
        Err(err) => {
            push_error(errors, "image", err.to_string());
            None
        }
    }
}

async fn store_image(
    config: &Config,
    image: Option<DecodedImage>,
) -> Result<Option<String>, ApiError> {
    match image {
        Some(image) => save_recipe_image(&config.media_root, &image)
            .await
            .map(Some)
            .map_err(|err| ApiError::Storage(err.to_string())),
        None => Ok(None),
    }
}

/// Reports referenced tags and ingredients that do not exist.
async fn missing_references<C: ConnectionTrait>(
    db: &C,
    tags: Option<&[i32]>,
    ingredients: Option<&[IngredientAmount]>,
) -> Result<FieldErrors, DbErr> {
    let mut errors = FieldErrors::new();

    if let Some(tags) = tags.filter(|t| !t.is_empty()) {
        let found: HashSet<i32> = tag::Entity::find()
            .filter(tag::Column::Id.is_in(tags.to_vec()))
            .all(db)
            .await?
            .into_iter()
            .map(|t| t.id)
            .collect();
        for id in tags.iter().filter(|id| !found.contains(id)) {
            push_error(&mut errors, "tags", format!("Tag {id} does not exist"));
        }
    }

    if let Some(ingredients) = ingredients.filter(|i| !i.is_empty()) {
        let found: HashSet<i32> = ingredient::Entity::find()
            .filter(ingredient::Column::Id.is_in(ingredients.iter().map(|i| i.id)))
            .all(db)
            .await?
            .into_iter()
            .map(|i| i.id)
            .collect();
        for item in ingredients.iter().filter(|i| !found.contains(&i.id)) {
            push_error(
                &mut errors,
                "ingredients",
                format!("Ingredient {} does not exist", item.id),
            );
        }
    }

    Ok(errors)
}

async fn replace_tags<C: ConnectionTrait>(
    db: &C,
    recipe_id: i32,
    tags: &[i32],
) -> Result<(), DbErr> {
    recipe_tag::Entity::delete_many()
        .filter(recipe_tag::Column::RecipeId.eq(recipe_id))
        .exec(db)
        .await?;

    if tags.is_empty() {
        return Ok(());
    }
    recipe_tag::Entity::insert_many(tags.iter().map(|tag_id| recipe_tag::ActiveModel {
        recipe_id: Set(recipe_id),
        tag_id: Set(*tag_id),
    }))
    .exec_without_returning(db)
    .await?;

    Ok(())
}

async fn replace_ingredients<C: ConnectionTrait>(
    db: &C,
    recipe_id: i32,
    ingredients: &[IngredientAmount],
) -> Result<(), DbErr> {
    recipe_ingredient::Entity::delete_many()
        .filter(recipe_ingredient::Column::RecipeId.eq(recipe_id))
        .exec(db)
        .await?;

    if ingredients.is_empty() {
        return Ok(());
    }
    recipe_ingredient::Entity::insert_many(ingredients.iter().map(|item| {
        recipe_ingredient::ActiveModel {
            recipe_id: Set(recipe_id),
            ingredient_id: Set(item.id),
            amount: Set(item.amount),
        }
    }))
    .exec_without_returning(db)
    .await?;

    Ok(())
}

fn is_truthy(value: Option<&str>) -> bool {
    matches!(value, Some("1") | Some("true") | Some("True"))
}

//Structs
#[derive(Deserialize, Debug, Clone)]
struct IngredientAmount {
    id: i32,
    amount: i32,
}

#[derive(Deserialize, Validate)]
struct CreateRecipe {
    ingredients: Vec<IngredientAmount>,
    tags: Vec<i32>,
    image: Option<String>,
    #[validate(length(min = 1, max = 256, message = "Name must be 1 to 256 characters long"))]
    name: String,
    #[validate(length(min = 1, message = "Text must not be empty"))]
    text: String,
    #[validate(range(min = 1, message = "Cooking time must be at least 1 minute"))]
    cooking_time: i32,
}

impl CreateRecipe {
    fn trimmed(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.text = self.text.trim().to_string();
        self
    }
}

#[derive(Deserialize, Validate)]
struct PatchRecipe {
    ingredients: Option<Vec<IngredientAmount>>,
    tags: Option<Vec<i32>>,
    /// Absent keeps the image, `null` removes it.
    #[serde(default, deserialize_with = "present")]
    image: Option<Option<String>>,
    #[validate(length(min = 1, max = 256, message = "Name must be 1 to 256 characters long"))]
    name: Option<String>,
    #[validate(length(min = 1, message = "Text must not be empty"))]
    text: Option<String>,
    #[validate(range(min = 1, message = "Cooking time must be at least 1 minute"))]
    cooking_time: Option<i32>,
}

impl PatchRecipe {
    fn trimmed(mut self) -> Self {
        self.name = self.name.map(|n| n.trim().to_string());
        self.text = self.text.map(|t| t.trim().to_string());
        self
    }
}

// Marks a field that was sent, even as `null`.
fn present<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

#[derive(Deserialize)]
struct RecipesQuery {
    author: Option<i32>,
    tags: Option<String>,
    is_favorited: Option<String>,
    is_in_shopping_cart: Option<String>,
}

impl RecipesQuery {
    fn tag_slugs(&self) -> Vec<String> {
        self.tags
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}
