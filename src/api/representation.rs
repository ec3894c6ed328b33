//! Wire views shared by several handlers.
//!
//! Loaders take a batch of models and resolve everything the views need with
//! a fixed number of queries, independent of the batch size.

use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::entities::{
    favorite, follow, ingredient, recipe, recipe_ingredient, recipe_tag, shopping_cart, tag,
    user,
};
use crate::media::media_url;

#[derive(Serialize, Debug, Clone)]
pub struct UserResponse {
    pub email: String,
    pub id: i32,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

impl UserResponse {
    fn new(value: user::Model, is_subscribed: bool) -> UserResponse {
        UserResponse {
            email: value.email,
            id: value.id,
            username: value.username,
            first_name: value.first_name,
            last_name: value.last_name,
            is_subscribed,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct RecipeIngredientResponse {
    pub id: i32,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(Serialize, Debug)]
pub struct RecipeResponse {
    pub id: i32,
    pub tags: Vec<tag::Model>,
    pub author: UserResponse,
    pub ingredients: Vec<RecipeIngredientResponse>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: Option<String>,
    pub text: String,
    pub cooking_time: i32,
}

/// The compact recipe card used by toggles and subscriptions.
#[derive(Serialize, Debug)]
pub struct ShortRecipe {
    pub id: i32,
    pub name: String,
    pub image: Option<String>,
    pub cooking_time: i32,
}

impl ShortRecipe {
    pub fn new(value: recipe::Model) -> ShortRecipe {
        ShortRecipe {
            id: value.id,
            name: value.name,
            image: value.image.as_deref().map(media_url),
            cooking_time: value.cooking_time,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct SubscriptionResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub recipes: Vec<ShortRecipe>,
    pub recipes_count: usize,
}

pub async fn user_views<C: ConnectionTrait>(
    db: &C,
    users: Vec<user::Model>,
    viewer: Option<i32>,
) -> Result<Vec<UserResponse>, DbErr> {
    let ids = users.iter().map(|u| u.id).collect();
    let followed = followed_among(db, viewer, ids).await?;

    Ok(users
        .into_iter()
        .map(|u| {
            let is_subscribed = followed.contains(&u.id);
            UserResponse::new(u, is_subscribed)
        })
        .collect())
}

pub async fn user_view<C: ConnectionTrait>(
    db: &C,
    user: user::Model,
    viewer: Option<i32>,
) -> Result<UserResponse, DbErr> {
    let mut views = user_views(db, vec![user], viewer).await?;
    views
        .pop()
        .ok_or_else(|| DbErr::Custom("User view went missing".into()))
}

pub async fn recipe_views<C: ConnectionTrait>(
    db: &C,
    recipes: Vec<recipe::Model>,
    viewer: Option<i32>,
) -> Result<Vec<RecipeResponse>, DbErr> {
    if recipes.is_empty() {
        return Ok(vec![]);
    }
    let ids: Vec<i32> = recipes.iter().map(|r| r.id).collect();

    let mut tags: HashMap<i32, Vec<tag::Model>> = HashMap::new();
    for (link, tag) in recipe_tag::Entity::find()
        .filter(recipe_tag::Column::RecipeId.is_in(ids.clone()))
        .order_by_asc(recipe_tag::Column::TagId)
        .find_also_related(tag::Entity)
        .all(db)
        .await?
    {
        if let Some(tag) = tag {
            tags.entry(link.recipe_id).or_default().push(tag);
        }
    }

    let mut ingredients: HashMap<i32, Vec<RecipeIngredientResponse>> = HashMap::new();
    for (link, ingredient) in recipe_ingredient::Entity::find()
        .filter(recipe_ingredient::Column::RecipeId.is_in(ids.clone()))
        .order_by_asc(recipe_ingredient::Column::IngredientId)
        .find_also_related(ingredient::Entity)
        .all(db)
        .await?
    {
        if let Some(ingredient) = ingredient {
            ingredients
                .entry(link.recipe_id)
                .or_default()
                .push(RecipeIngredientResponse {
                    id: ingredient.id,
                    name: ingredient.name,
                    measurement_unit: ingredient.measurement_unit,
                    amount: link.amount,
                });
        }
    }

    let author_ids: HashSet<i32> = recipes.iter().map(|r| r.author_id).collect();
    let authors = user::Entity::find()
        .filter(user::Column::Id.is_in(author_ids))
        .all(db)
        .await?;
    let authors: HashMap<i32, UserResponse> = user_views(db, authors, viewer)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();

    let (favorited, in_cart): (HashSet<i32>, HashSet<i32>) = match viewer {
        Some(viewer) => (
            favorite::Entity::find()
                .filter(favorite::Column::UserId.eq(viewer))
                .filter(favorite::Column::RecipeId.is_in(ids.clone()))
                .all(db)
                .await?
                .into_iter()
                .map(|f| f.recipe_id)
                .collect(),
            shopping_cart::Entity::find()
                .filter(shopping_cart::Column::UserId.eq(viewer))
                .filter(shopping_cart::Column::RecipeId.is_in(ids))
                .all(db)
                .await?
                .into_iter()
                .map(|c| c.recipe_id)
                .collect(),
        ),
        None => (HashSet::new(), HashSet::new()),
    };

    recipes
        .into_iter()
        .map(|r| {
            let author = authors.get(&r.author_id).cloned().ok_or_else(|| {
                DbErr::RecordNotFound(format!("Author {} of recipe {}", r.author_id, r.id))
            })?;
            Ok(RecipeResponse {
                id: r.id,
                tags: tags.remove(&r.id).unwrap_or_default(),
                author,
                ingredients: ingredients.remove(&r.id).unwrap_or_default(),
                is_favorited: favorited.contains(&r.id),
                is_in_shopping_cart: in_cart.contains(&r.id),
                name: r.name,
                image: r.image.as_deref().map(media_url),
                text: r.text,
                cooking_time: r.cooking_time,
            })
        })
        .collect()
}

pub async fn recipe_view<C: ConnectionTrait>(
    db: &C,
    recipe: recipe::Model,
    viewer: Option<i32>,
) -> Result<RecipeResponse, DbErr> {
    let mut views = recipe_views(db, vec![recipe], viewer).await?;
    views
        .pop()
        .ok_or_else(|| DbErr::Custom("Recipe view went missing".into()))
}

/// Builds subscription cards for `authors`, each with at most `recipes_limit`
/// of their newest recipes.
pub async fn subscription_views<C: ConnectionTrait>(
    db: &C,
    authors: Vec<user::Model>,
    viewer: i32,
    recipes_limit: Option<usize>,
) -> Result<Vec<SubscriptionResponse>, DbErr> {
    let ids: Vec<i32> = authors.iter().map(|a| a.id).collect();

    let mut recipes: HashMap<i32, Vec<recipe::Model>> = HashMap::new();
    if !ids.is_empty() {
        for r in recipe::Entity::find()
            .filter(recipe::Column::AuthorId.is_in(ids))
            .order_by_desc(recipe::Column::Id)
            .all(db)
            .await?
        {
            recipes.entry(r.author_id).or_default().push(r);
        }
    }

    Ok(user_views(db, authors, Some(viewer))
        .await?
        .into_iter()
        .map(|user| {
            let own = recipes.remove(&user.id).unwrap_or_default();
            let recipes_count = own.len();
            let recipes = own
                .into_iter()
                .take(recipes_limit.unwrap_or(usize::MAX))
                .map(ShortRecipe::new)
                .collect();
            SubscriptionResponse {
                user,
                recipes,
                recipes_count,
            }
        })
        .collect())
}

async fn followed_among<C: ConnectionTrait>(
    db: &C,
    viewer: Option<i32>,
    ids: Vec<i32>,
) -> Result<HashSet<i32>, DbErr> {
    let Some(viewer) = viewer else {
        return Ok(HashSet::new());
    };
    if ids.is_empty() {
        return Ok(HashSet::new());
    }

    Ok(follow::Entity::find()
        .filter(follow::Column::UserId.eq(viewer))
        .filter(follow::Column::FollowingId.is_in(ids))
        .all(db)
        .await?
        .into_iter()
        .map(|f| f.following_id)
        .collect())
}
