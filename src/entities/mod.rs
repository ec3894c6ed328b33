pub mod favorite;
pub mod follow;
pub mod ingredient;
pub mod recipe;
pub mod recipe_ingredient;
pub mod recipe_tag;
pub mod shopping_cart;
pub mod tag;
pub mod user;

use sea_orm::{
    sea_query::Index, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter, Schema, Set, TransactionTrait,
};
use tracing::info;

use crate::config::AdminSeed;

/// Creates every table the service needs. Safe to run on every start.
pub async fn setup_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let mut tables = vec![
        schema.create_table_from_entity(user::Entity),
        schema.create_table_from_entity(follow::Entity),
        schema.create_table_from_entity(tag::Entity),
        schema.create_table_from_entity(ingredient::Entity),
        schema.create_table_from_entity(recipe::Entity),
        schema.create_table_from_entity(recipe_tag::Entity),
        schema.create_table_from_entity(recipe_ingredient::Entity),
        schema.create_table_from_entity(favorite::Entity),
        schema.create_table_from_entity(shopping_cart::Entity),
    ];
    for table in tables.iter_mut() {
        table.if_not_exists();
        db.execute(backend.build(&*table)).await?;
    }

    let mut indexes = schema.create_index_from_entity(ingredient::Entity);
    indexes.extend(schema.create_index_from_entity(recipe::Entity));
    indexes.push(
        Index::create()
            .name("idx-ingredient-name-unit")
            .table(ingredient::Entity)
            .col(ingredient::Column::Name)
            .col(ingredient::Column::MeasurementUnit)
            .unique()
            .to_owned(),
    );
    for index in indexes.iter_mut() {
        index.if_not_exists();
        db.execute(backend.build(&*index)).await?;
    }

    Ok(())
}

pub async fn seed_admin(db: &DatabaseConnection, seed: &AdminSeed) -> Result<(), DbErr> {
    let txn = db.begin().await?;

    let existing = user::Entity::find()
        .filter(user::Column::Email.eq(seed.email.as_str()))
        .one(&txn)
        .await?;
    if existing.is_some() {
        info!(email = %seed.email, "Admin account already present");
        return Ok(());
    }

    let password = user::hash_password(&seed.password)
        .map_err(|err| DbErr::Custom(format!("Failed to hash admin password: {err}")))?;

    let admin = user::ActiveModel {
        email: Set(seed.email.clone()),
        username: Set(seed.username.clone()),
        first_name: Set(String::new()),
        last_name: Set(String::new()),
        password: Set(password),
        role: Set(user::Role::Admin),
        ..Default::default()
    };
    admin.insert(&txn).await?;
    txn.commit().await?;

    info!(email = %seed.email, "Seeded admin account");
    Ok(())
}
