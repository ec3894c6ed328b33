use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "tag")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub color: TagColor,
    #[sea_orm(unique)]
    pub slug: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::recipe_tag::Entity")]
    RecipeTag,
}

impl Related<super::recipe_tag::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RecipeTag.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// The fixed palette tags are drawn from.
#[derive(
    Clone, Copy, PartialEq, Eq, Debug, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(
    enum_name = "tag_color_enum",
    db_type = "String(StringLen::N(16))",
    rs_type = "String"
)]
pub enum TagColor {
    #[sea_orm(string_value = "#FBCEB1")]
    #[serde(rename = "#FBCEB1")]
    Apricot,
    #[sea_orm(string_value = "#FAE7B5")]
    #[serde(rename = "#FAE7B5")]
    Banana,
    #[sea_orm(string_value = "#9ACEEB")]
    #[serde(rename = "#9ACEEB")]
    Cornflower,
}
