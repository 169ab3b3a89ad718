//! Dungeon archetype entity (read only, shipped with the base dump).

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "dunArchetypes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_name = "archetypeID")]
    pub archetype_id: i32,
    #[sea_orm(column_name = "archetypeName")]
    pub archetype_name: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
