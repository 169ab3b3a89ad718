//! Faction entity (read only, shipped with the base dump).

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "facFactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_name = "factionID")]
    pub faction_id: i32,
    #[sea_orm(column_name = "factionName")]
    pub faction_name: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
