//! Dungeon entity for SeaORM.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "dunDungeons")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_name = "dungeonID")]
    pub dungeon_id: i32,
    #[sea_orm(column_name = "dungeonUUID")]
    pub dungeon_uuid: String,
    #[sea_orm(column_name = "dungeonName")]
    pub dungeon_name: String,
    #[sea_orm(column_name = "dungeonStatus")]
    pub dungeon_status: i32,
    #[sea_orm(column_name = "factionID")]
    pub faction_id: i32,
    #[sea_orm(column_name = "archetypeID")]
    pub archetype_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::room::Entity")]
    Rooms,
}

impl Related<super::room::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Rooms.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
