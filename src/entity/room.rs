//! Room entity for SeaORM.
//!
//! Room ids are allocated globally, not per dungeon.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "dunRooms")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_name = "roomID")]
    pub room_id: i32,
    #[sea_orm(column_name = "dungeonID")]
    pub dungeon_id: i32,
    #[sea_orm(column_name = "roomName")]
    pub room_name: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::dungeon::Entity",
        from = "Column::DungeonId",
        to = "super::dungeon::Column::DungeonId"
    )]
    Dungeon,
    #[sea_orm(has_many = "super::room_object::Entity")]
    Objects,
}

impl Related<super::dungeon::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Dungeon.def()
    }
}

impl Related<super::room_object::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Objects.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
