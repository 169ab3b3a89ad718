//! Room object entity for SeaORM.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "dunRoomObjects")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_name = "objectID")]
    pub object_id: i32,
    #[sea_orm(column_name = "roomID")]
    pub room_id: i32,
    #[sea_orm(column_name = "typeID")]
    pub type_id: i32,
    #[sea_orm(column_name = "groupID")]
    pub group_id: i32,
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub yaw: i32,
    pub pitch: i32,
    pub roll: i32,
    pub radius: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::room::Entity",
        from = "Column::RoomId",
        to = "super::room::Column::RoomId"
    )]
    Room,
}

impl Related<super::room::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Room.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
