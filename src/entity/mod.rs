//! SeaORM entity definitions for the dungeon content tables.

pub mod archetype;
pub mod dungeon;
pub mod faction;
pub mod room;
pub mod room_object;
