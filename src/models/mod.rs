//! Domain models for dungeon content.

pub mod dungeon;

// Re-export commonly used types
pub use dungeon::{
    DUNGEON_FORMAT_VERSION, Dungeon, DungeonStatus, ListItem, NewDungeon, Room, RoomObject,
};
