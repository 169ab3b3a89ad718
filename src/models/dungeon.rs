//! Dungeon graph models and the JSON interchange format.
//!
//! Field names follow the files exported by earlier versions of the tool, so
//! exported dungeons round-trip unchanged.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{AppError, AppResult};

/// Version written into exported dungeon files.
pub const DUNGEON_FORMAT_VERSION: i32 = 1;

/// Dungeon status as stored in `dunDungeons.dungeonStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum DungeonStatus {
    Release,
    Testing,
    WorkingCopy,
}

impl DungeonStatus {
    pub fn as_i32(&self) -> i32 {
        match self {
            Self::Release => 1,
            Self::Testing => 2,
            Self::WorkingCopy => 3,
        }
    }

    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            1 => Some(Self::Release),
            2 => Some(Self::Testing),
            3 => Some(Self::WorkingCopy),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Release => "Release",
            Self::Testing => "Testing",
            Self::WorkingCopy => "Working Copy",
        }
    }
}

impl TryFrom<i32> for DungeonStatus {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::from_i32(value).ok_or_else(|| {
            format!(
                "invalid dungeon status {} (1=Release, 2=Testing, 3=Working Copy)",
                value
            )
        })
    }
}

impl From<DungeonStatus> for i32 {
    fn from(status: DungeonStatus) -> Self {
        status.as_i32()
    }
}

impl std::fmt::Display for DungeonStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single object placed in a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomObject {
    #[serde(rename = "typeID")]
    pub type_id: i32,
    #[serde(rename = "groupID")]
    pub group_id: i32,
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub yaw: i32,
    pub pitch: i32,
    pub roll: i32,
    pub radius: i32,
}

/// A room and its objects, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    #[serde(rename = "roomName")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub objects: Vec<RoomObject>,
}

impl Room {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            objects: Vec::new(),
        }
    }
}

/// The full dungeon graph as exchanged in JSON files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dungeon {
    /// Interchange format version; informational only on import.
    #[serde(default)]
    pub version: i32,
    /// Storage id of the row this graph was exported from. Never serialized:
    /// ids are reassigned on every import.
    #[serde(skip)]
    pub id: Option<i32>,
    #[serde(rename = "DungeonUUID")]
    pub uuid: String,
    #[serde(rename = "dungeonName")]
    pub name: String,
    pub status: DungeonStatus,
    #[serde(rename = "factionID")]
    pub faction_id: i32,
    #[serde(rename = "ArchetypeID")]
    pub archetype_id: i32,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub rooms: Vec<Room>,
}

impl Dungeon {
    /// Parse and validate a dungeon document.
    pub fn from_json(data: &[u8]) -> AppResult<Self> {
        let dungeon: Dungeon = serde_json::from_slice(data)?;
        dungeon.validate()?;
        Ok(dungeon)
    }

    /// Serialize to the interchange format.
    pub fn to_json(&self) -> AppResult<String> {
        serde_json::to_string(self)
            .map_err(|e| AppError::Validation(format!("Failed to serialize dungeon: {}", e)))
    }

    /// Check the fields serde cannot.
    pub fn validate(&self) -> AppResult<()> {
        if self.uuid.trim().is_empty() {
            return Err(AppError::Validation(
                "DungeonUUID must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Number of objects across all rooms.
    pub fn object_count(&self) -> usize {
        self.rooms.iter().map(|room| room.objects.len()).sum()
    }
}

/// Parameters for a new, empty dungeon.
#[derive(Debug, Clone)]
pub struct NewDungeon {
    pub name: String,
    pub status: DungeonStatus,
    pub faction_id: i32,
    pub archetype_id: i32,
}

impl NewDungeon {
    /// Build the dungeon graph with a freshly generated UUID.
    pub fn into_dungeon(self) -> Dungeon {
        Dungeon {
            version: DUNGEON_FORMAT_VERSION,
            id: None,
            uuid: uuid::Uuid::new_v4().to_string(),
            name: self.name,
            status: self.status,
            faction_id: self.faction_id,
            archetype_id: self.archetype_id,
            rooms: Vec::new(),
        }
    }
}

/// An (id, name) pair for list output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListItem {
    pub id: i32,
    pub name: String,
}

/// Older exports wrote `null` for empty lists.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
