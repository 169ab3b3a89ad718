//! Dungeon graph storage: export, import, cascading delete and list projections.
//!
//! A dungeon is stored across three tables (`dunDungeons`, `dunRooms`,
//! `dunRoomObjects`). Import and delete each run in a single transaction so a
//! failure never leaves half a graph behind. The cascade is performed here and
//! does not rely on foreign keys in the schema.

use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::{debug, info, warn};

use crate::entity::{archetype, dungeon, faction, room, room_object};
use crate::error::{AppError, AppResult};
use crate::models::{DUNGEON_FORMAT_VERSION, Dungeon, DungeonStatus, ListItem, Room, RoomObject};

use super::DbPool;
use super::id_allocator::DungeonIdAllocator;

/// Storage ids assigned by an import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedDungeon {
    pub dungeon_id: i32,
    /// Room ids in graph order
    pub room_ids: Vec<i32>,
    /// Object ids in graph order, across all rooms
    pub object_ids: Vec<i32>,
    /// Rows that already carried this UUID before the import
    pub existing_matches: usize,
}

/// Rows removed by a cascading delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeletedRows {
    pub objects: u64,
    pub rooms: u64,
    pub dungeons: u64,
}

/// Read a complete dungeon graph.
pub async fn load_dungeon<C: ConnectionTrait>(conn: &C, dungeon_id: i32) -> AppResult<Dungeon> {
    let row = dungeon::Entity::find_by_id(dungeon_id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Dungeon {}", dungeon_id)))?;

    let status = DungeonStatus::from_i32(row.dungeon_status).ok_or_else(|| {
        AppError::Database(format!(
            "Dungeon {} has unknown status {}",
            dungeon_id, row.dungeon_status
        ))
    })?;

    let room_rows = room::Entity::find()
        .filter(room::Column::DungeonId.eq(dungeon_id))
        .order_by_asc(room::Column::RoomId)
        .all(conn)
        .await?;

    let mut rooms = Vec::with_capacity(room_rows.len());
    for room_row in room_rows {
        let objects = room_object::Entity::find()
            .filter(room_object::Column::RoomId.eq(room_row.room_id))
            .order_by_asc(room_object::Column::ObjectId)
            .all(conn)
            .await?
            .into_iter()
            .map(|object| RoomObject {
                type_id: object.type_id,
                group_id: object.group_id,
                x: object.x,
                y: object.y,
                z: object.z,
                yaw: object.yaw,
                pitch: object.pitch,
                roll: object.roll,
                radius: object.radius,
            })
            .collect();

        rooms.push(Room {
            name: room_row.room_name,
            objects,
        });
    }

    Ok(Dungeon {
        version: DUNGEON_FORMAT_VERSION,
        id: Some(row.dungeon_id),
        uuid: row.dungeon_uuid,
        name: row.dungeon_name,
        status,
        faction_id: row.faction_id,
        archetype_id: row.archetype_id,
        rooms,
    })
}

/// Insert a dungeon graph under freshly allocated ids.
///
/// With `overwrite`, rows already carrying the UUID are left in place and the
/// graph is inserted next to them.
pub async fn insert_dungeon<C: ConnectionTrait>(
    conn: &C,
    graph: &Dungeon,
    overwrite: bool,
) -> AppResult<ImportedDungeon> {
    graph.validate()?;

    let existing = dungeon::Entity::find()
        .filter(dungeon::Column::DungeonUuid.eq(graph.uuid.as_str()))
        .all(conn)
        .await?;

    if !existing.is_empty() {
        if !overwrite {
            return Err(AppError::AlreadyExists(graph.uuid.clone()));
        }
        warn!(
            "Dungeon {} already exists ({} rows), overwriting",
            graph.uuid,
            existing.len()
        );
    }

    let mut ids = DungeonIdAllocator::load(conn).await?;
    let dungeon_id = ids.take_dungeon_id()?;

    dungeon::Entity::insert(dungeon::ActiveModel {
        dungeon_id: Set(dungeon_id),
        dungeon_uuid: Set(graph.uuid.clone()),
        dungeon_name: Set(graph.name.clone()),
        dungeon_status: Set(graph.status.as_i32()),
        faction_id: Set(graph.faction_id),
        archetype_id: Set(graph.archetype_id),
    })
    .exec_without_returning(conn)
    .await?;

    let mut room_ids = Vec::with_capacity(graph.rooms.len());
    let mut object_ids = Vec::with_capacity(graph.object_count());

    for graph_room in &graph.rooms {
        let room_id = ids.take_room_id()?;
        room::Entity::insert(room::ActiveModel {
            room_id: Set(room_id),
            dungeon_id: Set(dungeon_id),
            room_name: Set(graph_room.name.clone()),
        })
        .exec_without_returning(conn)
        .await?;
        room_ids.push(room_id);

        for object in &graph_room.objects {
            let object_id = ids.take_object_id()?;
            room_object::Entity::insert(room_object::ActiveModel {
                object_id: Set(object_id),
                room_id: Set(room_id),
                type_id: Set(object.type_id),
                group_id: Set(object.group_id),
                x: Set(object.x),
                y: Set(object.y),
                z: Set(object.z),
                yaw: Set(object.yaw),
                pitch: Set(object.pitch),
                roll: Set(object.roll),
                radius: Set(object.radius),
            })
            .exec_without_returning(conn)
            .await?;
            object_ids.push(object_id);
        }
    }

    debug!(
        "Inserted dungeon {} as {} ({} rooms, {} objects)",
        graph.uuid,
        dungeon_id,
        room_ids.len(),
        object_ids.len()
    );

    Ok(ImportedDungeon {
        dungeon_id,
        room_ids,
        object_ids,
        existing_matches: existing.len(),
    })
}

/// Delete a dungeon's objects, then its rooms, then the dungeon row.
pub async fn remove_dungeon<C: ConnectionTrait>(conn: &C, dungeon_id: i32) -> AppResult<DeletedRows> {
    if dungeon::Entity::find_by_id(dungeon_id).one(conn).await?.is_none() {
        return Err(AppError::NotFound(format!("Dungeon {}", dungeon_id)));
    }

    let room_ids: Vec<i32> = room::Entity::find()
        .filter(room::Column::DungeonId.eq(dungeon_id))
        .all(conn)
        .await?
        .into_iter()
        .map(|row| row.room_id)
        .collect();

    let objects = if room_ids.is_empty() {
        0
    } else {
        room_object::Entity::delete_many()
            .filter(room_object::Column::RoomId.is_in(room_ids))
            .exec(conn)
            .await?
            .rows_affected
    };

    let rooms = room::Entity::delete_many()
        .filter(room::Column::DungeonId.eq(dungeon_id))
        .exec(conn)
        .await?
        .rows_affected;

    let dungeons = dungeon::Entity::delete_by_id(dungeon_id)
        .exec(conn)
        .await?
        .rows_affected;

    Ok(DeletedRows {
        objects,
        rooms,
        dungeons,
    })
}

impl DbPool {
    /// Export the dungeon stored under `dungeon_id`.
    pub async fn export_dungeon(&self, dungeon_id: i32) -> AppResult<Dungeon> {
        load_dungeon(self.connection(), dungeon_id).await
    }

    /// Import a dungeon graph in one transaction.
    pub async fn import_dungeon(&self, graph: &Dungeon, overwrite: bool) -> AppResult<ImportedDungeon> {
        let txn = self.connection().begin().await?;
        let imported = insert_dungeon(&txn, graph, overwrite).await?;
        txn.commit().await?;

        info!(
            "Imported dungeon {} '{}' as {}",
            graph.uuid, graph.name, imported.dungeon_id
        );
        Ok(imported)
    }

    /// Delete a dungeon and everything under it in one transaction.
    pub async fn delete_dungeon(&self, dungeon_id: i32) -> AppResult<DeletedRows> {
        let txn = self.connection().begin().await?;
        let deleted = remove_dungeon(&txn, dungeon_id).await?;
        txn.commit().await?;

        info!(
            "Deleted dungeon {} ({} rooms, {} objects)",
            dungeon_id, deleted.rooms, deleted.objects
        );
        Ok(deleted)
    }

    /// Replace a stored dungeon with an edited graph (delete then import) in one
    /// transaction. The graph receives new storage ids.
    pub async fn replace_dungeon(&self, dungeon_id: i32, graph: &Dungeon) -> AppResult<ImportedDungeon> {
        let txn = self.connection().begin().await?;
        remove_dungeon(&txn, dungeon_id).await?;
        let imported = insert_dungeon(&txn, graph, false).await?;
        txn.commit().await?;

        info!(
            "Replaced dungeon {} with {}",
            dungeon_id, imported.dungeon_id
        );
        Ok(imported)
    }

    /// All dungeons ordered by id.
    pub async fn list_dungeons(&self) -> AppResult<Vec<ListItem>> {
        let rows = dungeon::Entity::find()
            .order_by_asc(dungeon::Column::DungeonId)
            .all(self.connection())
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| ListItem {
                id: row.dungeon_id,
                name: row.dungeon_name,
            })
            .collect())
    }

    /// All factions ordered by id.
    pub async fn list_factions(&self) -> AppResult<Vec<ListItem>> {
        let rows = faction::Entity::find()
            .order_by_asc(faction::Column::FactionId)
            .all(self.connection())
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| ListItem {
                id: row.faction_id,
                name: row.faction_name,
            })
            .collect())
    }

    /// All dungeon archetypes ordered by id.
    pub async fn list_archetypes(&self) -> AppResult<Vec<ListItem>> {
        let rows = archetype::Entity::find()
            .order_by_asc(archetype::Column::ArchetypeId)
            .all(self.connection())
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| ListItem {
                id: row.archetype_id,
                name: row.archetype_name,
            })
            .collect())
    }

    /// Rooms of one dungeon. The id of each item is its position in the room
    /// list (0-based, room id order), which is what `remove-room` accepts.
    pub async fn list_rooms(&self, dungeon_id: i32) -> AppResult<Vec<ListItem>> {
        let rows = room::Entity::find()
            .filter(room::Column::DungeonId.eq(dungeon_id))
            .order_by_asc(room::Column::RoomId)
            .all(self.connection())
            .await?;

        Ok(rows
            .into_iter()
            .zip(0..)
            .map(|(row, position)| ListItem {
                id: position,
                name: row.room_name,
            })
            .collect())
    }
}
