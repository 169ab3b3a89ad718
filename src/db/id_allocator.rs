//! Storage id allocation for dungeons, rooms and room objects.
//!
//! Ids are global across the whole store and strictly increasing. Allocation is
//! check-then-act (`MAX(id) + 1`) with no locking: a single operator at a time is
//! assumed. Running it inside the import transaction keeps the read and the
//! inserts on one connection.

use sea_orm::sea_query::{Alias, Expr, Func, IntoColumnRef, IntoTableRef, Query};
use sea_orm::ConnectionTrait;

use crate::entity::{dungeon, room, room_object};
use crate::error::{AppError, AppResult};

use super::query_one;

/// First dungeon id handed out on an empty store.
pub const DUNGEON_ID_SEED: i32 = 120_000_000;
/// First room id handed out on an empty store.
pub const ROOM_ID_SEED: i32 = 10_000;
/// First room object id handed out on an empty store.
pub const ROOM_OBJECT_ID_SEED: i32 = 1;

/// Highest value of `column` in `table`, or `None` for an empty table.
async fn max_id<C, T, Col>(conn: &C, table: T, column: Col) -> AppResult<Option<i32>>
where
    C: ConnectionTrait,
    T: IntoTableRef,
    Col: IntoColumnRef,
{
    let select = Query::select()
        .from(table)
        .expr_as(Func::max(Expr::col(column)), Alias::new("max_id"))
        .to_owned();

    let max: Option<i64> = match query_one(conn, &select).await? {
        Some(row) => row.try_get("", "max_id")?,
        None => None,
    };

    max.map(|value| {
        i32::try_from(value)
            .map_err(|_| AppError::Database(format!("Stored id {} is out of range", value)))
    })
    .transpose()
}

async fn next_id<C, T, Col>(conn: &C, table: T, column: Col, seed: i32) -> AppResult<i32>
where
    C: ConnectionTrait,
    T: IntoTableRef,
    Col: IntoColumnRef,
{
    match max_id(conn, table, column).await? {
        Some(max) => max
            .checked_add(1)
            .ok_or_else(|| AppError::Database("Id space exhausted".to_string())),
        None => Ok(seed),
    }
}

/// Next free dungeon id.
pub async fn next_dungeon_id<C: ConnectionTrait>(conn: &C) -> AppResult<i32> {
    next_id(
        conn,
        dungeon::Entity,
        dungeon::Column::DungeonId,
        DUNGEON_ID_SEED,
    )
    .await
}

/// Next free room id, global across all dungeons.
pub async fn next_room_id<C: ConnectionTrait>(conn: &C) -> AppResult<i32> {
    next_id(conn, room::Entity, room::Column::RoomId, ROOM_ID_SEED).await
}

/// Next free room object id.
pub async fn next_room_object_id<C: ConnectionTrait>(conn: &C) -> AppResult<i32> {
    next_id(
        conn,
        room_object::Entity,
        room_object::Column::ObjectId,
        ROOM_OBJECT_ID_SEED,
    )
    .await
}

/// Id counters for one import.
///
/// Each base id is read from the store once; every row written afterwards takes
/// the next value from memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DungeonIdAllocator {
    next_dungeon: i32,
    next_room: i32,
    next_object: i32,
}

impl DungeonIdAllocator {
    /// Read the three base ids from the store.
    pub async fn load<C: ConnectionTrait>(conn: &C) -> AppResult<Self> {
        Ok(Self {
            next_dungeon: next_dungeon_id(conn).await?,
            next_room: next_room_id(conn).await?,
            next_object: next_room_object_id(conn).await?,
        })
    }

    /// Counters starting at explicit values.
    pub fn starting_at(dungeon: i32, room: i32, object: i32) -> Self {
        Self {
            next_dungeon: dungeon,
            next_room: room,
            next_object: object,
        }
    }

    pub fn take_dungeon_id(&mut self) -> AppResult<i32> {
        take(&mut self.next_dungeon)
    }

    pub fn take_room_id(&mut self) -> AppResult<i32> {
        take(&mut self.next_room)
    }

    pub fn take_object_id(&mut self) -> AppResult<i32> {
        take(&mut self.next_object)
    }
}

fn take(counter: &mut i32) -> AppResult<i32> {
    let id = *counter;
    *counter = id
        .checked_add(1)
        .ok_or_else(|| AppError::Database("Id space exhausted".to_string()))?;
    Ok(id)
}
