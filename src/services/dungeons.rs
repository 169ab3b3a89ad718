//! Dungeon content operations: import/export, editing and listing.

use std::path::{Path, PathBuf};

use tracing::{error, info, trace};

use crate::db::DbPool;
use crate::db::dungeons::ImportedDungeon;
use crate::error::{AppError, AppResult};
use crate::models::{Dungeon, ListItem, NewDungeon, Room};

pub use crate::db::dungeons::DeletedRows as DeleteSummary;

/// Result of importing one dungeon document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub dungeon_id: i32,
    pub uuid: String,
    pub name: String,
    pub rooms: usize,
    pub objects: usize,
    /// The UUID was already stored and the import went ahead anyway
    pub overwrote_existing: bool,
}

impl ImportSummary {
    fn new(graph: &Dungeon, imported: &ImportedDungeon) -> Self {
        Self {
            dungeon_id: imported.dungeon_id,
            uuid: graph.uuid.clone(),
            name: graph.name.clone(),
            rooms: imported.room_ids.len(),
            objects: imported.object_ids.len(),
            overwrote_existing: imported.existing_matches > 0,
        }
    }
}

/// A dungeon file that failed to import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyFailure {
    pub file: PathBuf,
    pub cause: String,
}

/// Result of importing a whole directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub imported: Vec<ImportSummary>,
    pub failures: Vec<ApplyFailure>,
}

/// Import a dungeon JSON document.
pub async fn import_dungeon(pool: &DbPool, data: &[u8], overwrite: bool) -> AppResult<ImportSummary> {
    let graph = Dungeon::from_json(data)?;
    let imported = pool.import_dungeon(&graph, overwrite).await?;
    Ok(ImportSummary::new(&graph, &imported))
}

/// Export a stored dungeon as a JSON document.
pub async fn export_dungeon(pool: &DbPool, dungeon_id: i32) -> AppResult<String> {
    pool.export_dungeon(dungeon_id).await?.to_json()
}

/// Export a stored dungeon into a new file. Existing files are never overwritten.
pub async fn export_dungeon_to_file(pool: &DbPool, dungeon_id: i32, path: &Path) -> AppResult<()> {
    if path.exists() {
        return Err(AppError::Validation(format!(
            "{} already exists, not overwriting",
            path.display()
        )));
    }

    let json = export_dungeon(pool, dungeon_id).await?;
    tokio::fs::write(path, json)
        .await
        .map_err(|e| AppError::FileSystem(format!("Failed to write {}: {}", path.display(), e)))?;

    info!("Successfully exported dungeon to: {}", path.display());
    Ok(())
}

/// Delete a dungeon with all its rooms and objects.
pub async fn delete_dungeon(pool: &DbPool, dungeon_id: i32) -> AppResult<DeleteSummary> {
    pool.delete_dungeon(dungeon_id).await
}

pub async fn list_dungeons(pool: &DbPool) -> AppResult<Vec<ListItem>> {
    pool.list_dungeons().await
}

pub async fn list_factions(pool: &DbPool) -> AppResult<Vec<ListItem>> {
    pool.list_factions().await
}

pub async fn list_archetypes(pool: &DbPool) -> AppResult<Vec<ListItem>> {
    pool.list_archetypes().await
}

/// Rooms of a dungeon keyed by list position.
pub async fn list_rooms(pool: &DbPool, dungeon_id: i32) -> AppResult<Vec<ListItem>> {
    pool.list_rooms(dungeon_id).await
}

/// Import every file in `dir`. A failing file is reported and skipped.
pub async fn apply_dungeon_dir(pool: &DbPool, dir: &Path, overwrite: bool) -> AppResult<ApplySummary> {
    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| {
        AppError::FileSystem(format!("Failed to read dungeon directory {}: {}", dir.display(), e))
    })?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();

    info!("Attempting to import {} dungeons...", files.len());

    let mut summary = ApplySummary::default();
    for file in files {
        trace!("Import candidate: {}", file.display());
        let result = match tokio::fs::read(&file).await {
            Ok(data) => import_dungeon(pool, &data, overwrite).await,
            Err(e) => Err(e.into()),
        };

        match result {
            Ok(imported) => summary.imported.push(imported),
            Err(e) => {
                error!("Failed to import {}: {}", file.display(), e);
                summary.failures.push(ApplyFailure {
                    file,
                    cause: e.to_string(),
                });
            }
        }
    }

    info!("Successfully imported {} dungeons!", summary.imported.len());
    Ok(summary)
}

/// Create an empty dungeon with a fresh UUID and return its JSON document.
/// With `dry_run` nothing is stored.
pub async fn new_dungeon(pool: &DbPool, new: NewDungeon, dry_run: bool) -> AppResult<String> {
    if new.name.trim().is_empty() {
        return Err(AppError::Validation("Dungeon name must not be empty".to_string()));
    }

    let graph = new.into_dungeon();
    let json = graph.to_json()?;
    if !dry_run {
        pool.import_dungeon(&graph, false).await?;
    }
    Ok(json)
}

/// Append an empty room and return the updated JSON document.
///
/// The dungeon is replaced as a whole, so it and all its rooms get new storage ids.
pub async fn add_room(pool: &DbPool, dungeon_id: i32, name: &str, dry_run: bool) -> AppResult<String> {
    if name.trim().is_empty() {
        return Err(AppError::Validation("Room name must not be empty".to_string()));
    }

    let mut graph = pool.export_dungeon(dungeon_id).await?;
    graph.rooms.push(Room::new(name));
    update_dungeon(pool, dungeon_id, &graph, dry_run).await
}

/// Remove the room at list position `index` and return the updated JSON document.
pub async fn remove_room(pool: &DbPool, dungeon_id: i32, index: usize, dry_run: bool) -> AppResult<String> {
    let mut graph = pool.export_dungeon(dungeon_id).await?;
    if index >= graph.rooms.len() {
        return Err(AppError::Validation(format!(
            "Dungeon {} has no room {} ({} rooms)",
            dungeon_id,
            index,
            graph.rooms.len()
        )));
    }

    graph.rooms.remove(index);
    update_dungeon(pool, dungeon_id, &graph, dry_run).await
}

async fn update_dungeon(pool: &DbPool, dungeon_id: i32, graph: &Dungeon, dry_run: bool) -> AppResult<String> {
    let json = graph.to_json()?;
    if !dry_run {
        pool.replace_dungeon(dungeon_id, graph).await?;
    }
    Ok(json)
}
