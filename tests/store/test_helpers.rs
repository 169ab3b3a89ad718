//! Shared helpers for the storage tests.

use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

use evedb::config::{Config, PoolSettings};
use evedb::db::DbPool;
use evedb::db::connectivity::ConnectionProbe;
use evedb::error::AppResult;
use evedb::entity::{archetype, dungeon, faction, room, room_object};
use evedb::models::{DUNGEON_FORMAT_VERSION, Dungeon, DungeonStatus, Room, RoomObject};
use flate2::Compression;
use flate2::write::GzEncoder;
use async_trait::async_trait;
use sea_orm::{ConnectionTrait, EntityTrait, Schema, Set};
use tempfile::TempDir;

/// A database file and working directories that live as long as the value.
pub struct TestDb {
    pub dir: TempDir,
    pub config: Config,
    pub pool: DbPool,
}

/// Create an empty SQLite database with migration, base and dungeon directories.
pub async fn create_test_db() -> TestDb {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("evedb.sqlite");

    let mut config = Config::with_database_url(format!("sqlite://{}?mode=rwc", db_path.display()));
    config.migrations_dir = dir.path().join("migrations");
    config.base_dir = dir.path().join("base");
    config.dungeon_dir = dir.path().join("dungeons");
    config.pool = PoolSettings {
        max_connections: 2,
        min_connections: 0,
        ..PoolSettings::default()
    };

    for path in [&config.migrations_dir, &config.base_dir, &config.dungeon_dir] {
        std::fs::create_dir_all(path).expect("Failed to create test directory");
    }

    let pool = DbPool::new(&config)
        .await
        .expect("Failed to open test database");

    TestDb { dir, config, pool }
}

/// Create a database holding the dungeon tables plus a few factions and archetypes.
pub async fn create_dungeon_db() -> TestDb {
    let db = create_test_db().await;
    let conn = db.pool.connection();
    let backend = conn.get_database_backend();
    let schema = Schema::new(backend);

    let tables = [
        schema.create_table_from_entity(dungeon::Entity),
        schema.create_table_from_entity(room::Entity),
        schema.create_table_from_entity(room_object::Entity),
        schema.create_table_from_entity(faction::Entity),
        schema.create_table_from_entity(archetype::Entity),
    ];
    for table in &tables {
        conn.execute_raw(backend.build(table))
            .await
            .expect("Failed to create dungeon table");
    }

    for (faction_id, name) in [(500011, "Angel Cartel"), (500001, "Caldari State")] {
        faction::Entity::insert(faction::ActiveModel {
            faction_id: Set(faction_id),
            faction_name: Set(name.to_string()),
        })
        .exec_without_returning(conn)
        .await
        .expect("Failed to insert faction");
    }

    for (archetype_id, name) in [(2, "Combat Site"), (1, "Anomaly")] {
        archetype::Entity::insert(archetype::ActiveModel {
            archetype_id: Set(archetype_id),
            archetype_name: Set(name.to_string()),
        })
        .exec_without_returning(conn)
        .await
        .expect("Failed to insert archetype");
    }

    db
}

fn object(type_id: i32, x: i32) -> RoomObject {
    RoomObject {
        type_id,
        group_id: 226,
        x,
        y: -x,
        z: 2 * x,
        yaw: 90,
        pitch: 15,
        roll: -30,
        radius: 5000,
    }
}

/// A dungeon with two rooms and three objects.
pub fn sample_dungeon(uuid: &str, name: &str) -> Dungeon {
    Dungeon {
        version: DUNGEON_FORMAT_VERSION,
        id: None,
        uuid: uuid.to_string(),
        name: name.to_string(),
        status: DungeonStatus::Testing,
        faction_id: 500011,
        archetype_id: 2,
        rooms: vec![
            Room {
                name: "Entrance".to_string(),
                objects: vec![object(17774, 100), object(17775, 200)],
            },
            Room {
                name: "Boss Chamber".to_string(),
                objects: vec![object(18001, 300)],
            },
        ],
    }
}

/// Write a gzip-compressed file.
pub fn write_gz(path: &Path, contents: &str) {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(contents.as_bytes())
        .expect("Failed to compress");
    let bytes = encoder.finish().expect("Failed to finish gzip stream");
    std::fs::write(path, bytes).expect("Failed to write gz file");
}

/// Write a migration file with the given up and down statements.
pub fn write_migration(dir: &Path, id: &str, up: &[&str], down: &[&str]) {
    let mut contents = String::from("-- +migrate Up\n");
    for statement in up {
        contents.push_str(statement);
        contents.push('\n');
    }
    contents.push_str("\n-- +migrate Down\n");
    for statement in down {
        contents.push_str(statement);
        contents.push('\n');
    }
    std::fs::write(dir.join(id), contents).expect("Failed to write migration");
}

/// Whether a table exists in the test database.
pub async fn table_exists(pool: &DbPool, table: &str) -> bool {
    let backend = pool.connection().get_database_backend();
    let row = pool
        .connection()
        .query_one_raw(sea_orm::Statement::from_sql_and_values(
            backend,
            "SELECT COUNT(*) AS n FROM sqlite_master WHERE type = 'table' AND name = ?",
            [table.into()],
        ))
        .await
        .expect("Failed to query sqlite_master")
        .expect("COUNT returned no row");
    row.try_get::<i64>("", "n").expect("Failed to read count") > 0
}

/// Create table `guarded`. While `flaky_switch.armed` is 1, every insert into it
/// fails with the error MySQL reports for a dropped connection.
pub async fn create_flaky_table(pool: &DbPool) {
    let statements = [
        "CREATE TABLE flaky_switch (armed INTEGER NOT NULL)",
        "INSERT INTO flaky_switch (armed) VALUES (1)",
        "CREATE TABLE guarded (id INTEGER)",
        "CREATE TRIGGER guarded_connection_drop BEFORE INSERT ON guarded \
         WHEN (SELECT armed FROM flaky_switch) = 1 \
         BEGIN SELECT RAISE(ABORT, 'Lost connection to MySQL server during query'); END",
    ];
    for statement in statements {
        pool.connection()
            .execute_unprepared(statement)
            .await
            .expect("Failed to create flaky table");
    }
}

/// Reports the database as back after each wait. With `restore`, the first
/// wait also disarms `guarded` so the next attempt succeeds.
pub struct RestoringProbe {
    pool: DbPool,
    restore: bool,
    waits: AtomicU32,
}

impl RestoringProbe {
    pub fn new(pool: &DbPool, restore: bool) -> Self {
        Self {
            pool: pool.clone(),
            restore,
            waits: AtomicU32::new(0),
        }
    }

    pub fn waits(&self) -> u32 {
        self.waits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectionProbe for RestoringProbe {
    async fn wait_until_available(&self) -> AppResult<u32> {
        self.waits.fetch_add(1, Ordering::SeqCst);
        if self.restore {
            self.pool
                .connection()
                .execute_unprepared("UPDATE flaky_switch SET armed = 0")
                .await?;
        }
        Ok(1)
    }
}
