//! Tests for planning, applying, skipping and reverting migrations.

use evedb::db::connectivity::{ReconnectProbe, RetryPolicy};
use evedb::error::AppError;
use evedb::migration::{
    Direction, MemoryMigrationSource, Migration, MigrationExecutor, MigrationLedger, plan,
};
use evedb::services::migrations::{
    self, RunMode, apply_migrations, migration_status, redo_migration, skip_migrations,
};

use super::test_helpers::{
    RestoringProbe, create_flaky_table, create_test_db, table_exists, write_migration,
};

fn write_three(dir: &std::path::Path) {
    write_migration(
        dir,
        "20240101000000-alpha.sql",
        &["CREATE TABLE alpha (id INTEGER PRIMARY KEY);"],
        &["DROP TABLE alpha;"],
    );
    write_migration(
        dir,
        "20240102000000-beta.sql",
        &[
            "CREATE TABLE beta (id INTEGER PRIMARY KEY, name TEXT);",
            "INSERT INTO beta (id, name) VALUES (1, 'one');",
        ],
        &["DROP TABLE beta;"],
    );
    write_migration(
        dir,
        "20240103000000-gamma.sql",
        &["CREATE TABLE gamma (id INTEGER PRIMARY KEY);"],
        &["DROP TABLE gamma;"],
    );
}

async fn ledger_ids(pool: &evedb::db::DbPool, ledger: MigrationLedger) -> Vec<String> {
    ledger
        .list_applied(pool.connection())
        .await
        .expect("Failed to read ledger")
        .into_iter()
        .map(|record| record.id)
        .collect()
}

fn memory_migrations() -> Vec<Migration> {
    vec![
        Migration::new(
            "001",
            vec!["CREATE TABLE one (id INTEGER)".to_string()],
            vec!["DROP TABLE one".to_string()],
        ),
        Migration::new(
            "002",
            vec![
                "CREATE TABLE two (id INTEGER)".to_string(),
                "INSERT INTO two VALUES (2)".to_string(),
            ],
            vec!["DROP TABLE two".to_string()],
        ),
    ]
}

fn probe(db: &super::test_helpers::TestDb) -> ReconnectProbe {
    ReconnectProbe::new(db.config.database_url.clone(), RetryPolicy::default())
}

#[tokio::test]
async fn test_up_then_down_round_trips_ledger() {
    let db = create_test_db().await;
    write_three(&db.config.migrations_dir);

    let outcome = apply_migrations(&db.config, Direction::Up, false, 0)
        .await
        .expect("Up failed");
    assert_eq!(outcome.applied, 3);
    assert_eq!(outcome.statements_executed, 4);
    assert_eq!(
        ledger_ids(&db.pool, MigrationLedger::schema()).await,
        vec![
            "20240101000000-alpha.sql",
            "20240102000000-beta.sql",
            "20240103000000-gamma.sql"
        ]
    );
    assert!(table_exists(&db.pool, "gamma").await);

    let outcome = apply_migrations(&db.config, Direction::Down, false, 0)
        .await
        .expect("Down failed");
    assert_eq!(outcome.applied, 3);
    let order: Vec<&str> = outcome.planned.iter().map(|p| p.id()).collect();
    assert_eq!(
        order,
        vec![
            "20240103000000-gamma.sql",
            "20240102000000-beta.sql",
            "20240101000000-alpha.sql"
        ]
    );
    assert!(ledger_ids(&db.pool, MigrationLedger::schema()).await.is_empty());
    assert!(!table_exists(&db.pool, "alpha").await);
}

#[tokio::test]
async fn test_limit_applies_oldest_first_and_reverts_newest_first() {
    let db = create_test_db().await;
    write_three(&db.config.migrations_dir);

    let outcome = apply_migrations(&db.config, Direction::Up, false, 2)
        .await
        .unwrap();
    assert_eq!(outcome.applied, 2);
    assert!(table_exists(&db.pool, "beta").await);
    assert!(!table_exists(&db.pool, "gamma").await);

    let outcome = apply_migrations(&db.config, Direction::Down, false, 1)
        .await
        .unwrap();
    assert_eq!(outcome.applied, 1);
    assert_eq!(
        ledger_ids(&db.pool, MigrationLedger::schema()).await,
        vec!["20240101000000-alpha.sql"]
    );
}

#[tokio::test]
async fn test_dry_run_changes_nothing() {
    let db = create_test_db().await;
    write_three(&db.config.migrations_dir);

    let outcome = apply_migrations(&db.config, Direction::Up, true, 0)
        .await
        .unwrap();
    assert_eq!(outcome.applied, 0);
    assert_eq!(outcome.statements_executed, 0);
    assert_eq!(outcome.planned.len(), 3);

    let lines = outcome.describe();
    assert_eq!(
        lines[0],
        "==> Would apply migration 20240101000000-alpha.sql (up)"
    );
    assert_eq!(lines[1], "CREATE TABLE alpha (id INTEGER PRIMARY KEY);");

    assert!(!table_exists(&db.pool, "alpha").await);
    assert!(!table_exists(&db.pool, "migrations").await);
}

#[tokio::test]
async fn test_skip_records_like_apply_without_running_statements() {
    let applied_db = create_test_db().await;
    let skipped_db = create_test_db().await;
    let source = MemoryMigrationSource::new(memory_migrations());
    let ledger = MigrationLedger::schema();

    let applied = migrations::run_migrations(
        &applied_db.pool,
        ledger,
        &source,
        &probe(&applied_db),
        Direction::Up,
        RunMode::Apply,
        0,
    )
    .await
    .unwrap();
    let skipped = migrations::run_migrations(
        &skipped_db.pool,
        ledger,
        &source,
        &probe(&skipped_db),
        Direction::Up,
        RunMode::Skip,
        0,
    )
    .await
    .unwrap();

    assert_eq!(applied.applied, skipped.applied);
    assert_eq!(applied.statements_executed, 3);
    assert_eq!(skipped.statements_executed, 0);
    assert_eq!(
        ledger_ids(&applied_db.pool, ledger).await,
        ledger_ids(&skipped_db.pool, ledger).await
    );
    assert!(table_exists(&applied_db.pool, "two").await);
    assert!(!table_exists(&skipped_db.pool, "two").await);
}

#[tokio::test]
async fn test_skip_service_messages() {
    let db = create_test_db().await;
    write_three(&db.config.migrations_dir);

    let outcome = skip_migrations(&db.config, Direction::Up, 0).await.unwrap();
    assert_eq!(outcome.skipped_message(), "Skipped 3 migrations");
    assert!(!table_exists(&db.pool, "alpha").await);

    let outcome = skip_migrations(&db.config, Direction::Up, 0).await.unwrap();
    assert_eq!(
        outcome.skipped_message(),
        "All migrations have already been applied"
    );
}

#[tokio::test]
async fn test_failing_migration_stops_plan_and_leaves_ledger() {
    let db = create_test_db().await;
    let source = MemoryMigrationSource::new(vec![
        Migration::new("001", vec!["CREATE TABLE ok (id INTEGER)".to_string()], vec![]),
        Migration::new(
            "002",
            vec![
                "CREATE TABLE half (id INTEGER)".to_string(),
                "INSERT INTO missing_table VALUES (1)".to_string(),
            ],
            vec![],
        ),
        Migration::new("003", vec!["CREATE TABLE never (id INTEGER)".to_string()], vec![]),
    ]);
    let ledger = MigrationLedger::schema();

    let available = ledger.list_available(&source).unwrap();
    let planned = plan(&available, &[], Direction::Up, 0);
    let mut executor = MigrationExecutor::new(db.pool.connection(), ledger);
    let err = executor.apply(&planned, false).await.unwrap_err();

    match err {
        AppError::Execution { id, .. } => assert_eq!(id, "002"),
        other => panic!("expected execution error, got {:?}", other),
    }
    assert_eq!(ledger_ids(&db.pool, ledger).await, vec!["001"]);
    assert!(!table_exists(&db.pool, "never").await);
    assert_eq!(executor.statements_executed(), 2);
}

#[tokio::test]
async fn test_ledgers_are_independent() {
    let db = create_test_db().await;
    let source = MemoryMigrationSource::new(memory_migrations());

    migrations::run_migrations(
        &db.pool,
        MigrationLedger::seed(),
        &source,
        &probe(&db),
        Direction::Up,
        RunMode::Skip,
        0,
    )
    .await
    .unwrap();

    assert_eq!(ledger_ids(&db.pool, MigrationLedger::seed()).await.len(), 2);
    assert!(ledger_ids(&db.pool, MigrationLedger::schema()).await.is_empty());
    assert!(ledger_ids(&db.pool, MigrationLedger::base()).await.is_empty());
}

#[tokio::test]
async fn test_redo_reverts_and_reapplies_latest() {
    let db = create_test_db().await;
    write_three(&db.config.migrations_dir);
    apply_migrations(&db.config, Direction::Up, false, 0)
        .await
        .unwrap();

    let dry = redo_migration(&db.config, true).await.unwrap();
    assert_eq!(
        dry.describe(),
        vec![
            "==> Would apply migration 20240103000000-gamma.sql (down)",
            "DROP TABLE gamma;",
            "==> Would apply migration 20240103000000-gamma.sql (up)",
            "CREATE TABLE gamma (id INTEGER PRIMARY KEY);",
        ]
    );

    let outcome = redo_migration(&db.config, false).await.unwrap();
    assert_eq!(outcome.applied, 2);
    assert_eq!(outcome.statements_executed, 2);
    assert_eq!(ledger_ids(&db.pool, MigrationLedger::schema()).await.len(), 3);
    assert!(table_exists(&db.pool, "gamma").await);
}

#[tokio::test]
async fn test_redo_with_nothing_applied() {
    let db = create_test_db().await;
    write_three(&db.config.migrations_dir);

    let err = redo_migration(&db.config, false).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_status_reports_applied_and_missing() {
    let db = create_test_db().await;
    write_three(&db.config.migrations_dir);
    apply_migrations(&db.config, Direction::Up, false, 1)
        .await
        .unwrap();

    let ledger = MigrationLedger::schema();
    ledger
        .record_applied(db.pool.connection(), "20230101000000-removed.sql")
        .await
        .unwrap();

    let report = migration_status(&db.config).await.unwrap();
    assert_eq!(report.rows.len(), 3);
    assert!(report.rows[0].applied);
    assert!(report.rows[0].applied_at.is_some());
    assert!(!report.rows[1].applied);
    assert_eq!(report.rows[1].applied_at, None);
    assert_eq!(report.missing, vec!["20230101000000-removed.sql"]);

    // Records without a file are not planned for Down
    let outcome = apply_migrations(&db.config, Direction::Down, false, 0)
        .await
        .unwrap();
    assert_eq!(outcome.applied, 1);
    assert_eq!(
        ledger_ids(&db.pool, ledger).await,
        vec!["20230101000000-removed.sql"]
    );
}

fn flaky_migrations() -> MemoryMigrationSource {
    MemoryMigrationSource::new(vec![
        Migration::new("1", vec!["CREATE TABLE first (id INTEGER)".to_string()], vec![]),
        Migration::new(
            "2",
            vec![
                "CREATE TABLE second (id INTEGER)".to_string(),
                "INSERT INTO guarded VALUES (2)".to_string(),
            ],
            vec![],
        ),
        Migration::new("3", vec!["CREATE TABLE third (id INTEGER)".to_string()], vec![]),
    ])
}

#[tokio::test]
async fn test_plan_resumes_after_connection_returns() {
    let db = create_test_db().await;
    create_flaky_table(&db.pool).await;
    let ledger = MigrationLedger::schema();
    let probe = RestoringProbe::new(&db.pool, true);

    let outcome = migrations::run_migrations(
        &db.pool,
        ledger,
        &flaky_migrations(),
        &probe,
        Direction::Up,
        RunMode::Apply,
        0,
    )
    .await
    .unwrap();

    assert_eq!(probe.waits(), 1);
    assert_eq!(outcome.applied, 3);
    assert_eq!(ledger_ids(&db.pool, ledger).await, vec!["1", "2", "3"]);
    assert!(table_exists(&db.pool, "second").await);
}

#[tokio::test]
async fn test_resumed_plan_honours_limit() {
    let db = create_test_db().await;
    create_flaky_table(&db.pool).await;
    let ledger = MigrationLedger::schema();
    let probe = RestoringProbe::new(&db.pool, true);

    let outcome = migrations::run_migrations(
        &db.pool,
        ledger,
        &flaky_migrations(),
        &probe,
        Direction::Up,
        RunMode::Apply,
        2,
    )
    .await
    .unwrap();

    assert_eq!(outcome.applied, 2);
    assert_eq!(ledger_ids(&db.pool, ledger).await, vec!["1", "2"]);
    assert!(!table_exists(&db.pool, "third").await);
}

#[tokio::test]
async fn test_plan_gives_up_after_repeated_connection_loss() {
    let db = create_test_db().await;
    create_flaky_table(&db.pool).await;
    let ledger = MigrationLedger::schema();
    let probe = RestoringProbe::new(&db.pool, false);

    let err = migrations::run_migrations(
        &db.pool,
        ledger,
        &flaky_migrations(),
        &probe,
        Direction::Up,
        RunMode::Apply,
        0,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, AppError::Interrupted { ref id } if id == "2"));
    assert_eq!(probe.waits(), 4);
    assert_eq!(ledger_ids(&db.pool, ledger).await, vec!["1"]);
    assert!(!table_exists(&db.pool, "second").await);
}
