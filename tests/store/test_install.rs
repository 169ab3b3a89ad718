//! Tests for the base dataset install and the market seed guard.

use evedb::migration::base::{BASE_ID_PREFIX, install_base};
use evedb::migration::MigrationLedger;
use evedb::services::migrations::{install, seed_market};

use super::test_helpers::{
    RestoringProbe, TestDb, create_flaky_table, create_test_db, table_exists, write_gz,
    write_migration,
};

fn write_base_files(db: &TestDb) {
    let base = &db.config.base_dir;
    std::fs::create_dir_all(base.join("nested")).unwrap();

    write_gz(
        &base.join("invTypes.sql.gz"),
        "-- Dump of invTypes\n\
         CREATE TABLE invTypes (\n\
           typeID INTEGER PRIMARY KEY,\n\
           typeName TEXT\n\
         );\n\
         INSERT INTO invTypes VALUES (34, 'Tritanium');\n",
    );
    write_gz(
        &base.join("nested").join("staStations.sql.gz"),
        "CREATE TABLE staStations (stationID INTEGER, regionID INTEGER);\n",
    );
    std::fs::write(base.join("corrupt.sql.gz"), b"this is not gzip").unwrap();
    write_gz(
        &base.join("broken.sql.gz"),
        "INSERT INTO nowhere VALUES (1);\n",
    );

    write_migration(
        &db.config.migrations_dir,
        "20240101000000-dungeon-tables.sql",
        &["CREATE TABLE dunDungeons (dungeonID INTEGER PRIMARY KEY);"],
        &["DROP TABLE dunDungeons;"],
    );
}

async fn base_ledger(db: &TestDb) -> Vec<String> {
    MigrationLedger::base()
        .list_applied(db.pool.connection())
        .await
        .unwrap()
        .into_iter()
        .map(|record| record.id)
        .collect()
}

#[tokio::test]
async fn test_install_empty_database() {
    let db = create_test_db().await;
    write_base_files(&db);

    let report = install(&db.config, false, 0).await.unwrap();

    let base = report.base.expect("base should be installed on an empty database");
    assert_eq!(base.applied, 2);
    assert_eq!(base.already_installed, 0);
    let failed: Vec<&str> = base.failures.iter().map(|f| f.file.as_str()).collect();
    let base_dir = &db.config.base_dir;
    assert_eq!(
        failed,
        vec![
            base_dir.join("broken.sql.gz").display().to_string(),
            base_dir.join("corrupt.sql.gz").display().to_string(),
        ]
    );

    assert_eq!(
        base_ledger(&db).await,
        vec![
            format!("{}{}", BASE_ID_PREFIX, base_dir.join("invTypes.sql.gz").display()),
            format!(
                "{}{}",
                BASE_ID_PREFIX,
                base_dir.join("nested").join("staStations.sql.gz").display()
            ),
        ]
    );
    assert!(table_exists(&db.pool, "invTypes").await);
    assert!(table_exists(&db.pool, "staStations").await);

    assert_eq!(report.migrations.applied, 1);
    assert!(table_exists(&db.pool, "dunDungeons").await);
}

#[tokio::test]
async fn test_install_keeps_existing_database() {
    let db = create_test_db().await;
    write_base_files(&db);

    install(&db.config, false, 0).await.unwrap();
    let report = install(&db.config, false, 0).await.unwrap();

    assert!(report.base.is_none());
    assert_eq!(report.migrations.applied, 0);
    assert_eq!(
        report.migrations.applied_message(),
        "Applied 0 migrations"
    );
    assert_eq!(base_ledger(&db).await.len(), 2);
}

#[tokio::test]
async fn test_install_dry_run_only_plans() {
    let db = create_test_db().await;
    write_base_files(&db);

    let report = install(&db.config, true, 0).await.unwrap();

    assert!(report.base.is_none());
    assert_eq!(report.migrations.planned.len(), 1);
    assert_eq!(report.migrations.applied, 0);
    assert!(!table_exists(&db.pool, "invTypes").await);
    assert!(!table_exists(&db.pool, "base_migrations").await);
}

#[tokio::test]
async fn test_seed_requires_installed_database() {
    let db = create_test_db().await;

    let err = seed_market(&db.config, false).await.unwrap_err();
    assert!(err.is_validation());
    assert!(!table_exists(&db.pool, "seed_migrations").await);
}

#[tokio::test]
async fn test_base_file_restarts_after_connection_loss() {
    let db = create_test_db().await;
    create_flaky_table(&db.pool).await;
    let base = &db.config.base_dir;
    write_gz(
        &base.join("a.sql.gz"),
        "CREATE TABLE invGroups (groupID INTEGER);\nINSERT INTO guarded VALUES (1);\n",
    );
    write_gz(
        &base.join("b.sql.gz"),
        "CREATE TABLE invCategories (categoryID INTEGER);\n",
    );

    let probe = RestoringProbe::new(&db.pool, true);
    let report = install_base(&db.config, &probe).await.unwrap();

    assert!(report.failures.is_empty(), "{:?}", report.failures);
    assert_eq!(report.applied, 2);
    assert_eq!(probe.waits(), 1);
    assert_eq!(
        base_ledger(&db).await,
        vec![
            format!("{}{}", BASE_ID_PREFIX, base.join("a.sql.gz").display()),
            format!("{}{}", BASE_ID_PREFIX, base.join("b.sql.gz").display()),
        ]
    );
    assert!(table_exists(&db.pool, "invGroups").await);
}

#[tokio::test]
async fn test_base_file_gives_up_after_repeated_connection_loss() {
    let db = create_test_db().await;
    create_flaky_table(&db.pool).await;
    let base = &db.config.base_dir;
    write_gz(&base.join("a.sql.gz"), "INSERT INTO guarded VALUES (1);\n");
    write_gz(
        &base.join("b.sql.gz"),
        "CREATE TABLE invCategories (categoryID INTEGER);\n",
    );

    let probe = RestoringProbe::new(&db.pool, false);
    let report = install_base(&db.config, &probe).await.unwrap();

    // One wait for the first attempt and one per restart
    assert_eq!(probe.waits(), 4);
    assert_eq!(report.applied, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(
        report.failures[0].file,
        base.join("a.sql.gz").display().to_string()
    );
    assert_eq!(
        base_ledger(&db).await,
        vec![format!("{}{}", BASE_ID_PREFIX, base.join("b.sql.gz").display())]
    );
}
