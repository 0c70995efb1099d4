//! End-to-end tests against a real PostgreSQL instance
//!
//! Configure the target with `PGHOST`, `PGPORT`, `PGUSER`, `PGPASSWORD` and
//! `PGDATABASE`, then run with `cargo test -- --ignored`.

use serial_test::serial;
use std::time::Duration;

use pgshift_core::{MigrationOutcome, Migrator};
use pgshift_testing::{MigrationFixture, TestDatabase};

const TABLE: &str = "pgshift_e2e_ledger";

async fn setup() -> (MigrationFixture, TestDatabase, Migrator) {
    let fixture = MigrationFixture::new().unwrap();
    let db = TestDatabase::new().await.unwrap();
    db.drop_tables(&[TABLE, "e2e_users", "e2e_posts", "e2e_tags"]).await.unwrap();
    let migrator = Migrator::new(db.migrator_config(fixture.path(), TABLE));
    (fixture, db, migrator)
}

#[tokio::test]
#[serial]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_create_up_down_round_trip() {
    let (fixture, db, migrator) = setup().await;

    let migration = migrator.create("test").await.unwrap();
    assert!(!db.table_exists(TABLE).await.unwrap());

    migrator.up().await.unwrap();
    assert_eq!(db.ledger(TABLE).await.unwrap().len(), 1);

    migrator.down().await.unwrap();
    assert!(db.ledger(TABLE).await.unwrap().is_empty());
    assert_eq!(fixture.directories().unwrap(), vec![migration.encode()]);

    db.close().await;
}

#[tokio::test]
#[serial]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_scripts_run_and_revert() {
    let (fixture, db, migrator) = setup().await;
    fixture
        .add(
            1_000,
            "create_users",
            "CREATE TABLE e2e_users (id INT PRIMARY KEY);:INSERT INTO e2e_users VALUES (1);",
            "DROP TABLE e2e_users;",
        )
        .unwrap();
    fixture
        .add(
            2_000,
            "create_posts",
            "CREATE TABLE e2e_posts (id INT REFERENCES e2e_users (id));",
            "DROP TABLE e2e_posts;",
        )
        .unwrap();

    assert_eq!(migrator.up().await.unwrap().count(), 2);
    assert!(db.table_exists("e2e_users").await.unwrap());
    assert!(db.table_exists("e2e_posts").await.unwrap());

    assert_eq!(migrator.down().await.unwrap().count(), 2);
    assert!(!db.table_exists("e2e_users").await.unwrap());
    assert!(!db.table_exists("e2e_posts").await.unwrap());

    db.close().await;
}

#[tokio::test]
#[serial]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_failed_batch_leaves_no_trace() {
    let (fixture, db, migrator) = setup().await;
    fixture
        .add(1_000, "create_users", "CREATE TABLE e2e_users (id INT);", "DROP TABLE e2e_users;")
        .unwrap();
    fixture
        .add(2_000, "broken", "CREATE TABLEE e2e_posts (id INT);", "")
        .unwrap();

    let outcome = migrator.up().await.unwrap();

    match outcome {
        MigrationOutcome::RolledBack { cause } => assert_eq!(cause.sqlstate(), Some("42601")),
        other => panic!("Expected a rolled back batch, got {:?}", other),
    }
    assert!(!db.table_exists("e2e_users").await.unwrap());
    assert!(db.ledger(TABLE).await.unwrap().is_empty());

    db.close().await;
}

#[tokio::test]
#[serial]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_two_migrations_revert_newest_first() {
    let (_fixture, db, migrator) = setup().await;

    migrator.create("a").await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    migrator.create("b").await.unwrap();

    migrator.up().await.unwrap();
    let names: Vec<String> = db
        .ledger(TABLE)
        .await
        .unwrap()
        .into_iter()
        .map(|record| record.name)
        .collect();
    assert_eq!(names, vec!["a", "b"]);

    match migrator.down().await.unwrap() {
        MigrationOutcome::Reverted(records) => {
            let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
            assert_eq!(names, vec!["b", "a"]);
        }
        other => panic!("Expected reverted migrations, got {:?}", other),
    }
    assert!(db.ledger(TABLE).await.unwrap().is_empty());

    db.close().await;
}

#[tokio::test]
#[serial]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_chunk_with_several_statements() {
    let (fixture, db, migrator) = setup().await;
    fixture
        .add(
            1_000,
            "create_tables",
            "CREATE TABLE e2e_users (id INT);\nCREATE TABLE e2e_posts (id INT);:\nCREATE TABLE e2e_tags (id INT);",
            "DROP TABLE e2e_tags;\nDROP TABLE e2e_posts;\nDROP TABLE e2e_users;",
        )
        .unwrap();

    let outcome = migrator.up().await.unwrap();
    assert!(!outcome.is_rolled_back(), "{:?}", outcome);
    for table in ["e2e_users", "e2e_posts", "e2e_tags"] {
        assert!(db.table_exists(table).await.unwrap(), "{} missing", table);
    }

    assert_eq!(migrator.down().await.unwrap().count(), 1);
    for table in ["e2e_users", "e2e_posts", "e2e_tags"] {
        assert!(!db.table_exists(table).await.unwrap(), "{} left behind", table);
    }

    db.close().await;
}

#[tokio::test]
#[serial]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_names_with_path_characters_apply_once() {
    let (fixture, db, migrator) = setup().await;

    let seed = migrator.create("seed.sql").await.unwrap();
    assert!(migrator.create("seed.sql").await.is_err());
    tokio::time::sleep(Duration::from_millis(2)).await;
    let nested = migrator.create("users/email").await.unwrap();

    assert_eq!(
        fixture.directories().unwrap(),
        vec![seed.encode(), nested.encode()]
    );

    assert_eq!(migrator.up().await.unwrap().count(), 2);
    assert!(matches!(migrator.up().await.unwrap(), MigrationOutcome::UpToDate));

    let names: Vec<String> = db
        .ledger(TABLE)
        .await
        .unwrap()
        .into_iter()
        .map(|record| record.name)
        .collect();
    assert_eq!(names, vec!["seed_sql", "users_email"]);

    assert_eq!(migrator.down().await.unwrap().count(), 2);
    db.close().await;
}
