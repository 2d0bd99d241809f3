//! SQLite storage integration tests.
//!
//! Run with: cargo test --test storage_sqlite --features sqlite
//!
//! Uses in-memory database by default, no external dependencies required.

mod storage;

use sqlx::sqlite::SqlitePoolOptions;

use paysync::storage::SqliteRecordStore;

/// Get SQLite connection string (in-memory for tests)
fn sqlite_uri() -> String {
    std::env::var("SQLITE_URI").unwrap_or_else(|_| "sqlite::memory:".to_string())
}

async fn connect_and_init() -> SqliteRecordStore {
    // Every connection to sqlite::memory: opens its own database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&sqlite_uri())
        .await
        .expect("Failed to connect to SQLite");

    let store = SqliteRecordStore::new(pool);
    store.init().await.expect("Failed to create schema");
    store
}

#[tokio::test]
async fn test_sqlite_record_store() {
    println!("=== SQLite RecordStore Tests ===");
    println!("Connecting to: {}", sqlite_uri());

    let store = connect_and_init().await;
    run_record_store_tests!(&store);

    println!("=== All SQLite RecordStore tests PASSED ===");
}

#[tokio::test]
async fn test_sqlite_init_is_repeatable() {
    let store = connect_and_init().await;
    store.init().await.expect("second init should succeed");
}
