//! MongoDB storage integration tests.
//!
//! Run with: cargo test --test storage_mongodb --features mongodb -- --ignored --nocapture
//!
//! Requires: MONGODB_URI env var or MongoDB on localhost:27017

mod storage;

use paysync::storage::MongoRecordStore;

fn mongodb_uri() -> String {
    std::env::var("MONGODB_URI").unwrap_or_else(|_| "mongodb://localhost:27017".to_string())
}

fn mongodb_database() -> String {
    std::env::var("MONGODB_DATABASE").unwrap_or_else(|_| "paysync_test".to_string())
}

/// Remove records created by the contract tests from one collection.
async fn cleanup_collection(client: &mongodb::Client, db_name: &str, collection: &str) {
    let db = client.database(db_name);
    let coll = db.collection::<mongodb::bson::Document>(collection);
    let _ = coll
        .delete_many(mongodb::bson::doc! { "registrationNumber": { "$regex": "^test_" } })
        .await;
}

#[tokio::test]
#[ignore = "requires running MongoDB instance"]
async fn test_mongodb_record_store() {
    println!("=== MongoDB RecordStore Tests ===");
    println!("Connecting to: {}", mongodb_uri());

    let client = mongodb::Client::with_uri_str(&mongodb_uri())
        .await
        .expect("Failed to connect to MongoDB");

    let db_name = mongodb_database();
    println!("Using database: {}", db_name);

    cleanup_collection(&client, &db_name, "registrations").await;
    cleanup_collection(&client, &db_name, "courseregforms").await;

    let store = MongoRecordStore::new(&client, &db_name)
        .await
        .expect("Failed to create record store");

    run_record_store_tests!(&store);

    cleanup_collection(&client, &db_name, "registrations").await;
    cleanup_collection(&client, &db_name, "courseregforms").await;

    println!("=== All MongoDB RecordStore tests PASSED ===");
}
