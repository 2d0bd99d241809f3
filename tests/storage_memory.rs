//! In-memory storage integration tests.
//!
//! Run with: cargo test --test storage_memory

mod storage;

use paysync::storage::InMemoryRecordStore;

#[tokio::test]
async fn test_memory_record_store() {
    println!("=== In-memory RecordStore Tests ===");

    let store = InMemoryRecordStore::new();
    run_record_store_tests!(&store);

    println!("=== All in-memory RecordStore tests PASSED ===");
}
