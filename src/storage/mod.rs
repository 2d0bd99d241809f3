//! Storage implementations.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::config::{StorageConfig, StorageType};
use crate::interfaces::RecordStore;

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod schema;
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "mongodb")]
pub mod mongodb;

pub use memory::InMemoryRecordStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteRecordStore;

#[cfg(feature = "mongodb")]
pub use mongodb::MongoRecordStore;

/// Initialize storage based on configuration.
///
/// Connection attempts are retried with backoff so the service can start
/// before its database is reachable.
pub async fn init_storage(
    config: &StorageConfig,
) -> Result<Arc<dyn RecordStore>, Box<dyn std::error::Error>> {
    info!(storage = %config.storage_type, "Initializing storage");
    match config.storage_type {
        StorageType::Memory => {
            Ok(Arc::new(InMemoryRecordStore::new()))
        }
        #[cfg(feature = "sqlite")]
        StorageType::Sqlite => {
            use backon::Retryable;

            info!(path = %config.sqlite.path, "Opening SQLite database");
            if let Some(parent) = std::path::Path::new(&config.sqlite.path).parent() {
                std::fs::create_dir_all(parent)?;
            }

            let url = format!("sqlite:{}?mode=rwc", config.sqlite.path);
            let pool = (|| sqlx::SqlitePool::connect(&url))
                .retry(crate::utils::retry::connection_backoff())
                .notify(|err: &sqlx::Error, dur: Duration| {
                    warn!(error = %err, delay = ?dur, "SQLite connection failed, retrying");
                })
                .await?;

            let store = SqliteRecordStore::new(pool);
            store.init().await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "sqlite"))]
        StorageType::Sqlite => {
            error!("SQLite storage requested but 'sqlite' feature is not enabled");
            Err("SQLite feature not enabled".into())
        }
        #[cfg(feature = "mongodb")]
        StorageType::Mongodb => {
            use backon::Retryable;

            info!(database = %config.mongodb.database, "Connecting to MongoDB");
            let uri = config.mongodb.uri.clone();
            let database = config.mongodb.database.clone();
            let store = (|| {
                let uri = uri.clone();
                let database = database.clone();
                async move {
                    let client = ::mongodb::Client::with_uri_str(&uri).await?;
                    let store = MongoRecordStore::new(&client, &database).await?;
                    Ok::<_, crate::interfaces::StorageError>(store)
                }
            })
            .retry(crate::utils::retry::connection_backoff())
            .notify(|err: &crate::interfaces::StorageError, dur: Duration| {
                warn!(error = %err, delay = ?dur, "MongoDB connection failed, retrying");
            })
            .await?;

            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "mongodb"))]
        StorageType::Mongodb => {
            error!("MongoDB storage requested but 'mongodb' feature is not enabled");
            Err("MongoDB feature not enabled".into())
        }
    }
}
