//! paysync-server: HTTP API and periodic reconciliation
//!
//! ## Configuration
//! ```yaml
//! server:
//!   port: 8080
//! storage:
//!   type: sqlite
//!   sqlite:
//!     path: data/paysync.db
//! reconciliation:
//!   interval_secs: 900
//! ```

use std::sync::Arc;

use tracing::info;

use paysync::api;
use paysync::config::Config;
use paysync::services::{ReconciliationService, SweepScheduler};
use paysync::storage::init_storage;
use paysync::utils::bootstrap::init_tracing;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = Config::load(None)?;
    let store = init_storage(&config.storage).await?;
    let service = Arc::new(ReconciliationService::new(store));

    let scheduler = match config.reconciliation.interval() {
        Some(interval) => {
            info!(interval_secs = interval.as_secs(), "Periodic reconciliation enabled");
            Some(SweepScheduler::new(Arc::clone(&service), interval).spawn())
        }
        None => {
            info!("Periodic reconciliation disabled");
            None
        }
    };

    let result = api::serve(service, &config.server.bind_address()).await;

    if let Some(handle) = scheduler {
        handle.abort();
    }
    result
}
