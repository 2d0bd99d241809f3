//! Server and reconciliation schedule configuration types.

use std::time::Duration;

use serde::Deserialize;

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,
    /// Port for the HTTP API.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    /// `host:port` string for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Reconciliation sweep scheduling.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReconciliationConfig {
    /// Run the sweep every N seconds inside the server.
    /// Absent or zero disables the schedule; operators then run
    /// `paysync-reconcile` by hand.
    pub interval_secs: Option<u64>,
}

impl ReconciliationConfig {
    /// Sweep interval, if scheduling is enabled.
    pub fn interval(&self) -> Option<Duration> {
        self.interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}
