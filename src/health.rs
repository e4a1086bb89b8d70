use serde::Serialize;
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use crate::store::Store;

static START_TIME: std::sync::LazyLock<SystemTime> = std::sync::LazyLock::new(SystemTime::now);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreStatus {
    Ok,
    Down,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: String,
    pub store: StoreStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub store_response_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Probes the shared store and reports its reachability. Never fails.
#[derive(Clone)]
pub struct HealthChecker {
    store: Arc<dyn Store>,
}

impl HealthChecker {
    pub fn new(store: Arc<dyn Store>) -> Self {
        // Pin the uptime origin to construction rather than first probe
        std::sync::LazyLock::force(&START_TIME);
        Self { store }
    }

    pub async fn check_health(&self) -> HealthStatus {
        let uptime = SystemTime::now()
            .duration_since(*START_TIME)
            .unwrap_or_default()
            .as_secs();

        let start = Instant::now();
        let probe = self.store.ping().await;
        let response_time = start.elapsed().as_millis() as u64;

        let (store, error) = match probe {
            Ok(()) => (StoreStatus::Ok, None),
            Err(e) => {
                tracing::warn!(error = %e, "store_probe_failed");
                (StoreStatus::Down, Some(e.to_string()))
            }
        };

        HealthStatus {
            status: "ok".to_string(),
            store,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: uptime,
            store_response_time_ms: response_time,
            error,
        }
    }
}
