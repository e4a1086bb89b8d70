use super::{Store, WindowHit, WindowSnapshot};
use crate::error::{RateLimitError, Result};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// In-process store for tests and single-replica runs.
///
/// Every operation holds one mutex for its whole duration, which gives the
/// same per-key serialization a Redis server gives `MULTI/EXEC`. State is
/// not shared across processes.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

/// Minimum spacing between sweeps of expired windows.
const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Default)]
struct MemoryState {
    hashes: HashMap<String, HashMap<String, String>>,
    windows: HashMap<String, Window>,
    last_sweep: Option<Instant>,
}

impl MemoryState {
    /// Drop every expired window, at most once per [`SWEEP_INTERVAL`].
    fn sweep_expired(&mut self, clock: Instant) {
        let due = self
            .last_sweep
            .map_or(true, |last| clock.duration_since(last) >= SWEEP_INTERVAL);
        if due {
            self.windows.retain(|_, window| window.expires_at > clock);
            self.last_sweep = Some(clock);
        }
    }
}

struct Window {
    entries: BTreeSet<(i64, String)>,
    expires_at: Instant,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_fields(&self, key: &str, fields: &[String]) -> Result<Vec<Option<String>>> {
        let state = self.state.lock().await;
        let hash = state.hashes.get(key);

        Ok(fields
            .iter()
            .map(|field| hash.and_then(|h| h.get(field)).cloned())
            .collect())
    }

    async fn set_field(&self, key: &str, field: &str, value: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state
            .hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn record_hit(&self, key: &str, hit: &WindowHit) -> Result<WindowSnapshot> {
        let clock = Instant::now();
        let expires_at = clock
            .checked_add(Duration::from_secs(hit.ttl_seconds))
            .ok_or_else(|| {
                RateLimitError::InvalidRule(format!(
                    "window ttl {}s is out of range",
                    hit.ttl_seconds
                ))
            })?;
        let mut state = self.state.lock().await;
        state.sweep_expired(clock);

        let window = state.windows.entry(key.to_string()).or_insert_with(|| Window {
            entries: BTreeSet::new(),
            expires_at,
        });
        if window.expires_at <= clock {
            window.entries.clear();
        }

        window.entries = window.entries.split_off(&(hit.min_score, String::new()));
        window.entries.insert((hit.now, hit.member.clone()));
        window.expires_at = expires_at;

        Ok(WindowSnapshot {
            count: window.entries.len() as u64,
            oldest: window.entries.first().map(|(score, _)| *score),
        })
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
