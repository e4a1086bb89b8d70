//! Shared counter store boundary.
//!
//! The limiter holds no authoritative state of its own. Rules and window
//! records live in a store shared by every replica, and each decision goes
//! back to the store. Implementations must execute [`Store::record_hit`] as
//! one atomic unit per key.

mod memory_store;
mod redis_store;

pub use memory_store::MemoryStore;
pub use redis_store::RedisStore;

use crate::error::Result;
use async_trait::async_trait;

/// One request to be recorded against a window key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowHit {
    /// Unique member name; the score alone is not unique
    pub member: String,
    /// Epoch seconds of the request, used as the score
    pub now: i64,
    /// Entries scored below this are pruned before counting
    pub min_score: i64,
    /// Expiry applied to the key after the batch
    pub ttl_seconds: u64,
}

/// State of a window right after a hit was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSnapshot {
    pub count: u64,
    pub oldest: Option<i64>,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Read several fields of one mapping, preserving field order.
    async fn get_fields(&self, key: &str, fields: &[String]) -> Result<Vec<Option<String>>>;

    /// Upsert one field of a mapping.
    async fn set_field(&self, key: &str, field: &str, value: &str) -> Result<()>;

    /// Prune, insert, count, read the oldest score and refresh the expiry
    /// of one ordered collection, all without interleaving.
    async fn record_hit(&self, key: &str, hit: &WindowHit) -> Result<WindowSnapshot>;

    /// Reachability probe.
    async fn ping(&self) -> Result<()>;

    /// Release held connections. Called once at shutdown.
    async fn close(&self) {}
}

/// Escape `separator` and backslash with a backslash inside one component
/// of a composite key, so distinct component tuples never join to the same key.
/// Components without either character are returned unchanged.
pub fn escape_key_part(part: &str, separator: char) -> String {
    let mut escaped = String::with_capacity(part.len());
    for c in part.chars() {
        if c == '\\' || c == separator {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
