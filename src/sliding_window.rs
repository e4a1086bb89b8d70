//! Sliding window admission control.
//!
//! Each request is written into an ordered collection of timestamps kept in
//! the shared store, and the decision is taken from the count left after
//! pruning everything older than the window. The request is recorded before
//! it is judged, so a denied request still occupies a slot.

use crate::error::Result;
use crate::rules::{RuleRegistry, RuleSource};
use crate::store::{escape_key_part, Store, WindowHit};
use crate::timestamp;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    pub reset_at: DateTime<Utc>,
    /// Fallback level the governing rule came from
    pub source: RuleSource,
}

#[derive(Clone)]
pub struct WindowLimiter {
    store: Arc<dyn Store>,
    registry: RuleRegistry,
}

impl WindowLimiter {
    pub fn new(store: Arc<dyn Store>, registry: RuleRegistry) -> Self {
        Self { store, registry }
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// Store key of the window for a pair. `:` inside an id is escaped.
    pub fn window_key(client_id: &str, endpoint: &str) -> String {
        format!(
            "rl:win:{}:{}",
            escape_key_part(client_id, ':'),
            escape_key_part(endpoint, ':')
        )
    }

    /// Record one request at `at` and decide whether it is admitted.
    pub async fn check(
        &self,
        client_id: &str,
        endpoint: &str,
        at: DateTime<Utc>,
    ) -> Result<Decision> {
        let resolved = self.registry.resolve_rule(client_id, endpoint).await?;
        let rule = resolved.rule;
        let window = rule.window_seconds as i64;

        let now = timestamp::epoch_seconds(&at);
        let hit = WindowHit {
            member: format!("{}-{}", now, Uuid::new_v4()),
            now,
            min_score: now.saturating_sub(window).saturating_add(1),
            ttl_seconds: rule.window_seconds,
        };

        let key = Self::window_key(client_id, endpoint);
        let snapshot = self.store.record_hit(&key, &hit).await.map_err(|e| {
            error!(client_id, endpoint, error = %e, "rate_check_failed");
            e
        })?;

        let oldest = snapshot.oldest.unwrap_or(now);
        let decision = Decision {
            allowed: snapshot.count <= rule.limit,
            limit: rule.limit,
            remaining: rule.limit.saturating_sub(snapshot.count),
            reset_at: timestamp::from_epoch_seconds(oldest.saturating_add(window)),
            source: resolved.source,
        };

        info!(
            client_id,
            endpoint,
            allowed = decision.allowed,
            limit = decision.limit,
            remaining = decision.remaining,
            window_seconds = rule.window_seconds,
            rule_source = %resolved.source,
            "rate_check"
        );

        Ok(decision)
    }
}
