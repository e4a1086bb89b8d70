use crate::error::{RateLimitError, Result};
use crate::store::{escape_key_part, Store};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Hash holding every registry entry.
pub const RULES_KEY: &str = "rl:rules";

/// Stands in for an absent client or endpoint in a rule key.
pub const DEFAULT_MARKER: &str = "default";

/// Longest accepted window: 366 days.
pub const MAX_WINDOW_SECONDS: u64 = 366 * 24 * 60 * 60;

/// At most `limit` admitted requests in any trailing `window_seconds`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub limit: u64,
    pub window_seconds: u64,
}

impl Rule {
    /// Build a rule, rejecting a non-positive limit or a window outside
    /// `1..=MAX_WINDOW_SECONDS`.
    pub fn new(limit: i64, window_seconds: i64) -> Result<Self> {
        if limit <= 0 {
            return Err(RateLimitError::InvalidRule(format!(
                "limit must be greater than 0, got {}",
                limit
            )));
        }
        if window_seconds <= 0 {
            return Err(RateLimitError::InvalidRule(format!(
                "window must be greater than 0 seconds, got {}",
                window_seconds
            )));
        }
        if window_seconds as u64 > MAX_WINDOW_SECONDS {
            return Err(RateLimitError::InvalidRule(format!(
                "window must be at most {} seconds, got {}",
                MAX_WINDOW_SECONDS, window_seconds
            )));
        }

        Ok(Self {
            limit: limit as u64,
            window_seconds: window_seconds as u64,
        })
    }

    /// Same bounds as [`Rule::new`], for entries read back from the store.
    fn in_bounds(&self) -> bool {
        self.limit > 0 && (1..=MAX_WINDOW_SECONDS).contains(&self.window_seconds)
    }
}

/// Lookup key of a registry entry. `None` matches every value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleKey {
    pub client_id: Option<String>,
    pub endpoint: Option<String>,
}

impl RuleKey {
    pub fn new(client_id: Option<&str>, endpoint: Option<&str>) -> Self {
        Self {
            client_id: normalize(client_id),
            endpoint: normalize(endpoint),
        }
    }

    /// Field name inside [`RULES_KEY`]. `|` inside a component is escaped.
    pub fn field(&self) -> String {
        format!(
            "{}|{}",
            escape_key_part(self.client_id.as_deref().unwrap_or(DEFAULT_MARKER), '|'),
            escape_key_part(self.endpoint.as_deref().unwrap_or(DEFAULT_MARKER), '|')
        )
    }
}

fn normalize(part: Option<&str>) -> Option<String> {
    part.filter(|s| !s.is_empty() && *s != DEFAULT_MARKER)
        .map(str::to_string)
}

/// Which fallback level supplied a resolved rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleSource {
    /// client + endpoint
    Exact,
    /// client + any endpoint
    Client,
    /// any client + endpoint
    Endpoint,
    /// stored entry for any client + any endpoint
    Global,
    /// process default, nothing stored matched
    Builtin,
}

impl fmt::Display for RuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RuleSource::Exact => "exact",
            RuleSource::Client => "client",
            RuleSource::Endpoint => "endpoint",
            RuleSource::Global => "global",
            RuleSource::Builtin => "builtin",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRule {
    pub rule: Rule,
    pub source: RuleSource,
}

/// Rule storage and four-level fallback resolution over the shared store.
#[derive(Clone)]
pub struct RuleRegistry {
    store: Arc<dyn Store>,
    default_rule: Rule,
}

impl RuleRegistry {
    pub fn new(store: Arc<dyn Store>, default_rule: Rule) -> Self {
        Self {
            store,
            default_rule,
        }
    }

    /// Upsert the rule for a key. The last write for a key wins.
    pub async fn set_rule(
        &self,
        client_id: Option<&str>,
        endpoint: Option<&str>,
        limit: i64,
        window_seconds: i64,
    ) -> Result<(RuleKey, Rule)> {
        let rule = Rule::new(limit, window_seconds)?;
        let key = RuleKey::new(client_id, endpoint);
        let value = serde_json::to_string(&rule)
            .map_err(|e| RateLimitError::InvalidRule(e.to_string()))?;

        self.store.set_field(RULES_KEY, &key.field(), &value).await?;

        info!(
            client_id = key.client_id.as_deref().unwrap_or(DEFAULT_MARKER),
            endpoint = key.endpoint.as_deref().unwrap_or(DEFAULT_MARKER),
            limit = rule.limit,
            window_seconds = rule.window_seconds,
            "rule_set"
        );

        Ok((key, rule))
    }

    /// The rule governing a pair, most specific stored entry first.
    pub async fn resolve_rule(&self, client_id: &str, endpoint: &str) -> Result<ResolvedRule> {
        let candidates = [
            (RuleKey::new(Some(client_id), Some(endpoint)), RuleSource::Exact),
            (RuleKey::new(Some(client_id), None), RuleSource::Client),
            (RuleKey::new(None, Some(endpoint)), RuleSource::Endpoint),
            (RuleKey::new(None, None), RuleSource::Global),
        ];
        let fields: Vec<String> = candidates.iter().map(|(key, _)| key.field()).collect();

        let values = self.store.get_fields(RULES_KEY, &fields).await?;

        for ((field, (_, source)), raw) in fields.iter().zip(candidates.iter()).zip(values) {
            let Some(raw) = raw else { continue };
            match serde_json::from_str::<Rule>(&raw) {
                Ok(rule) if rule.in_bounds() => {
                    return Ok(ResolvedRule {
                        rule,
                        source: *source,
                    });
                }
                Ok(_) => warn!(field = %field, "rule_entry_out_of_range"),
                Err(e) => warn!(field = %field, error = %e, "rule_entry_unreadable"),
            }
        }

        Ok(ResolvedRule {
            rule: self.default_rule,
            source: RuleSource::Builtin,
        })
    }
}
