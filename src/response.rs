use crate::rules::{Rule, RuleKey, RuleSource};
use crate::sliding_window::Decision;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};

fn rfc3339_utc<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Secs, true))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResponse {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    #[serde(serialize_with = "rfc3339_utc")]
    pub reset_at: DateTime<Utc>,
}

impl From<Decision> for CheckResponse {
    fn from(decision: Decision) -> Self {
        Self {
            allowed: decision.allowed,
            limit: decision.limit,
            remaining: decision.remaining,
            reset_at: decision.reset_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRuleResponse {
    pub status: String,
    pub client_id: Option<String>,
    pub endpoint: Option<String>,
    pub limit: u64,
    pub window_minutes: u64,
    pub window_seconds: u64,
}

impl CreateRuleResponse {
    pub fn stored(key: RuleKey, rule: Rule) -> Self {
        Self {
            status: "ok".to_string(),
            client_id: key.client_id,
            endpoint: key.endpoint,
            limit: rule.limit,
            window_minutes: rule.window_seconds / 60,
            window_seconds: rule.window_seconds,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveResponse {
    pub client_id: String,
    pub endpoint: String,
    pub limit: u64,
    pub window_seconds: u64,
    pub source: RuleSource,
}
