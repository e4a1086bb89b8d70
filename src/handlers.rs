use axum::{
    extract::{Query, State},
    http::{HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::error::RateLimitError;
use crate::health::{HealthChecker, HealthStatus, StoreStatus};
use crate::response::{CheckResponse, CreateRuleResponse, ResolveResponse};
use crate::rules::{Rule, RuleRegistry};
use crate::sliding_window::WindowLimiter;
use crate::store::Store;
use crate::validation::{CheckRequest, CreateRuleRequest, RequestValidator, ResolveQuery};

/// Shared application state
pub type SharedState = Arc<AppState>;

/// Everything a request needs: the limiter (which owns the registry) and
/// the store probe. No mutable state lives here.
pub struct AppState {
    pub limiter: WindowLimiter,
    pub health: HealthChecker,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, default_rule: Rule) -> Self {
        let registry = RuleRegistry::new(store.clone(), default_rule);
        Self {
            limiter: WindowLimiter::new(store.clone(), registry),
            health: HealthChecker::new(store),
        }
    }

    pub fn registry(&self) -> &RuleRegistry {
        self.limiter.registry()
    }
}

/// Record a request and report whether it is admitted.
///
/// A denied decision is still a 200; the caller enforces it.
pub async fn check_limit(
    State(state): State<SharedState>,
    Json(payload): Json<CheckRequest>,
) -> Result<impl IntoResponse, RateLimitError> {
    RequestValidator::validate(&payload)?;

    let decision = state
        .limiter
        .check(&payload.client_id, &payload.endpoint, payload.timestamp)
        .await?;

    let mut resp = Json(CheckResponse::from(decision)).into_response();

    let headers = resp.headers_mut();
    headers.insert("X-RateLimit-Limit", HeaderValue::from(decision.limit));
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(decision.remaining));
    headers.insert(
        "X-RateLimit-Reset",
        HeaderValue::from(decision.reset_at.timestamp()),
    );

    Ok(resp)
}

/// Create or replace a rule
pub async fn create_rule(
    State(state): State<SharedState>,
    Json(payload): Json<CreateRuleRequest>,
) -> Result<impl IntoResponse, RateLimitError> {
    RequestValidator::validate(&payload)?;

    let window_seconds = payload.window_minutes.checked_mul(60).ok_or_else(|| {
        RateLimitError::InvalidRule(format!(
            "windowMinutes {} is too large",
            payload.window_minutes
        ))
    })?;

    let (key, rule) = state
        .registry()
        .set_rule(
            payload.client_id.as_deref(),
            payload.endpoint.as_deref(),
            payload.limit,
            window_seconds,
        )
        .await?;

    Ok(Json(CreateRuleResponse::stored(key, rule)))
}

/// Show the rule that currently governs a pair
pub async fn resolve_rule(
    State(state): State<SharedState>,
    Query(query): Query<ResolveQuery>,
) -> Result<impl IntoResponse, RateLimitError> {
    RequestValidator::validate(&query)?;

    let resolved = state
        .registry()
        .resolve_rule(&query.client_id, &query.endpoint)
        .await?;

    Ok(Json(ResolveResponse {
        client_id: query.client_id,
        endpoint: query.endpoint,
        limit: resolved.rule.limit,
        window_seconds: resolved.rule.window_seconds,
        source: resolved.source,
    }))
}

/// Health check endpoint. Always 200; store reachability is reported.
pub async fn health_check(State(state): State<SharedState>) -> Json<HealthStatus> {
    Json(state.health.check_health().await)
}

/// Readiness check endpoint
pub async fn readiness_check(State(state): State<SharedState>) -> impl IntoResponse {
    let health = state.health.check_health().await;

    match health.store {
        StoreStatus::Ok => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "ready",
                "store": "ok"
            })),
        ),
        StoreStatus::Down => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "not_ready",
                "store": "down"
            })),
        ),
    }
}
