use crate::config::Config;
use crate::error::Result;
use crate::handlers::{
    check_limit, create_rule, health_check, readiness_check, resolve_rule, AppState, SharedState,
};
use crate::middleware::logging_middleware;
use crate::store::{MemoryStore, RedisStore, Store};
use axum::routing::{get, post};
use axum::{middleware, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Build the HTTP router over a prepared state
pub fn create_app(state: SharedState) -> Router {
    Router::new()
        .route("/api/v1/rate-limit/check", post(check_limit))
        .route("/api/v1/rate-limit/rules", post(create_rule))
        .route("/api/v1/rate-limit/rules/resolve", get(resolve_rule))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn(logging_middleware)),
        )
}

pub struct Server {
    app: Router,
    addr: SocketAddr,
    store: Arc<dyn Store>,
}

impl Server {
    /// Open the store and assemble the application.
    ///
    /// An unreachable store is logged but does not abort startup: decisions
    /// fail with 503 and `/health` reports the store as down until it
    /// comes back.
    pub async fn new(config: &Config) -> Result<Self> {
        let store: Arc<dyn Store> = if config.in_memory_store {
            warn!("Using in-memory store; quota is not shared across replicas");
            Arc::new(MemoryStore::new())
        } else {
            Arc::new(RedisStore::new(
                &config.redis_connection_url(),
                config.store_timeout(),
            )?)
        };

        match store.ping().await {
            Ok(()) => info!("store_connected"),
            Err(e) => error!(error = %e, "store_connect_failed"),
        }

        let default_rule = config.default_rule()?;
        info!(
            limit = default_rule.limit,
            window_seconds = default_rule.window_seconds,
            "default_rule_loaded"
        );

        let state = Arc::new(AppState::new(store.clone(), default_rule));

        Ok(Self {
            app: create_app(state),
            addr: config.bind_addr(),
            store,
        })
    }

    pub async fn run(self) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;

        info!("Rate limit service listening on {}", self.addr);

        // Run server with graceful shutdown
        let served = axum::serve(
            listener,
            self.app
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await;

        self.store.close().await;
        served
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, initiating graceful shutdown");
        },
    }
}
