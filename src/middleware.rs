use axum::{extract::Request, middleware::Next, response::Response};
use std::net::SocketAddr;
use std::time::Instant;
use tracing::info;

/// Logging middleware for request/response tracking
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let client_ip = get_client_ip(&request);
    let started = Instant::now();

    info!(
        target: "ratewarden::middleware",
        method = %method,
        uri = %uri,
        client_ip = %client_ip,
        "request_started"
    );

    let response = next.run(request).await;

    info!(
        target: "ratewarden::middleware",
        method = %method,
        uri = %uri,
        status = %response.status(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request_completed"
    );

    response
}

fn get_client_ip(request: &Request) -> String {
    if let Some(forwarded) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
    {
        if let Some(first_ip) = forwarded.split(',').next() {
            return first_ip.trim().to_string();
        }
    }

    if let Some(real_ip) = request
        .headers()
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
    {
        return real_ip.to_string();
    }

    request
        .extensions()
        .get::<axum::extract::ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
