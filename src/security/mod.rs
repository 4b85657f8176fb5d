// Security middleware and utilities for hardening
use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;
use tracing::warn;

/// Security headers middleware
pub async fn security_headers_middleware(
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let path = request.uri().path().to_string();
    let mut response = next.run(request).await;

    let headers = response.headers_mut();

    headers.insert(
        HeaderName::from_static("x-content-type-options"),
        HeaderValue::from_static("nosniff"),
    );

    headers.insert(
        HeaderName::from_static("x-frame-options"),
        HeaderValue::from_static("DENY"),
    );

    headers.insert(
        HeaderName::from_static("strict-transport-security"),
        HeaderValue::from_static("max-age=31536000; includeSubDomains; preload"),
    );

    headers.insert(
        HeaderName::from_static("referrer-policy"),
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );

    headers.insert(
        HeaderName::from_static("content-security-policy"),
        HeaderValue::from_static("default-src 'self'; object-src 'none'; frame-src 'none';"),
    );

    // Los tokens y credenciales nunca deben quedar en caches intermedios
    if path.contains("/auth/") || path.contains("/scan-token") {
        headers.insert(
            HeaderName::from_static("cache-control"),
            HeaderValue::from_static("no-store, no-cache, must-revalidate, private"),
        );
    }

    Ok(response)
}

/// Rate limiting middleware (ventana deslizante en memoria, por cliente)
pub async fn rate_limiting_middleware(
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let client_id = extract_client_id(&request);

    if !check_simple_rate_limit(&client_id).await {
        warn!("🚫 Rate limit exceeded for client: {}", client_id);
        return Err(StatusCode::TOO_MANY_REQUESTS);
    }

    let response = next.run(request).await;
    Ok(response)
}

fn extract_client_id(request: &Request) -> String {
    // Try to get real IP from headers (for reverse proxy setups)
    if let Some(forwarded_for) = request.headers().get("x-forwarded-for") {
        if let Ok(ip) = forwarded_for.to_str() {
            return ip.split(',').next().unwrap_or("unknown").trim().to_string();
        }
    }

    if let Some(real_ip) = request.headers().get("x-real-ip") {
        if let Ok(ip) = real_ip.to_str() {
            return ip.to_string();
        }
    }

    "unknown".to_string()
}

// Simple in-memory rate limiter (for multi-instance deployments, move to a
// shared store)
static RATE_LIMIT_STORE: tokio::sync::OnceCell<Arc<RwLock<HashMap<String, Vec<SystemTime>>>>> =
    tokio::sync::OnceCell::const_new();

async fn check_simple_rate_limit(client_id: &str) -> bool {
    let store = RATE_LIMIT_STORE
        .get_or_init(|| async { Arc::new(RwLock::new(HashMap::new())) })
        .await;

    let now = SystemTime::now();
    let window = Duration::from_secs(60); // 1 minute window
    let max_requests = 120; // requests per minute per client

    let mut clients = store.write().await;
    let requests = clients.entry(client_id.to_string()).or_insert_with(Vec::new);

    // Clean old requests
    let cutoff = now - window;
    requests.retain(|&time| time > cutoff);

    if requests.len() >= max_requests {
        return false;
    }

    requests.push(now);
    true
}

/// CORS configuration
pub fn get_cors_layer() -> tower_http::cors::CorsLayer {
    use axum::http::Method;
    use tower_http::cors::{Any, CorsLayer};

    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
        ])
}
