use axum::{extract::DefaultBodyLimit, Router};
use std::sync::Arc;
use tower_http::compression::{predicate::SizeAbove, CompressionLayer};
use tower_http::trace::TraceLayer;

pub mod api;
pub mod middleware;
pub mod services;
pub mod state;

// Domain-driven architecture
pub mod domains;

// Production-ready modules
pub mod observability;
pub mod security;

use api::create_api_router;
use observability::{metrics_middleware, monitoring_router};
use security::{get_cors_layer, rate_limiting_middleware, security_headers_middleware};
use state::AppState;

use axum::middleware as axum_middleware;

pub fn create_app_router(app_state: Arc<AppState>) -> Router {
    // Router API con todas las rutas
    let api_router = create_api_router();

    Router::new()
        // Endpoints de monitoreo (sin autenticación) - incluye /metrics de Prometheus
        .merge(monitoring_router())
        // API endpoints con estado
        .merge(api_router)
        .with_state(app_state)
        // Middlewares sin estado
        .layer(axum_middleware::from_fn(rate_limiting_middleware))
        .layer(axum_middleware::from_fn(metrics_middleware)) // 📊 Captura métricas automáticamente
        .layer(DefaultBodyLimit::max(64 * 1024)) // payloads de escaneo son chicos
        .layer(
            CompressionLayer::new()
                .gzip(true)
                .compress_when(SizeAbove::new(1024)), // Only compress responses > 1KB
        )
        .layer(TraceLayer::new_for_http())
        .layer(get_cors_layer())
        .layer(axum_middleware::from_fn(security_headers_middleware))
}
