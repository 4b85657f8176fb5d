// ============================================================================
// MERCHANT API MODULE - Endpoints para comercios aliados
// ============================================================================

pub mod auth;
pub mod scan;

use axum::{
    middleware::from_fn,
    routing::post,
    Router,
};
use std::sync::Arc;

use crate::middleware::extract_staff;
use crate::state::AppState;

/// Create merchant router with all endpoints
pub fn router() -> Router<Arc<AppState>> {
    // Public routes (no auth required)
    let public_routes = Router::new().route("/auth/login", post(auth::merchant_login));

    // Protected routes (require staff JWT)
    let protected_routes = Router::new()
        .route("/scan/resolve", post(scan::resolve_scan))
        .route("/scan/stamp", post(scan::stamp_scan))
        .route("/scan/redeem", post(scan::redeem_scan))
        .layer(from_fn(extract_staff));

    public_routes.merge(protected_routes)
}
