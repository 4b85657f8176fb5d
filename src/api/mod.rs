pub mod models; // API models for compatibility

pub mod merchant; // Merchant portal - scan resolution y commit
pub mod scan_token; // Emisión de scan tokens para clientes

use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::middleware::extract_current_customer;
use crate::state::AppState;

/// Rutas del cliente (requieren JWT de cliente)
fn create_customer_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/scan-token", post(scan_token::issue_scan_token))
        .route("/api/v1/scan-token/qr", get(scan_token::issue_scan_token_qr))
        .layer(from_fn(extract_current_customer))
}

/// Rutas del merchant (login público + operaciones con JWT de staff)
fn create_merchant_router() -> Router<Arc<AppState>> {
    Router::new().nest("/api/v1/merchant", merchant::router())
}

pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .merge(create_customer_router())
        .merge(create_merchant_router())
}
