// ============================================================================
// SCAN TOKEN API - Emisión de tokens para el cliente
// ============================================================================
// El cliente autenticado pide un token fresco cada vez que muestra su QR al
// comercio. El token no se persiste: la validez está acotada por la ventana
// de expiración, así que no hace falta revocation list.
// ============================================================================

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::api::models::ApiError;
use crate::domains::loyalty::qr_image::{render_token_png, QrImageConfig};
use crate::domains::loyalty::TOKEN_TTL_MS;
use crate::middleware::CurrentCustomer;
use crate::observability::record_token_issued;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ScanTokenResponse {
    pub success: bool,
    /// String opaco que el cliente muestra como QR.
    pub token: String,
    /// Ventana de validez en milisegundos desde la emisión.
    pub expires_in_ms: i64,
}

/// Emite un scan token fresco para el cliente autenticado.
///
/// # Endpoint
/// POST /api/v1/scan-token
pub async fn issue_scan_token(
    State(state): State<Arc<AppState>>,
    Extension(customer): Extension<CurrentCustomer>,
) -> Result<Json<ScanTokenResponse>, ApiError> {
    let now_ms = Utc::now().timestamp_millis();
    let token = state.signer.issue_encoded(&customer.user_id, now_ms);

    record_token_issued();
    info!(user_id = %customer.user_id, "🎟️ Scan token emitido");

    Ok(Json(ScanTokenResponse {
        success: true,
        token,
        expires_in_ms: TOKEN_TTL_MS,
    }))
}

/// Emite un token fresco y lo devuelve renderizado como PNG, para clientes
/// que no pueden dibujar el QR localmente.
///
/// # Endpoint
/// GET /api/v1/scan-token/qr
pub async fn issue_scan_token_qr(
    State(state): State<Arc<AppState>>,
    Extension(customer): Extension<CurrentCustomer>,
) -> Result<Response, ApiError> {
    let now_ms = Utc::now().timestamp_millis();
    let token = state.signer.issue_encoded(&customer.user_id, now_ms);

    let png = render_token_png(&token, &QrImageConfig::default()).map_err(|e| {
        tracing::error!("Failed to render QR PNG: {}", e);
        ApiError::InternalError("Error al generar imagen QR".to_string())
    })?;

    record_token_issued();
    info!(user_id = %customer.user_id, bytes = png.len(), "🎟️ Scan token QR emitido");

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "image/png"),
            // el token expira en 2 minutos; la imagen nunca debe cachearse
            (header::CACHE_CONTROL, "no-store, no-cache, must-revalidate"),
        ],
        png,
    )
        .into_response())
}
