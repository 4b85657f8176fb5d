// ============================================================================
// API MODELS - Tipos compartidos de la superficie HTTP
// ============================================================================

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::domains::loyalty::{ScanError, StoreError};

/// Error body estándar de la API.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Errores de la capa API. Hacia el cliente viajan códigos string estables,
/// nunca stack traces.
#[derive(Debug)]
pub enum ApiError {
    BadRequest { code: &'static str, message: String },
    Unauthorized(String),
    Forbidden { code: &'static str, message: String },
    NotFound { code: &'static str, message: String },
    /// Otro writer ganó la carrera sobre la membership; el merchant
    /// reintenta el escaneo.
    Conflict(String),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::BadRequest { code, message } => (StatusCode::BAD_REQUEST, code, message),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "NOT_AUTHENTICATED", msg),
            ApiError::Forbidden { code, message } => (StatusCode::FORBIDDEN, code, message),
            ApiError::NotFound { code, message } => (StatusCode::NOT_FOUND, code, message),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::InternalError(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg)
            }
        };

        let body = Json(serde_json::json!({
            "success": false,
            "error": code,
            "message": message,
        }));

        (status, body).into_response()
    }
}

impl From<ScanError> for ApiError {
    fn from(e: ScanError) -> Self {
        let code = e.code();
        match e {
            ScanError::NotAuthenticated => {
                ApiError::Unauthorized("Autenticación requerida.".to_string())
            }
            ScanError::BusinessInactive => ApiError::Forbidden {
                code,
                message: "El comercio no está activo.".to_string(),
            },
            ScanError::ProgramNotFound => ApiError::NotFound {
                code,
                message: "Programa no encontrado para este comercio.".to_string(),
            },
            ScanError::InvalidQrPayload => ApiError::BadRequest {
                code,
                message: "Código escaneado no reconocido.".to_string(),
            },
            ScanError::CustomerNotFound => ApiError::NotFound {
                code,
                message: "Cliente no encontrado.".to_string(),
            },
            // Firma y expiración son errores distintos internamente, pero el
            // scanning party ve un único mensaje genérico para no ayudar a
            // falsificar tokens.
            ScanError::InvalidScanToken(_) => ApiError::BadRequest {
                code,
                message: "Código inválido o expirado. Pide al cliente regenerar su QR.".to_string(),
            },
            ScanError::SecretMissing => {
                ApiError::InternalError("Error de configuración del servidor.".to_string())
            }
            ScanError::Storage(_) => {
                ApiError::InternalError("Error al consultar datos.".to_string())
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict => ApiError::Conflict(
                "La membership fue modificada por otro escaneo. Reintenta.".to_string(),
            ),
            StoreError::Backend(msg) => {
                tracing::error!("Storage backend error: {}", msg);
                ApiError::InternalError("Error al guardar datos.".to_string())
            }
        }
    }
}
