// ============================================================================
// MERCHANT AUTHENTICATION - Login para el personal del comercio
// ============================================================================

use axum::{extract::State, Json};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::api::models::ApiError;
use crate::middleware::{encode_jwt, StaffClaims};
use crate::observability::record_merchant_login;
use crate::state::AppState;

/// Request body for merchant staff login
#[derive(Debug, Deserialize)]
pub struct MerchantLoginRequest {
    pub business_name: String,
    pub api_key: String,
}

/// Response for successful login
#[derive(Debug, Serialize)]
pub struct MerchantLoginResponse {
    pub success: bool,
    pub token: String,
    pub business: BusinessInfo,
}

#[derive(Debug, Serialize)]
pub struct BusinessInfo {
    pub business_id: String,
    pub business_name: String,
    pub expires_in: i64,
}

/// Merchant staff login endpoint
///
/// # Endpoint
/// POST /api/v1/merchant/auth/login
///
/// # Returns
/// - 200 OK: Login successful with JWT token
/// - 401 Unauthorized: Invalid credentials
/// - 500 Internal Server Error: Storage error
pub async fn merchant_login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<MerchantLoginRequest>,
) -> Result<Json<MerchantLoginResponse>, ApiError> {
    info!("Merchant login attempt for: {}", payload.business_name);

    let business = state
        .store
        .business_by_name(&payload.business_name)
        .await?
        .ok_or_else(|| {
            warn!("Business not found: {}", payload.business_name);
            record_merchant_login(false);
            ApiError::Unauthorized("Credenciales inválidas".to_string())
        })?;

    if !business.is_active {
        warn!("Inactive business attempted login: {}", payload.business_name);
        record_merchant_login(false);
        return Err(ApiError::Unauthorized("Comercio inactivo".to_string()));
    }

    let api_key_hash = business.api_key_hash.as_deref().ok_or_else(|| {
        warn!("Business {} has no API key configured", business.business_id);
        record_merchant_login(false);
        ApiError::Unauthorized("Credenciales inválidas".to_string())
    })?;

    // Verify API key with bcrypt
    let is_valid = bcrypt::verify(&payload.api_key, api_key_hash).map_err(|e| {
        error!("Error verifying API key: {}", e);
        ApiError::InternalError("Error en verificación".to_string())
    })?;

    if !is_valid {
        warn!("Invalid API key for business: {}", payload.business_name);
        record_merchant_login(false);
        return Err(ApiError::Unauthorized("Credenciales inválidas".to_string()));
    }

    let now = Utc::now();
    let exp = now + Duration::hours(8); // 8 hours expiry for merchant staff

    let claims = StaffClaims {
        sub: business.business_id.clone(),
        business_id: business.business_id.clone(),
        business_name: business.name.clone(),
        role: "merchant_staff".to_string(),
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    let token = encode_jwt(&claims).map_err(|e| {
        error!("JWT encoding error: {}", e);
        ApiError::InternalError("Error al generar token".to_string())
    })?;

    record_merchant_login(true);
    info!(
        "Merchant login successful: {} ({})",
        business.name, business.business_id
    );

    Ok(Json(MerchantLoginResponse {
        success: true,
        token,
        business: BusinessInfo {
            business_id: business.business_id,
            business_name: business.name,
            expires_in: 28800, // 8 hours in seconds
        },
    }))
}
