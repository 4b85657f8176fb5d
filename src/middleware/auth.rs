use axum::{
    extract::Request,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::env;
use tracing::{info, warn};

use crate::api::models::ErrorResponse;
use crate::domains::loyalty::ScanActor;

/// JWT configuration constants
pub const JWT_ALGORITHM: Algorithm = Algorithm::HS256;

/// Get JWT secret from environment variable with fallback
fn get_jwt_secret() -> String {
    env::var("JWT_SECRET").unwrap_or_else(|_| "sello_jwt_secret_dev_only_change_me".to_string())
}

fn unauthorized(error: &str, message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
            details: None,
        }),
    )
}

/// Extrae el bearer token del header Authorization.
fn bearer_token(headers: &HeaderMap) -> Result<&str, (StatusCode, Json<ErrorResponse>)> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or_else(|| {
            warn!("Missing Authorization header");
            unauthorized(
                "Missing Authorization header",
                "Authentication required. Please provide a valid Bearer token.",
            )
        })?;

    if !auth_header.starts_with("Bearer ") {
        warn!("Invalid Authorization header format");
        return Err(unauthorized(
            "Invalid Authorization header format",
            "Authorization header must start with 'Bearer '.",
        ));
    }

    let token = auth_header.trim_start_matches("Bearer ").trim();
    if token.is_empty() {
        return Err(unauthorized(
            "Empty JWT token",
            "Please provide a valid JWT token.",
        ));
    }

    Ok(token)
}

// ============================================================================
// CUSTOMER AUTH
// ============================================================================

/// Claims del JWT de un cliente de la app.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CustomerClaims {
    /// user_id opaco del cliente
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
}

/// Cliente autenticado, inyectado en request extensions.
#[derive(Debug, Clone)]
pub struct CurrentCustomer {
    pub user_id: String,
}

/// Middleware: valida el JWT del cliente y agrega CurrentCustomer a las
/// extensions del request.
pub async fn extract_current_customer(
    mut request: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    let token = bearer_token(request.headers())?.to_string();

    let decoding_key = DecodingKey::from_secret(get_jwt_secret().as_bytes());
    let validation = Validation::new(JWT_ALGORITHM);

    let token_data =
        decode::<CustomerClaims>(&token, &decoding_key, &validation).map_err(|e| {
            warn!("Customer JWT validation failed: {}", e);
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => unauthorized(
                    "Token expired",
                    "Your session has expired. Please log in again.",
                ),
                _ => unauthorized(
                    "Invalid token",
                    "Could not validate credentials. Please log in again.",
                ),
            }
        })?;

    let current = CurrentCustomer {
        user_id: token_data.claims.sub,
    };

    info!(user_id = %current.user_id, "🔐 Customer JWT authentication successful");
    request.extensions_mut().insert(current);

    Ok(next.run(request).await)
}

// ============================================================================
// MERCHANT STAFF AUTH
// ============================================================================

/// Claims del JWT del personal de un comercio (emitido en el login del
/// merchant). `sub` es el id del staff que ejecuta los escaneos.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StaffClaims {
    pub sub: String,
    pub business_id: String,
    pub business_name: String,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
}

impl StaffClaims {
    /// Actor de escaneo para el resolver y el ledger.
    pub fn to_actor(&self) -> ScanActor {
        ScanActor {
            staff_id: self.sub.clone(),
            business_id: self.business_id.clone(),
            business_name: self.business_name.clone(),
        }
    }
}

/// Middleware: valida el JWT de staff y agrega StaffClaims a extensions.
pub async fn extract_staff(
    mut request: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    let token = bearer_token(request.headers())?.to_string();

    let decoding_key = DecodingKey::from_secret(get_jwt_secret().as_bytes());
    let validation = Validation::new(JWT_ALGORITHM);

    let token_data = decode::<StaffClaims>(&token, &decoding_key, &validation).map_err(|e| {
        warn!("Staff JWT validation failed: {}", e);
        unauthorized(
            "Invalid or expired token",
            "Could not validate merchant credentials. Please log in again.",
        )
    })?;

    let claims = token_data.claims;
    if claims.role != "merchant_staff" {
        warn!(sub = %claims.sub, role = %claims.role, "🚫 JWT sin rol de staff");
        return Err(unauthorized(
            "Invalid token",
            "Token is not authorized for merchant operations.",
        ));
    }

    info!(
        staff_id = %claims.sub,
        business_id = %claims.business_id,
        "🔐 Staff JWT authentication successful"
    );
    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}

/// Helper para firmar claims (login y tests).
pub fn encode_jwt<T: Serialize>(claims: &T) -> Result<String, jsonwebtoken::errors::Error> {
    use jsonwebtoken::{encode, EncodingKey, Header};
    encode(
        &Header::new(JWT_ALGORITHM),
        claims,
        &EncodingKey::from_secret(get_jwt_secret().as_bytes()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{decode, DecodingKey, Validation};

    #[test]
    fn test_staff_jwt_round_trip() {
        let claims = StaffClaims {
            sub: "staff-1".to_string(),
            business_id: "b1".to_string(),
            business_name: "Café Central".to_string(),
            role: "merchant_staff".to_string(),
            exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp(),
            iat: chrono::Utc::now().timestamp(),
        };

        let token = encode_jwt(&claims).unwrap();
        let decoded = decode::<StaffClaims>(
            &token,
            &DecodingKey::from_secret(get_jwt_secret().as_bytes()),
            &Validation::new(JWT_ALGORITHM),
        )
        .unwrap();

        assert_eq!(decoded.claims.sub, "staff-1");
        assert_eq!(decoded.claims.business_id, "b1");

        let actor = decoded.claims.to_actor();
        assert_eq!(actor.staff_id, "staff-1");
        assert_eq!(actor.business_name, "Café Central");
    }
}
