// ============================================================================
// SCAN TOKEN - Codec del formato de wire
// ============================================================================
// Formato: "scanToken:" + base64(JSON { customerId, timestamp, signature })
// El prefijo permite distinguir un token de otros payloads escaneados y
// fallar con un error propio en lugar de un parse error genérico.
// ============================================================================

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};

/// Prefijo fijo que identifica el formato de scan token.
pub const TOKEN_PREFIX: &str = "scanToken:";

/// Payload de un scan token ya decodificado y con tipos validados.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanTokenPayload {
    pub customer_id: String,
    /// Milisegundos desde epoch en que el cliente generó el token.
    pub issued_at_ms: i64,
    /// HMAC-SHA256 hex de "<customerId>:<timestamp>".
    pub signature: String,
}

/// Representación JSON del wire format al decodificar. `timestamp` se lee
/// como f64 para poder rechazar números no finitos o fraccionarios con un
/// error tipado en lugar de propagar valores basura al chequeo de
/// expiración.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePayload {
    customer_id: String,
    timestamp: f64,
    signature: String,
}

/// Errores del protocolo de scan tokens. Internamente distinguimos formato,
/// firma y expiración para diagnóstico; hacia el merchant todos colapsan en
/// un único código genérico (ver `ScanError::InvalidScanToken`).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScanTokenError {
    #[error("invalid scan token format")]
    InvalidFormat,

    #[error("invalid scan token signature")]
    InvalidSignature,

    #[error("scan token expired")]
    Expired,

    #[error("SCAN_TOKEN_SECRET is not configured")]
    MissingSecret,
}

/// Serializa el payload al string opaco de transporte. El timestamp viaja
/// como entero de milisegundos.
pub fn encode(payload: &ScanTokenPayload) -> String {
    let json = serde_json::json!({
        "customerId": payload.customer_id,
        "timestamp": payload.issued_at_ms,
        "signature": payload.signature,
    });
    format!("{}{}", TOKEN_PREFIX, BASE64.encode(json.to_string()))
}

/// Decodifica un string escaneado. Nunca entra en pánico con input
/// controlado por un atacante: todo camino de fallo es `InvalidFormat`.
pub fn decode(raw: &str) -> Result<ScanTokenPayload, ScanTokenError> {
    let encoded = raw
        .strip_prefix(TOKEN_PREFIX)
        .ok_or(ScanTokenError::InvalidFormat)?;

    let bytes = BASE64
        .decode(encoded)
        .map_err(|_| ScanTokenError::InvalidFormat)?;

    let wire: WirePayload =
        serde_json::from_slice(&bytes).map_err(|_| ScanTokenError::InvalidFormat)?;

    if wire.customer_id.is_empty() || wire.signature.is_empty() {
        return Err(ScanTokenError::InvalidFormat);
    }

    // timestamp debe ser un número finito representable en i64 (ms epoch)
    if !wire.timestamp.is_finite()
        || wire.timestamp.fract() != 0.0
        || wire.timestamp < i64::MIN as f64
        || wire.timestamp > i64::MAX as f64
    {
        return Err(ScanTokenError::InvalidFormat);
    }

    Ok(ScanTokenPayload {
        customer_id: wire.customer_id,
        issued_at_ms: wire.timestamp as i64,
        signature: wire.signature,
    })
}

/// Chequea si un string escaneado tiene pinta de scan token (para decidir
/// rutas en el resolver sin decodificar todavía).
pub fn looks_like_token(raw: &str) -> bool {
    raw.starts_with(TOKEN_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_payload() -> ScanTokenPayload {
        ScanTokenPayload {
            customer_id: "u1".to_string(),
            issued_at_ms: 1_700_000_000_000,
            signature: "ab".repeat(32),
        }
    }

    #[test]
    fn test_round_trip() {
        let payload = sample_payload();
        let encoded = encode(&payload);
        assert!(encoded.starts_with(TOKEN_PREFIX));

        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_missing_prefix() {
        let payload = sample_payload();
        let encoded = encode(&payload);
        let without_prefix = encoded.trim_start_matches(TOKEN_PREFIX);
        assert_eq!(decode(without_prefix), Err(ScanTokenError::InvalidFormat));
    }

    #[test]
    fn test_bad_base64() {
        assert_eq!(
            decode("scanToken:!!!not-base64!!!"),
            Err(ScanTokenError::InvalidFormat)
        );
    }

    #[test]
    fn test_bad_json() {
        let raw = format!("{}{}", TOKEN_PREFIX, BASE64.encode("not json at all"));
        assert_eq!(decode(&raw), Err(ScanTokenError::InvalidFormat));
    }

    #[test]
    fn test_missing_fields() {
        let raw = format!(
            "{}{}",
            TOKEN_PREFIX,
            BASE64.encode(r#"{"customerId":"u1","timestamp":123}"#)
        );
        assert_eq!(decode(&raw), Err(ScanTokenError::InvalidFormat));
    }

    #[test]
    fn test_wrong_field_types() {
        // timestamp como string
        let raw = format!(
            "{}{}",
            TOKEN_PREFIX,
            BASE64.encode(r#"{"customerId":"u1","timestamp":"123","signature":"aa"}"#)
        );
        assert_eq!(decode(&raw), Err(ScanTokenError::InvalidFormat));

        // customerId numérico
        let raw = format!(
            "{}{}",
            TOKEN_PREFIX,
            BASE64.encode(r#"{"customerId":7,"timestamp":123,"signature":"aa"}"#)
        );
        assert_eq!(decode(&raw), Err(ScanTokenError::InvalidFormat));
    }

    #[test]
    fn test_fractional_timestamp_rejected() {
        let raw = format!(
            "{}{}",
            TOKEN_PREFIX,
            BASE64.encode(r#"{"customerId":"u1","timestamp":123.5,"signature":"aa"}"#)
        );
        assert_eq!(decode(&raw), Err(ScanTokenError::InvalidFormat));
    }

    #[test]
    fn test_empty_values_rejected() {
        let raw = format!(
            "{}{}",
            TOKEN_PREFIX,
            BASE64.encode(r#"{"customerId":"","timestamp":123,"signature":"aa"}"#)
        );
        assert_eq!(decode(&raw), Err(ScanTokenError::InvalidFormat));
    }

    #[test]
    fn test_looks_like_token() {
        assert!(looks_like_token("scanToken:abc"));
        assert!(!looks_like_token("userId:u1"));
        assert!(!looks_like_token(""));
    }
}
