// ============================================================================
// SCAN TOKEN SIGNER - Firma HMAC y política de expiración
// ============================================================================

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::env;

use super::token::{self, ScanTokenError, ScanTokenPayload};

type HmacSha256 = Hmac<Sha256>;

/// Ventana de validez de un token desde su emisión.
pub const TOKEN_TTL_MS: i64 = 120_000;

/// Tolerancia de clock-skew hacia el futuro. Un token emitido más de un
/// segundo "en el futuro" se trata como expirado: un timestamp adelantado
/// extendería la ventana de validez.
pub const MAX_CLOCK_SKEW_MS: i64 = 1_000;

/// Firma y verifica scan tokens con un secret compartido del servidor.
/// El secret es read-only después de la construcción; se comparte vía Arc
/// entre todos los requests sin locking.
#[derive(Clone)]
pub struct ScanTokenSigner {
    secret: Vec<u8>,
}

impl ScanTokenSigner {
    /// Un secret vacío equivale a no tener secret: el sistema nunca debe
    /// operar en modo sin firma.
    pub fn new(secret: impl Into<Vec<u8>>) -> Result<Self, ScanTokenError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(ScanTokenError::MissingSecret);
        }
        Ok(Self { secret })
    }

    /// Lee `SCAN_TOKEN_SECRET` del ambiente. La ausencia es un error fatal
    /// de configuración que se reporta al arrancar, no por request.
    pub fn from_env() -> Result<Self, ScanTokenError> {
        let secret = env::var("SCAN_TOKEN_SECRET").map_err(|_| ScanTokenError::MissingSecret)?;
        Self::new(secret.into_bytes())
    }

    fn mac(&self, customer_id: &str, issued_at_ms: i64) -> HmacSha256 {
        // HMAC acepta llaves de cualquier largo; new_from_slice solo falla
        // con llave vacía, que ya rechazamos en new().
        let mut mac = HmacSha256::new_from_slice(&self.secret).expect("non-empty HMAC key");
        mac.update(format!("{}:{}", customer_id, issued_at_ms).as_bytes());
        mac
    }

    /// HMAC-SHA256 hex sobre el string canónico "<customerId>:<timestamp>".
    /// Función pura: mismos inputs producen siempre la misma firma.
    pub fn sign(&self, customer_id: &str, issued_at_ms: i64) -> String {
        hex::encode(self.mac(customer_id, issued_at_ms).finalize().into_bytes())
    }

    /// Recalcula la firma y compara contra la del payload en tiempo
    /// constante (Mac::verify_slice) para no filtrar información del secret
    /// por timing.
    pub fn verify(&self, payload: &ScanTokenPayload) -> Result<(), ScanTokenError> {
        let expected = hex::decode(&payload.signature).map_err(|_| {
            // firma que ni siquiera es hex: mismo código que un mismatch
            ScanTokenError::InvalidSignature
        })?;

        self.mac(&payload.customer_id, payload.issued_at_ms)
            .verify_slice(&expected)
            .map_err(|_| ScanTokenError::InvalidSignature)
    }

    /// Emite un payload firmado para el cliente autenticado.
    pub fn issue(&self, customer_id: &str, now_ms: i64) -> ScanTokenPayload {
        ScanTokenPayload {
            customer_id: customer_id.to_string(),
            issued_at_ms: now_ms,
            signature: self.sign(customer_id, now_ms),
        }
    }

    /// Emite y serializa en un solo paso (lo que viaja en el QR).
    pub fn issue_encoded(&self, customer_id: &str, now_ms: i64) -> String {
        token::encode(&self.issue(customer_id, now_ms))
    }

    /// Pipeline completo de autenticación de un string escaneado:
    /// decode → verify → expiración. Firma y expiración son chequeos
    /// independientes; ambos deben pasar.
    pub fn authenticate(&self, raw: &str, now_ms: i64) -> Result<ScanTokenPayload, ScanTokenError> {
        let payload = token::decode(raw)?;
        self.verify(&payload)?;
        if is_expired(payload.issued_at_ms, now_ms) {
            return Err(ScanTokenError::Expired);
        }
        Ok(payload)
    }
}

/// Política de expiración, independiente de la verificación de firma.
/// Válido a los 120 000 ms exactos; expirado a los 120 001. Un token con
/// `issued_at_ms` más de 1 000 ms en el futuro también se trata como
/// expirado aunque técnicamente no haya envejecido.
pub fn is_expired(issued_at_ms: i64, now_ms: i64) -> bool {
    if issued_at_ms - now_ms > MAX_CLOCK_SKEW_MS {
        return true;
    }
    now_ms - issued_at_ms > TOKEN_TTL_MS
}
