// ============================================================================
// SCAN RESOLVER - Resolución read-only de un payload escaneado
// ============================================================================
// Los chequeos están estrictamente ordenados para que la precedencia de
// errores sea determinista y testeable: un comercio inactivo se reporta
// antes que un QR inválido aunque ambas condiciones se cumplan. Nunca muta
// estado: habilita el flujo de dos fases escanear-confirmar del merchant.
// ============================================================================

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use super::models::{ScanActor, ScanResolution};
use super::repository::{LoyaltyStore, StoreError};
use super::signer::ScanTokenSigner;
use super::token::{self, ScanTokenError};

/// Errores de dominio del path de escaneo, con códigos estables hacia los
/// clientes. Los detalles internos (firma vs expiración, motivo exacto de un
/// parse fallido) quedan en logs y nunca se filtran al scanning party.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScanError {
    #[error("actor is not authenticated")]
    NotAuthenticated,

    #[error("business does not exist or is inactive")]
    BusinessInactive,

    #[error("program not found, inactive, or not owned by business")]
    ProgramNotFound,

    #[error("payload is not a recognized scan format")]
    InvalidQrPayload,

    #[error("customer does not exist or is inactive")]
    CustomerNotFound,

    /// Token reconocido pero inválido (formato, firma o expiración). El
    /// motivo interno se conserva para diagnóstico.
    #[error("invalid or expired scan token")]
    InvalidScanToken(#[source] ScanTokenError),

    #[error("scan token secret is not configured")]
    SecretMissing,

    #[error("storage error: {0}")]
    Storage(String),
}

impl ScanError {
    /// Código string estable que ven los callers (no stack traces).
    pub fn code(&self) -> &'static str {
        match self {
            ScanError::NotAuthenticated => "NOT_AUTHENTICATED",
            ScanError::BusinessInactive => "BUSINESS_INACTIVE",
            ScanError::ProgramNotFound => "PROGRAM_NOT_FOUND",
            ScanError::InvalidQrPayload => "INVALID_QR",
            ScanError::CustomerNotFound => "CUSTOMER_NOT_FOUND",
            ScanError::InvalidScanToken(_) => "INVALID_SCAN_TOKEN",
            ScanError::SecretMissing => "SCAN_TOKEN_SECRET_MISSING",
            ScanError::Storage(_) => "STORAGE_ERROR",
        }
    }
}

impl From<StoreError> for ScanError {
    fn from(e: StoreError) -> Self {
        ScanError::Storage(e.to_string())
    }
}

/// Referencia de identidad reconocida en un payload escaneado.
#[derive(Debug, Clone, PartialEq)]
enum IdentityRef {
    /// Token firmado (ya autenticado y dentro de ventana).
    Token { customer_id: String },
    /// Forma legacy: referencia directa al user_id.
    UserId(String),
    /// Forma legacy: lookup indirecto por identificador externo.
    ExternalId(String),
}

const LEGACY_USER_PREFIX: &str = "userId:";
const LEGACY_EXTERNAL_PREFIX: &str = "externalId:";

pub struct ScanResolver {
    store: Arc<dyn LoyaltyStore>,
    signer: Arc<ScanTokenSigner>,
    /// Modo estricto token-only: rechaza las formas legacy `userId:` y
    /// `externalId:`, que no prueban presencia física del cliente.
    strict_token_only: bool,
}

impl ScanResolver {
    pub fn new(
        store: Arc<dyn LoyaltyStore>,
        signer: Arc<ScanTokenSigner>,
        strict_token_only: bool,
    ) -> Self {
        Self {
            store,
            signer,
            strict_token_only,
        }
    }

    /// Query read-only: resuelve el payload escaneado contra un comercio y
    /// programa, y devuelve la vista de elegibilidad de redención.
    ///
    /// Precondiciones en orden estricto, el primer fallo gana:
    /// 1. actor autenticado          → NotAuthenticated
    /// 2. comercio existe y activo   → BusinessInactive
    /// 3. programa activo del comercio → ProgramNotFound
    /// 4. payload reconocido         → InvalidQrPayload / InvalidScanToken
    /// 5. cliente existe y activo    → CustomerNotFound
    pub async fn resolve_scan(
        &self,
        actor: Option<&ScanActor>,
        raw_payload: &str,
        business_id: &str,
        program_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ScanResolution, ScanError> {
        // 1. Actor autenticado
        let actor = actor.ok_or(ScanError::NotAuthenticated)?;

        // 2. Comercio existe y está activo
        let business = self
            .store
            .business_by_id(business_id)
            .await?
            .filter(|b| b.is_active)
            .ok_or(ScanError::BusinessInactive)?;

        // 3. Programa existe, está activo y pertenece al comercio
        let program = self
            .store
            .program_by_id(program_id)
            .await?
            .filter(|p| p.is_active && p.business_id == business.business_id)
            .ok_or(ScanError::ProgramNotFound)?;

        // 4. Payload reconocido
        let identity = self.parse_identity(raw_payload, now.timestamp_millis())?;

        // 5. Cliente existe y está activo
        let customer = match &identity {
            IdentityRef::Token { customer_id } | IdentityRef::UserId(customer_id) => {
                self.store.customer_by_id(customer_id).await?
            }
            IdentityRef::ExternalId(external_id) => {
                self.store.customer_by_external_id(external_id).await?
            }
        }
        .filter(|c| c.is_active)
        .ok_or(ScanError::CustomerNotFound)?;

        // Membership ausente no es error: se crea con el primer sello.
        let membership = self
            .store
            .membership_for_user_program(&customer.user_id, &program.program_id)
            .await?
            .filter(|m| m.is_active);

        info!(
            staff_id = %actor.staff_id,
            business_id = %business.business_id,
            program_id = %program.program_id,
            user_id = %customer.user_id,
            has_membership = membership.is_some(),
            "🔎 Scan resuelto"
        );

        Ok(ScanResolution {
            user_id: customer.user_id.clone(),
            customer_name: customer.display_name,
            membership: membership
                .as_ref()
                .map(|m| ScanResolution::snapshot_of(m, program.max_stamps)),
        })
    }

    /// Parsea el raw payload a una referencia de identidad reconocida.
    /// El token firmado pasa por el pipeline completo decode → verify →
    /// expiración; las formas legacy solo se aceptan fuera del modo
    /// estricto.
    fn parse_identity(&self, raw: &str, now_ms: i64) -> Result<IdentityRef, ScanError> {
        let raw = raw.trim();

        if token::looks_like_token(raw) {
            return match self.signer.authenticate(raw, now_ms) {
                Ok(payload) => Ok(IdentityRef::Token {
                    customer_id: payload.customer_id,
                }),
                Err(ScanTokenError::MissingSecret) => Err(ScanError::SecretMissing),
                Err(e) => {
                    warn!(reason = %e, "🚫 Scan token rechazado");
                    Err(ScanError::InvalidScanToken(e))
                }
            };
        }

        if self.strict_token_only {
            warn!("🚫 Payload legacy rechazado en modo token-only");
            return Err(ScanError::InvalidQrPayload);
        }

        if let Some(id) = raw.strip_prefix(LEGACY_USER_PREFIX) {
            if !id.is_empty() {
                return Ok(IdentityRef::UserId(id.to_string()));
            }
        }

        if let Some(external_id) = raw.strip_prefix(LEGACY_EXTERNAL_PREFIX) {
            if !external_id.is_empty() {
                return Ok(IdentityRef::ExternalId(external_id.to_string()));
            }
        }

        Err(ScanError::InvalidQrPayload)
    }
}
