// ============================================================================
// LOYALTY MODELS - Entidades del sistema de tarjetas de sellos
// ============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Comercio al que un cliente se puede unir.
/// `is_active = false` bloquea toda actividad de escaneo/sellos.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Business {
    pub business_id: String,
    pub name: String,
    pub is_active: bool,
    /// Hash bcrypt del API key usado por el personal del comercio para login.
    pub api_key_hash: Option<String>,
    /// Webhook opcional para notificar sellos/redenciones al comercio.
    pub webhook_url: Option<String>,
    pub webhook_secret: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Programa de lealtad. Pertenece exactamente a un comercio.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LoyaltyProgram {
    pub program_id: String,
    pub business_id: String,
    pub name: String,
    /// Cantidad de sellos necesarios para canjear la recompensa.
    pub max_stamps: i32,
    pub reward_description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Cliente de la app. Los ids son strings opacos (document-store style).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Customer {
    pub user_id: String,
    pub display_name: String,
    /// Identificador externo (tarjeta física, sistema legacy). Índice único.
    pub external_id: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Relación cliente ↔ programa. Se crea lazy en el primer sello y nunca se
/// borra, solo se desactiva. Solo muta a través de las operaciones del
/// ledger (`add_stamp` / `redeem_reward`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Membership {
    pub membership_id: String,
    pub user_id: String,
    pub business_id: String,
    pub program_id: String,
    /// Sellos acumulados en el ciclo actual. Nunca negativo; este layer no
    /// aplica tope superior (el tope lo decide el caller vía `max_stamps`).
    pub current_stamps: i32,
    /// Redenciones completadas. Monotónicamente creciente.
    pub cycle: i32,
    pub last_stamp_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Membership {
    /// Membership recién creada para el primer sello de un cliente.
    pub fn new_for_first_stamp(
        membership_id: String,
        user_id: String,
        business_id: String,
        program_id: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            membership_id,
            user_id,
            business_id,
            program_id,
            current_stamps: 0,
            cycle: 0,
            last_stamp_at: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

// ============================================================================
// AUDIT EVENTS
// ============================================================================

/// Tipo de evento de auditoría emitido por el ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditEventType {
    StampAdded,
    RewardRedeemed,
}

impl std::fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuditEventType::StampAdded => "STAMP_ADDED",
            AuditEventType::RewardRedeemed => "REWARD_REDEEMED",
        };
        write!(f, "{}", s)
    }
}

/// Canal desde el que se originó la operación.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditSource {
    MerchantScan,
    Admin,
}

impl std::fmt::Display for AuditSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuditSource::MerchantScan => "merchant_scan",
            AuditSource::Admin => "admin",
        };
        write!(f, "{}", s)
    }
}

/// Registro inmutable de un sello agregado o una redención. Append-only:
/// nunca se actualiza ni se borra. El id lo asigna el store al insertar,
/// para que las funciones del ledger sigan siendo deterministas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_type: AuditEventType,
    /// Staff/merchant que ejecutó la acción.
    pub actor_id: String,
    pub business_id: String,
    pub program_id: String,
    pub membership_id: String,
    pub user_id: String,
    /// Cantidad de sellos (solo para STAMP_ADDED).
    pub stamp_count: Option<i32>,
    pub occurred_at: DateTime<Utc>,
    pub source: AuditSource,
}

// ============================================================================
// SCAN RESOLUTION VIEW
// ============================================================================

/// Snapshot de membership que ve el comercio al previsualizar un escaneo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembershipSnapshot {
    pub membership_id: String,
    pub current_stamps: i32,
    pub max_stamps: i32,
    /// `current_stamps >= max_stamps` — el cliente puede canjear ya.
    pub can_redeem_now: bool,
}

/// Resultado de `resolve_scan`: vista read-only previa a confirmar.
/// `membership = None` significa que el cliente aún no tiene membership en
/// este programa (no es un error; se crea con el primer sello).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResolution {
    pub user_id: String,
    pub customer_name: String,
    pub membership: Option<MembershipSnapshot>,
}

impl ScanResolution {
    pub fn snapshot_of(membership: &Membership, max_stamps: i32) -> MembershipSnapshot {
        MembershipSnapshot {
            membership_id: membership.membership_id.clone(),
            current_stamps: membership.current_stamps,
            max_stamps,
            can_redeem_now: membership.current_stamps >= max_stamps,
        }
    }
}

/// Actor autenticado que ejecuta el escaneo (staff de un comercio).
#[derive(Debug, Clone)]
pub struct ScanActor {
    pub staff_id: String,
    pub business_id: String,
    pub business_name: String,
}
