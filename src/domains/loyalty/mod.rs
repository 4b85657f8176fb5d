// ============================================================================
// LOYALTY DOMAIN - Protocolo de scan tokens y ledger de memberships
// ============================================================================
// Núcleo del producto: emisión/verificación de tokens de escaneo firmados,
// resolución de escaneos y transiciones de estado de memberships. Todo lo
// de este módulo es lógica pura + el trait de storage; la superficie HTTP
// vive en crate::api.
// ============================================================================

pub mod ledger;
pub mod memory;
pub mod models;
pub mod qr_image;
pub mod repository;
pub mod resolver;
pub mod signer;
pub mod token;

pub use ledger::{add_stamp, redeem_reward, LedgerError, LedgerOutcome};
pub use models::{
    AuditEvent, AuditEventType, AuditSource, Business, Customer, LoyaltyProgram, Membership,
    MembershipSnapshot, ScanActor, ScanResolution,
};
pub use repository::{LoyaltyStore, PgLoyaltyStore, StoreError};
pub use resolver::{ScanError, ScanResolver};
pub use signer::{is_expired, ScanTokenSigner, MAX_CLOCK_SKEW_MS, TOKEN_TTL_MS};
pub use token::{ScanTokenError, ScanTokenPayload, TOKEN_PREFIX};
