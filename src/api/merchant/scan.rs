// ============================================================================
// MERCHANT SCAN - Flujo de dos fases: resolver (preview) y confirmar
// ============================================================================
// El comercio primero resuelve el código escaneado (read-only, sin efectos)
// y después confirma el sello o la redención. El commit usa el patch con
// compare-and-swap del store: si dos escaneos simultáneos tocan la misma
// membership, uno recibe 409 y reintenta.
// ============================================================================

use axum::{extract::State, Extension, Json};
use chrono::{SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::api::models::ApiError;
use crate::domains::loyalty::{
    add_stamp, redeem_reward, AuditSource, Membership, MembershipSnapshot, ScanResolution,
};
use crate::middleware::StaffClaims;
use crate::observability::{record_reward_redeemed, record_scan_resolution, record_stamp_added};
use crate::services::get_webhook_service;
use crate::state::AppState;

// ============================================================================
// REQUEST / RESPONSE MODELS
// ============================================================================

/// Request para resolver un código escaneado (preview, sin efectos).
#[derive(Debug, Deserialize, Validate)]
pub struct ResolveScanRequest {
    /// Raw payload leído por el scanner del comercio.
    #[validate(length(min = 1, max = 4096))]
    pub payload: String,
    #[validate(length(min = 1, max = 128))]
    pub program_id: String,
}

#[derive(Debug, Serialize)]
pub struct ResolveScanResponse {
    pub success: bool,
    pub customer_name: String,
    /// None si el cliente todavía no tiene membership en el programa.
    pub membership: Option<MembershipSnapshot>,
    pub message: String,
}

/// Request para confirmar un sello tras el preview.
#[derive(Debug, Deserialize, Validate)]
pub struct StampScanRequest {
    #[validate(length(min = 1, max = 4096))]
    pub payload: String,
    #[validate(length(min = 1, max = 128))]
    pub program_id: String,
    /// Cantidad de sellos. Reservado para promociones multi-sello; hoy 1.
    pub stamp_count: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct StampScanResponse {
    pub success: bool,
    pub customer_name: String,
    pub membership: MembershipSnapshot,
    pub message: String,
}

/// Request para canjear la recompensa de una membership elegible.
#[derive(Debug, Deserialize, Validate)]
pub struct RedeemScanRequest {
    #[validate(length(min = 1, max = 4096))]
    pub payload: String,
    #[validate(length(min = 1, max = 128))]
    pub program_id: String,
}

#[derive(Debug, Serialize)]
pub struct RedeemScanResponse {
    pub success: bool,
    pub customer_name: String,
    pub membership: MembershipSnapshot,
    /// Ciclos completados después de esta redención.
    pub cycle: i32,
    pub message: String,
}

fn validate_request<T: Validate>(req: &T) -> Result<(), ApiError> {
    req.validate().map_err(|e| ApiError::BadRequest {
        code: "INVALID_REQUEST",
        message: format!("Request inválido: {}", e),
    })
}

// ============================================================================
// HANDLERS
// ============================================================================

/// Resuelve un código escaneado contra el comercio del staff autenticado.
/// Read-only: el merchant previsualiza el efecto antes de confirmar.
///
/// # Endpoint
/// POST /api/v1/merchant/scan/resolve
pub async fn resolve_scan(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<StaffClaims>,
    Json(payload): Json<ResolveScanRequest>,
) -> Result<Json<ResolveScanResponse>, ApiError> {
    validate_request(&payload)?;

    let actor = staff.to_actor();
    let resolution = state
        .resolver
        .resolve_scan(
            Some(&actor),
            &payload.payload,
            &actor.business_id,
            &payload.program_id,
            Utc::now(),
        )
        .await
        .map_err(|e| {
            record_scan_resolution(e.code());
            ApiError::from(e)
        })?;

    record_scan_resolution("ok");

    let message = match &resolution.membership {
        Some(snap) if snap.can_redeem_now => {
            "Cliente elegible para canjear su recompensa.".to_string()
        }
        Some(snap) => format!("{} de {} sellos.", snap.current_stamps, snap.max_stamps),
        None => "Cliente sin membership en este programa. Se creará con el primer sello.".to_string(),
    };

    Ok(Json(ResolveScanResponse {
        success: true,
        customer_name: resolution.customer_name,
        membership: resolution.membership,
        message,
    }))
}

/// Confirma un sello: resuelve el payload, crea la membership si es el
/// primer sello del cliente y commitea la transición del ledger.
///
/// # Endpoint
/// POST /api/v1/merchant/scan/stamp
///
/// # Returns
/// - 200 OK: sello acreditado
/// - 400/403/404: fallo de resolución (códigos estables)
/// - 409 Conflict: otro escaneo ganó la carrera; reintentar
pub async fn stamp_scan(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<StaffClaims>,
    Json(payload): Json<StampScanRequest>,
) -> Result<Json<StampScanResponse>, ApiError> {
    validate_request(&payload)?;

    let actor = staff.to_actor();
    // Postgres guarda timestamptz con precisión de microsegundos; truncamos
    // para que el CAS por updated_at compare igual tras el round-trip.
    let now = Utc::now().trunc_subsecs(6);

    let resolution = state
        .resolver
        .resolve_scan(
            Some(&actor),
            &payload.payload,
            &actor.business_id,
            &payload.program_id,
            now,
        )
        .await
        .map_err(|e| {
            record_scan_resolution(e.code());
            ApiError::from(e)
        })?;

    record_scan_resolution("ok");

    // El resolver ya validó programa activo y pertenencia al comercio.
    let program = state
        .store
        .program_by_id(&payload.program_id)
        .await?
        .ok_or_else(|| ApiError::InternalError("Programa desapareció durante el escaneo".to_string()))?;

    // Membership lazy: se crea con el primer sello del cliente.
    let membership = match state
        .store
        .membership_for_user_program(&resolution.user_id, &payload.program_id)
        .await?
        .filter(|m| m.is_active)
    {
        Some(m) => m,
        None => {
            let fresh = Membership::new_for_first_stamp(
                Uuid::new_v4().to_string(),
                resolution.user_id.clone(),
                actor.business_id.clone(),
                payload.program_id.clone(),
                now,
            );
            state.store.insert_membership(&fresh).await?;
            info!(
                membership_id = %fresh.membership_id,
                user_id = %fresh.user_id,
                "🆕 Membership creada en el primer sello"
            );
            fresh
        }
    };

    let stamp_count = payload.stamp_count.unwrap_or(1);
    let outcome = add_stamp(&membership, stamp_count, now, &actor, AuditSource::MerchantScan)
        .map_err(|e| {
            warn!(stamp_count, "🚫 stamp_count inválido");
            ApiError::BadRequest {
                code: "INVALID_STAMP_COUNT",
                message: e.to_string(),
            }
        })?;

    // at-most-once por escaneo físico: CAS sobre updated_at
    state
        .store
        .patch_membership(&outcome.next_membership, membership.updated_at)
        .await?;
    state.store.insert_audit_event(&outcome.event).await?;

    record_stamp_added(stamp_count);

    let snapshot = ScanResolution::snapshot_of(&outcome.next_membership, program.max_stamps);

    info!(
        membership_id = %snapshot.membership_id,
        current_stamps = snapshot.current_stamps,
        max_stamps = snapshot.max_stamps,
        "✅ Sello acreditado"
    );

    // Webhook al comercio (asíncrono, no bloqueante)
    if let Some(webhook_service) = get_webhook_service() {
        let business_id = actor.business_id.clone();
        let event = outcome.event.clone();
        tokio::spawn(async move {
            if let Err(e) = webhook_service.notify_stamp_added(&business_id, &event).await {
                tracing::error!("Failed to send stamp webhook: {}", e);
            }
        });
    }

    let message = if snapshot.can_redeem_now {
        "Sello acreditado. ¡El cliente ya puede canjear su recompensa!".to_string()
    } else {
        format!(
            "Sello acreditado: {} de {}.",
            snapshot.current_stamps, snapshot.max_stamps
        )
    };

    Ok(Json(StampScanResponse {
        success: true,
        customer_name: resolution.customer_name,
        membership: snapshot,
        message,
    }))
}

/// Canjea la recompensa. La elegibilidad (`can_redeem_now`) se chequea acá,
/// en el caller, no dentro de la operación del ledger.
///
/// # Endpoint
/// POST /api/v1/merchant/scan/redeem
pub async fn redeem_scan(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<StaffClaims>,
    Json(payload): Json<RedeemScanRequest>,
) -> Result<Json<RedeemScanResponse>, ApiError> {
    validate_request(&payload)?;

    let actor = staff.to_actor();
    let now = Utc::now().trunc_subsecs(6);

    let resolution = state
        .resolver
        .resolve_scan(
            Some(&actor),
            &payload.payload,
            &actor.business_id,
            &payload.program_id,
            now,
        )
        .await
        .map_err(|e| {
            record_scan_resolution(e.code());
            ApiError::from(e)
        })?;

    record_scan_resolution("ok");

    let snapshot = resolution.membership.ok_or_else(|| ApiError::BadRequest {
        code: "NO_MEMBERSHIP",
        message: "El cliente no tiene membership en este programa.".to_string(),
    })?;

    if !snapshot.can_redeem_now {
        return Err(ApiError::BadRequest {
            code: "REDEEM_NOT_ELIGIBLE",
            message: format!(
                "El cliente tiene {} de {} sellos.",
                snapshot.current_stamps, snapshot.max_stamps
            ),
        });
    }

    let membership = state
        .store
        .membership_for_user_program(&resolution.user_id, &payload.program_id)
        .await?
        .filter(|m| m.is_active)
        .ok_or_else(|| {
            ApiError::InternalError("Membership desapareció durante el canje".to_string())
        })?;

    let outcome = redeem_reward(&membership, now, &actor, AuditSource::MerchantScan);

    state
        .store
        .patch_membership(&outcome.next_membership, membership.updated_at)
        .await?;
    state.store.insert_audit_event(&outcome.event).await?;

    record_reward_redeemed();

    info!(
        membership_id = %membership.membership_id,
        cycle = outcome.next_membership.cycle,
        "🎁 Recompensa canjeada"
    );

    if let Some(webhook_service) = get_webhook_service() {
        let business_id = actor.business_id.clone();
        let event = outcome.event.clone();
        tokio::spawn(async move {
            if let Err(e) = webhook_service
                .notify_reward_redeemed(&business_id, &event)
                .await
            {
                tracing::error!("Failed to send redemption webhook: {}", e);
            }
        });
    }

    let next_snapshot = MembershipSnapshot {
        membership_id: outcome.next_membership.membership_id.clone(),
        current_stamps: outcome.next_membership.current_stamps,
        max_stamps: snapshot.max_stamps,
        can_redeem_now: false,
    };

    Ok(Json(RedeemScanResponse {
        success: true,
        customer_name: resolution.customer_name,
        membership: next_snapshot,
        cycle: outcome.next_membership.cycle,
        message: "Recompensa canjeada. La tarjeta vuelve a cero sellos.".to_string(),
    }))
}
