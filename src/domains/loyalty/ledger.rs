// ============================================================================
// MEMBERSHIP LEDGER - Transiciones de estado puras
// ============================================================================
// Funciones puras y deterministas sobre snapshots de Membership. El commit a
// storage (con compare-and-swap sobre updated_at) es responsabilidad del
// caller; dos add_stamp concurrentes sobre el mismo snapshot deben resolverse
// ahí, no aquí. Invocar dos veces con los mismos inputs produce el mismo
// output, pero NO es idempotente en efecto: el caller garantiza at-most-once
// por evento físico de escaneo.
// ============================================================================

use chrono::{DateTime, Utc};

use super::models::{AuditEvent, AuditEventType, AuditSource, Membership, ScanActor};

/// Resultado de una operación del ledger: el siguiente estado de la
/// membership más el evento de auditoría a insertar.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerOutcome {
    pub next_membership: Membership,
    pub event: AuditEvent,
}

/// Precondiciones inválidas son bugs del caller: fail fast, nunca clamp.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("stamp_count must be a positive integer, got {0}")]
    InvalidStampCount(i32),
}

/// Agrega `stamp_count` sellos a la membership. Hoy siempre es 1; el conteo
/// queda reservado para promociones multi-sello.
pub fn add_stamp(
    membership: &Membership,
    stamp_count: i32,
    now: DateTime<Utc>,
    actor: &ScanActor,
    source: AuditSource,
) -> Result<LedgerOutcome, LedgerError> {
    if stamp_count < 1 {
        return Err(LedgerError::InvalidStampCount(stamp_count));
    }

    let mut next = membership.clone();
    next.current_stamps = membership.current_stamps + stamp_count;
    next.last_stamp_at = Some(now);
    next.updated_at = now;

    let event = AuditEvent {
        event_type: AuditEventType::StampAdded,
        actor_id: actor.staff_id.clone(),
        business_id: membership.business_id.clone(),
        program_id: membership.program_id.clone(),
        membership_id: membership.membership_id.clone(),
        user_id: membership.user_id.clone(),
        stamp_count: Some(stamp_count),
        occurred_at: now,
        source,
    };

    Ok(LedgerOutcome {
        next_membership: next,
        event,
    })
}

/// Canjea la recompensa: resetea los sellos a 0 e incrementa el ciclo.
/// Deliberadamente NO chequea `current_stamps >= max_stamps`: la
/// elegibilidad es responsabilidad del caller (vía `can_redeem_now` del
/// resolver), lo que deja esta operación usable también para resets
/// administrativos.
pub fn redeem_reward(
    membership: &Membership,
    now: DateTime<Utc>,
    actor: &ScanActor,
    source: AuditSource,
) -> LedgerOutcome {
    let mut next = membership.clone();
    next.current_stamps = 0;
    next.cycle = membership.cycle + 1;
    next.updated_at = now;

    let event = AuditEvent {
        event_type: AuditEventType::RewardRedeemed,
        actor_id: actor.staff_id.clone(),
        business_id: membership.business_id.clone(),
        program_id: membership.program_id.clone(),
        membership_id: membership.membership_id.clone(),
        user_id: membership.user_id.clone(),
        stamp_count: None,
        occurred_at: now,
        source,
    };

    LedgerOutcome {
        next_membership: next,
        event,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn actor() -> ScanActor {
        ScanActor {
            staff_id: "staff-1".to_string(),
            business_id: "b1".to_string(),
            business_name: "Café Central".to_string(),
        }
    }

    fn membership() -> Membership {
        let created = Utc.with_ymd_and_hms(2025, 1, 10, 9, 0, 0).unwrap();
        Membership {
            membership_id: "m1".to_string(),
            user_id: "u1".to_string(),
            business_id: "b1".to_string(),
            program_id: "p1".to_string(),
            current_stamps: 4,
            cycle: 2,
            last_stamp_at: Some(created),
            is_active: true,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn test_add_stamp_increments() {
        let m = membership();
        let now = Utc.with_ymd_and_hms(2025, 2, 1, 12, 0, 0).unwrap();

        let out = add_stamp(&m, 1, now, &actor(), AuditSource::MerchantScan).unwrap();

        assert_eq!(out.next_membership.current_stamps, 5);
        assert_eq!(out.next_membership.last_stamp_at, Some(now));
        assert_eq!(out.next_membership.updated_at, now);
        // campos no relacionados intactos
        assert_eq!(out.next_membership.cycle, m.cycle);
        assert_eq!(out.next_membership.created_at, m.created_at);
        assert_eq!(out.next_membership.membership_id, m.membership_id);

        assert_eq!(out.event.event_type, AuditEventType::StampAdded);
        assert_eq!(out.event.stamp_count, Some(1));
        assert_eq!(out.event.actor_id, "staff-1");
        assert_eq!(out.event.occurred_at, now);
    }

    #[test]
    fn test_add_stamp_multi() {
        let m = membership();
        let now = Utc::now();
        let out = add_stamp(&m, 3, now, &actor(), AuditSource::Admin).unwrap();
        assert_eq!(out.next_membership.current_stamps, 7);
        assert_eq!(out.event.stamp_count, Some(3));
        assert_eq!(out.event.source, AuditSource::Admin);
    }

    #[test]
    fn test_add_stamp_rejects_non_positive() {
        let m = membership();
        let now = Utc::now();
        assert_eq!(
            add_stamp(&m, 0, now, &actor(), AuditSource::MerchantScan),
            Err(LedgerError::InvalidStampCount(0))
        );
        assert_eq!(
            add_stamp(&m, -2, now, &actor(), AuditSource::MerchantScan),
            Err(LedgerError::InvalidStampCount(-2))
        );
    }

    #[test]
    fn test_redeem_resets_and_increments_cycle() {
        let mut m = membership();
        m.current_stamps = 10;
        let now = Utc.with_ymd_and_hms(2025, 2, 1, 12, 0, 0).unwrap();

        let out = redeem_reward(&m, now, &actor(), AuditSource::MerchantScan);

        assert_eq!(out.next_membership.current_stamps, 0);
        assert_eq!(out.next_membership.cycle, 3);
        assert_eq!(out.next_membership.updated_at, now);
        // last_stamp_at no cambia con una redención
        assert_eq!(out.next_membership.last_stamp_at, m.last_stamp_at);
        assert_eq!(out.next_membership.created_at, m.created_at);

        assert_eq!(out.event.event_type, AuditEventType::RewardRedeemed);
        assert_eq!(out.event.stamp_count, None);
    }

    #[test]
    fn test_operations_are_deterministic() {
        let m = membership();
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 8, 30, 0).unwrap();
        let a = add_stamp(&m, 1, now, &actor(), AuditSource::MerchantScan).unwrap();
        let b = add_stamp(&m, 1, now, &actor(), AuditSource::MerchantScan).unwrap();
        assert_eq!(a, b);
    }
}
