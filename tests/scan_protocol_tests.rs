// ============================================================================
// SCAN PROTOCOL TESTS - Escenarios end-to-end del core (sin base de datos)
// ============================================================================

use chrono::{Duration, Utc};
use std::sync::Arc;

use sello_rust_ws::domains::loyalty::memory::MemoryLoyaltyStore;
use sello_rust_ws::domains::loyalty::{
    add_stamp, redeem_reward, AuditEventType, AuditSource, Business, Customer, LoyaltyProgram,
    LoyaltyStore, Membership, ScanActor, ScanError, ScanResolution, ScanResolver, ScanTokenError,
    ScanTokenSigner, StoreError,
};

const SECRET: &[u8] = b"integration-test-secret";

fn actor() -> ScanActor {
    ScanActor {
        staff_id: "staff-1".to_string(),
        business_id: "b1".to_string(),
        business_name: "Café Central".to_string(),
    }
}

fn business(id: &str) -> Business {
    let now = Utc::now();
    Business {
        business_id: id.to_string(),
        name: format!("Business {}", id),
        is_active: true,
        api_key_hash: None,
        webhook_url: None,
        webhook_secret: None,
        created_at: now,
        updated_at: now,
    }
}

fn program(id: &str, business_id: &str, max_stamps: i32) -> LoyaltyProgram {
    let now = Utc::now();
    LoyaltyProgram {
        program_id: id.to_string(),
        business_id: business_id.to_string(),
        name: "Tarjeta de café".to_string(),
        max_stamps,
        reward_description: Some("Café gratis".to_string()),
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

fn customer(id: &str, name: &str) -> Customer {
    Customer {
        user_id: id.to_string(),
        display_name: name.to_string(),
        external_id: None,
        is_active: true,
        created_at: Utc::now(),
    }
}

async fn setup() -> (Arc<MemoryLoyaltyStore>, Arc<ScanTokenSigner>, ScanResolver) {
    let store = Arc::new(MemoryLoyaltyStore::new());
    store.put_business(business("b1")).await;
    store.put_program(program("p1", "b1", 10)).await;
    store.put_customer(customer("u1", "Ana López")).await;

    let signer = Arc::new(ScanTokenSigner::new(SECRET.to_vec()).unwrap());
    let resolver = ScanResolver::new(store.clone(), signer.clone(), false);
    (store, signer, resolver)
}

/// Escenario A: cliente genera token en t0, el comercio escanea en t0+30s.
/// Sin membership previa: el resolver la reporta ausente y el primer sello
/// sobre una membership fresca deja current_stamps = 1.
#[tokio::test]
async fn scenario_a_first_stamp_for_new_customer() {
    let (store, signer, resolver) = setup().await;

    let t0 = Utc::now();
    let raw = signer.issue_encoded("u1", t0.timestamp_millis());

    let scanned_at = t0 + Duration::milliseconds(30_000);
    let resolution = resolver
        .resolve_scan(Some(&actor()), &raw, "b1", "p1", scanned_at)
        .await
        .unwrap();

    assert_eq!(resolution.customer_name, "Ana López");
    assert!(resolution.membership.is_none());

    // primer sello: el caller crea la membership fresca y commitea
    let fresh = Membership::new_for_first_stamp(
        "m1".to_string(),
        resolution.user_id.clone(),
        "b1".to_string(),
        "p1".to_string(),
        scanned_at,
    );
    store.insert_membership(&fresh).await.unwrap();

    let outcome = add_stamp(&fresh, 1, scanned_at, &actor(), AuditSource::MerchantScan).unwrap();
    assert_eq!(outcome.next_membership.current_stamps, 1);

    store
        .patch_membership(&outcome.next_membership, fresh.updated_at)
        .await
        .unwrap();
    store.insert_audit_event(&outcome.event).await.unwrap();

    // el siguiente resolve ya ve la membership con un sello
    let raw2 = signer.issue_encoded("u1", scanned_at.timestamp_millis());
    let resolution = resolver
        .resolve_scan(Some(&actor()), &raw2, "b1", "p1", scanned_at)
        .await
        .unwrap();
    let snap = resolution.membership.unwrap();
    assert_eq!(snap.current_stamps, 1);
    assert!(!snap.can_redeem_now);

    let events = store.events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, AuditEventType::StampAdded);
    assert_eq!(events[0].stamp_count, Some(1));
}

/// Escenario B: membership llena (10/10) → can_redeem_now; el canje resetea
/// a 0 sellos e incrementa el ciclo.
#[tokio::test]
async fn scenario_b_redeem_full_card() {
    let (store, signer, resolver) = setup().await;

    let t0 = Utc::now();
    let mut membership = Membership::new_for_first_stamp(
        "m1".to_string(),
        "u1".to_string(),
        "b1".to_string(),
        "p1".to_string(),
        t0,
    );
    membership.current_stamps = 10;
    membership.cycle = 1;
    store.put_membership(membership.clone()).await;

    let raw = signer.issue_encoded("u1", t0.timestamp_millis());
    let resolution = resolver
        .resolve_scan(Some(&actor()), &raw, "b1", "p1", t0)
        .await
        .unwrap();

    let snap = resolution.membership.unwrap();
    assert!(snap.can_redeem_now);

    // el caller confirmó la elegibilidad; el ledger hace el reset
    let redeemed_at = t0 + Duration::milliseconds(5_000);
    let outcome = redeem_reward(&membership, redeemed_at, &actor(), AuditSource::MerchantScan);

    assert_eq!(outcome.next_membership.current_stamps, 0);
    assert_eq!(outcome.next_membership.cycle, 2);
    assert_eq!(outcome.event.event_type, AuditEventType::RewardRedeemed);

    store
        .patch_membership(&outcome.next_membership, membership.updated_at)
        .await
        .unwrap();

    let after = store
        .membership_for_user_program("u1", "p1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after.current_stamps, 0);
    assert_eq!(after.cycle, 2);
}

/// Escenario C: token generado en t0 y escaneado en t0+121s falla con error
/// de expiración aunque la firma sea válida.
#[tokio::test]
async fn scenario_c_expired_token_rejected() {
    let (_store, signer, resolver) = setup().await;

    let t0 = Utc::now();
    let raw = signer.issue_encoded("u1", t0.timestamp_millis());

    let scanned_at = t0 + Duration::milliseconds(121_000);
    let err = resolver
        .resolve_scan(Some(&actor()), &raw, "b1", "p1", scanned_at)
        .await
        .unwrap_err();

    assert_eq!(err, ScanError::InvalidScanToken(ScanTokenError::Expired));
    assert_eq!(err.code(), "INVALID_SCAN_TOKEN");
}

/// La precedencia de errores del resolver es determinista: comercio
/// inactivo se reporta antes que un QR inválido.
#[tokio::test]
async fn resolver_error_precedence() {
    let (store, _signer, resolver) = setup().await;

    let mut b = business("b1");
    b.is_active = false;
    store.put_business(b).await;

    let err = resolver
        .resolve_scan(Some(&actor()), "garbage-payload", "b1", "p1", Utc::now())
        .await
        .unwrap_err();
    assert_eq!(err, ScanError::BusinessInactive);
    assert_eq!(err.code(), "BUSINESS_INACTIVE");
}

/// Dos commits sobre el mismo snapshot: el segundo patch pierde el CAS y
/// recibe Conflict en lugar de pisar el incremento del primero.
#[tokio::test]
async fn concurrent_stamp_loses_cas_race() {
    let (store, _signer, _resolver) = setup().await;

    let t0 = Utc::now();
    let membership = Membership::new_for_first_stamp(
        "m1".to_string(),
        "u1".to_string(),
        "b1".to_string(),
        "p1".to_string(),
        t0,
    );
    store.put_membership(membership.clone()).await;

    // dos escaneos leen el mismo snapshot
    let first = add_stamp(
        &membership,
        1,
        t0 + Duration::milliseconds(100),
        &actor(),
        AuditSource::MerchantScan,
    )
    .unwrap();
    let second = add_stamp(
        &membership,
        1,
        t0 + Duration::milliseconds(150),
        &actor(),
        AuditSource::MerchantScan,
    )
    .unwrap();

    store
        .patch_membership(&first.next_membership, membership.updated_at)
        .await
        .unwrap();

    let err = store
        .patch_membership(&second.next_membership, membership.updated_at)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict));

    // el incremento del primero no se perdió
    let after = store
        .membership_for_user_program("u1", "p1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after.current_stamps, 1);
}

/// El snapshot del resolver refleja can_redeem_now también vía la forma
/// legacy userId:, que sigue aceptada fuera del modo estricto.
#[tokio::test]
async fn legacy_payload_still_resolves() {
    let (store, _signer, resolver) = setup().await;

    let t0 = Utc::now();
    let mut membership = Membership::new_for_first_stamp(
        "m1".to_string(),
        "u1".to_string(),
        "b1".to_string(),
        "p1".to_string(),
        t0,
    );
    membership.current_stamps = 4;
    store.put_membership(membership).await;

    let resolution = resolver
        .resolve_scan(Some(&actor()), "userId:u1", "b1", "p1", t0)
        .await
        .unwrap();

    let snap = resolution.membership.unwrap();
    assert_eq!(snap.current_stamps, 4);
    assert_eq!(snap.max_stamps, 10);
    assert!(!snap.can_redeem_now);
}

/// Modo estricto token-only: los payloads legacy se rechazan, el token
/// firmado sigue pasando.
#[tokio::test]
async fn strict_mode_requires_signed_token() {
    let store = Arc::new(MemoryLoyaltyStore::new());
    store.put_business(business("b1")).await;
    store.put_program(program("p1", "b1", 10)).await;
    store.put_customer(customer("u1", "Ana López")).await;

    let signer = Arc::new(ScanTokenSigner::new(SECRET.to_vec()).unwrap());
    let resolver = ScanResolver::new(store, signer.clone(), true);

    let now = Utc::now();
    let err = resolver
        .resolve_scan(Some(&actor()), "userId:u1", "b1", "p1", now)
        .await
        .unwrap_err();
    assert_eq!(err, ScanError::InvalidQrPayload);

    let raw = signer.issue_encoded("u1", now.timestamp_millis());
    let resolution = resolver
        .resolve_scan(Some(&actor()), &raw, "b1", "p1", now)
        .await
        .unwrap();
    assert_eq!(resolution.user_id, "u1");
}

/// Sanity del view helper sobre la resolución (usado por los handlers).
#[tokio::test]
async fn snapshot_reports_membership_fields() {
    let t0 = Utc::now();
    let mut membership = Membership::new_for_first_stamp(
        "m7".to_string(),
        "u1".to_string(),
        "b1".to_string(),
        "p1".to_string(),
        t0,
    );
    membership.current_stamps = 12;

    let snap = ScanResolution::snapshot_of(&membership, 10);
    assert_eq!(snap.membership_id, "m7");
    assert_eq!(snap.current_stamps, 12);
    assert_eq!(snap.max_stamps, 10);
    // sin clamp: 12/10 sigue siendo elegible
    assert!(snap.can_redeem_now);
}
