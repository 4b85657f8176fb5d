// ============================================================================
// WEBHOOK TESTS - Entrega y firma de webhooks contra un servidor mock
// ============================================================================

use chrono::Utc;
use std::sync::Arc;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sello_rust_ws::domains::loyalty::memory::MemoryLoyaltyStore;
use sello_rust_ws::domains::loyalty::{
    AuditEvent, AuditEventType, AuditSource, Business, LoyaltyStore,
};
use sello_rust_ws::services::webhook_service::{generate_signature, WebhookService};

fn business_with_webhook(id: &str, url: &str, secret: &str) -> Business {
    let now = Utc::now();
    Business {
        business_id: id.to_string(),
        name: format!("Business {}", id),
        is_active: true,
        api_key_hash: None,
        webhook_url: Some(url.to_string()),
        webhook_secret: Some(secret.to_string()),
        created_at: now,
        updated_at: now,
    }
}

fn stamp_event(business_id: &str) -> AuditEvent {
    AuditEvent {
        event_type: AuditEventType::StampAdded,
        actor_id: "staff-1".to_string(),
        business_id: business_id.to_string(),
        program_id: "p1".to_string(),
        membership_id: "m1".to_string(),
        user_id: "u1".to_string(),
        stamp_count: Some(1),
        occurred_at: Utc::now(),
        source: AuditSource::MerchantScan,
    }
}

#[tokio::test]
async fn webhook_delivers_signed_stamp_event() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/hooks/sello"))
        .and(header("X-Webhook-Event", "stamp.added"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryLoyaltyStore::new());
    let url = format!("{}/hooks/sello", server.uri());
    store
        .put_business(business_with_webhook("b1", &url, "hook-secret"))
        .await;

    let service = WebhookService::new(store);
    service
        .notify_stamp_added("b1", &stamp_event("b1"))
        .await
        .unwrap();

    // la firma del header debe ser el HMAC del body exacto
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);

    let body = String::from_utf8(requests[0].body.clone()).unwrap();
    let signature = requests[0]
        .headers
        .get("X-Webhook-Signature")
        .expect("signature header present")
        .to_str()
        .unwrap()
        .to_string();
    assert_eq!(signature, generate_signature(&body, "hook-secret").unwrap());

    // el body contiene el evento del ledger
    let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(parsed["event"], "stamp.added");
    assert_eq!(parsed["business_id"], "b1");
    assert_eq!(parsed["data"]["membership_id"], "m1");
    assert_eq!(parsed["data"]["stamp_count"], 1);
}

#[tokio::test]
async fn webhook_skipped_when_not_configured() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryLoyaltyStore::new());
    let mut business = business_with_webhook("b1", &server.uri(), "hook-secret");
    business.webhook_url = None;
    business.webhook_secret = None;
    store.put_business(business).await;

    let service = WebhookService::new(store);
    // sin webhook configurado: no-op exitoso
    service
        .notify_stamp_added("b1", &stamp_event("b1"))
        .await
        .unwrap();
}

#[tokio::test]
async fn webhook_reports_failure_after_retries() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryLoyaltyStore::new());
    let url = format!("{}/hooks/sello", server.uri());
    store
        .put_business(business_with_webhook("b1", &url, "hook-secret"))
        .await;

    let service = WebhookService::new(store.clone());
    let result = service
        .notify_reward_redeemed(
            "b1",
            &AuditEvent {
                event_type: AuditEventType::RewardRedeemed,
                actor_id: "staff-1".to_string(),
                business_id: "b1".to_string(),
                program_id: "p1".to_string(),
                membership_id: "m1".to_string(),
                user_id: "u1".to_string(),
                stamp_count: None,
                occurred_at: Utc::now(),
                source: AuditSource::MerchantScan,
            },
        )
        .await;

    assert!(result.is_err());

    // los 3 intentos llegaron al servidor
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);

    // el store sigue accesible (sanity: el servicio no lo consumió)
    assert!(store.business_by_id("b1").await.unwrap().is_some());
}
