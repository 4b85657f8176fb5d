// ============================================================================
// WEBHOOK SERVICE - Notificaciones asíncronas a comercios
// ============================================================================

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::Sha256;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{info, warn};

use crate::domains::loyalty::{AuditEvent, LoyaltyStore};
use crate::observability::record_webhook_sent;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    pub timestamp: DateTime<Utc>,
    pub data: serde_json::Value,
    pub business_id: String,
}

pub struct WebhookService {
    store: Arc<dyn LoyaltyStore>,
    http_client: Client,
}

impl WebhookService {
    pub fn new(store: Arc<dyn LoyaltyStore>) -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self { store, http_client }
    }

    /// Enviar webhook al comercio, si tiene uno configurado.
    pub async fn send_webhook(&self, business_id: &str, event: WebhookEvent) -> Result<()> {
        // 1. Obtener configuración de webhook del comercio
        let business = match self.store.business_by_id(business_id).await {
            Ok(Some(b)) if b.is_active => b,
            Ok(Some(_)) => {
                info!("Webhook skipped, business {} inactive", business_id);
                return Ok(());
            }
            Ok(None) => {
                warn!("Webhook skipped, business {} not found", business_id);
                return Ok(());
            }
            Err(e) => return Err(anyhow::anyhow!("webhook config lookup failed: {}", e)),
        };

        let (url, secret) = match (business.webhook_url, business.webhook_secret) {
            (Some(url), Some(secret)) => (url, secret),
            _ => {
                info!("No webhook configured for business {}", business_id);
                return Ok(());
            }
        };

        // 2. Construir payload y firma HMAC
        let payload = serde_json::to_string(&event)?;
        let signature = generate_signature(&payload, &secret)?;

        // 3. Enviar con reintentos acotados
        let max_retries = 3;
        let mut retry_count = 0;

        loop {
            let response = self
                .http_client
                .post(&url)
                .header("Content-Type", "application/json")
                .header("X-Webhook-Signature", &signature)
                .header("X-Webhook-Event", &event.event)
                .header("X-Webhook-Timestamp", event.timestamp.to_rfc3339())
                .body(payload.clone())
                .send()
                .await;

            match response {
                Ok(resp) if resp.status().is_success() => {
                    info!(
                        "Webhook sent successfully to business {} for event {}",
                        business_id, event.event
                    );
                    record_webhook_sent(&event.event, true);
                    return Ok(());
                }
                Ok(resp) => {
                    warn!(
                        "Webhook to business {} failed with status {}",
                        business_id,
                        resp.status()
                    );
                }
                Err(e) => {
                    warn!("Webhook to business {} failed: {}", business_id, e);
                }
            }

            retry_count += 1;
            if retry_count >= max_retries {
                record_webhook_sent(&event.event, false);
                return Err(anyhow::anyhow!(
                    "webhook delivery to {} failed after {} attempts",
                    business_id,
                    max_retries
                ));
            }

            tokio::time::sleep(Duration::from_secs(2_u64.pow(retry_count))).await;
        }
    }

    // ========================================================================
    // WEBHOOK EVENTS - Eventos del ledger de memberships
    // ========================================================================

    /// Notificar sello acreditado
    pub async fn notify_stamp_added(&self, business_id: &str, event: &AuditEvent) -> Result<()> {
        let webhook_event = WebhookEvent {
            event: "stamp.added".to_string(),
            timestamp: event.occurred_at,
            data: json!({
                "membership_id": event.membership_id,
                "user_id": event.user_id,
                "program_id": event.program_id,
                "stamp_count": event.stamp_count,
                "actor_id": event.actor_id,
                "source": event.source.to_string(),
            }),
            business_id: business_id.to_string(),
        };

        self.send_webhook(business_id, webhook_event).await
    }

    /// Notificar recompensa canjeada
    pub async fn notify_reward_redeemed(
        &self,
        business_id: &str,
        event: &AuditEvent,
    ) -> Result<()> {
        let webhook_event = WebhookEvent {
            event: "reward.redeemed".to_string(),
            timestamp: event.occurred_at,
            data: json!({
                "membership_id": event.membership_id,
                "user_id": event.user_id,
                "program_id": event.program_id,
                "actor_id": event.actor_id,
                "source": event.source.to_string(),
            }),
            business_id: business_id.to_string(),
        };

        self.send_webhook(business_id, webhook_event).await
    }
}

/// Generar firma HMAC SHA256 del body (el comercio la verifica con su
/// webhook_secret).
pub fn generate_signature(payload: &str, secret: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).context("Invalid HMAC key")?;
    mac.update(payload.as_bytes());
    let result = mac.finalize();
    Ok(hex::encode(result.into_bytes()))
}

// ============================================================================
// SHARED INSTANCE
// ============================================================================

static WEBHOOK_SERVICE: OnceLock<Arc<WebhookService>> = OnceLock::new();

pub fn init_webhook_service(store: Arc<dyn LoyaltyStore>) {
    let _ = WEBHOOK_SERVICE.set(Arc::new(WebhookService::new(store)));
}

pub fn get_webhook_service() -> Option<Arc<WebhookService>> {
    WEBHOOK_SERVICE.get().cloned()
}
