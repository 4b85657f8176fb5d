pub mod webhook_service;

// Re-export services
pub use webhook_service::{get_webhook_service, init_webhook_service, WebhookService};
