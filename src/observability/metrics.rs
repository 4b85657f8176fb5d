// ============================================================================
// PROMETHEUS METRICS - Sistema de Observabilidad
// ============================================================================
// Métricas para monitoreo en tiempo real con Prometheus/Grafana
// ============================================================================

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, HistogramVec,
    IntCounter, IntCounterVec,
};

lazy_static! {
    // ========================================================================
    // HTTP REQUEST METRICS
    // ========================================================================

    /// Total de requests HTTP por método, endpoint y status
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "endpoint", "status"]
    )
    .unwrap();

    /// Duración de requests HTTP en segundos
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "endpoint"],
        vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0]
    )
    .unwrap();

    // ========================================================================
    // SCAN PROTOCOL METRICS
    // ========================================================================

    /// Resoluciones de escaneo por resultado (ok o código de error)
    pub static ref SCAN_RESOLUTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "scan_resolutions_total",
        "Total scan resolutions by outcome",
        &["result"]
    )
    .unwrap();

    /// Scan tokens emitidos a clientes
    pub static ref SCAN_TOKENS_ISSUED_TOTAL: IntCounter = register_int_counter!(
        "scan_tokens_issued_total",
        "Total scan tokens issued to customers"
    )
    .unwrap();

    // ========================================================================
    // LEDGER METRICS
    // ========================================================================

    /// Sellos acreditados (suma de stamp_count)
    pub static ref STAMPS_ADDED_TOTAL: IntCounter = register_int_counter!(
        "stamps_added_total",
        "Total stamps credited to memberships"
    )
    .unwrap();

    /// Recompensas canjeadas
    pub static ref REWARDS_REDEEMED_TOTAL: IntCounter = register_int_counter!(
        "rewards_redeemed_total",
        "Total rewards redeemed"
    )
    .unwrap();

    // ========================================================================
    // AUTHENTICATION / WEBHOOK METRICS
    // ========================================================================

    /// Logins de staff de comercios
    pub static ref MERCHANT_LOGINS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "merchant_logins_total",
        "Total merchant staff login attempts",
        &["status"]
    )
    .unwrap();

    /// Webhooks enviados a comercios
    pub static ref WEBHOOKS_SENT_TOTAL: IntCounterVec = register_int_counter_vec!(
        "webhooks_sent_total",
        "Total webhooks delivered to businesses",
        &["event", "status"]
    )
    .unwrap();
}

// ============================================================================
// RECORD HELPERS
// ============================================================================

pub fn record_http_request(method: &str, endpoint: &str, status: u16, duration: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, endpoint, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, endpoint])
        .observe(duration);
}

pub fn record_scan_resolution(result: &str) {
    SCAN_RESOLUTIONS_TOTAL.with_label_values(&[result]).inc();
}

pub fn record_token_issued() {
    SCAN_TOKENS_ISSUED_TOTAL.inc();
}

pub fn record_stamp_added(stamp_count: i32) {
    STAMPS_ADDED_TOTAL.inc_by(stamp_count.max(0) as u64);
}

pub fn record_reward_redeemed() {
    REWARDS_REDEEMED_TOTAL.inc();
}

pub fn record_merchant_login(success: bool) {
    let status = if success { "success" } else { "failure" };
    MERCHANT_LOGINS_TOTAL.with_label_values(&[status]).inc();
}

pub fn record_webhook_sent(event: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    WEBHOOKS_SENT_TOTAL.with_label_values(&[event, status]).inc();
}
