// ============================================================================
// MIDDLEWARE PARA MÉTRICAS AUTOMÁTICAS
// ============================================================================

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::observability::record_http_request;

/// Middleware que automáticamente registra métricas de todas las requests HTTP
pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = req.uri().path().to_string();

    // Normalizar el path para agrupar rutas similares
    let normalized_path = normalize_path(&path);

    let response = next.run(req).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16();

    record_http_request(&method, &normalized_path, status, duration);

    response
}

/// Normaliza paths para agrupar rutas con parámetros dinámicos
fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').collect();
    let normalized: Vec<String> = segments
        .iter()
        .map(|seg| {
            if seg.len() == 36 && seg.contains('-') {
                // UUID
                ":id".to_string()
            } else if seg.parse::<i64>().is_ok() {
                // Número (ID)
                ":id".to_string()
            } else {
                seg.to_string()
            }
        })
        .collect();

    normalized.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path("/api/v1/merchant/scan/resolve"),
            "/api/v1/merchant/scan/resolve"
        );
        assert_eq!(
            normalize_path("/api/v1/memberships/123"),
            "/api/v1/memberships/:id"
        );
        assert_eq!(
            normalize_path("/api/v1/memberships/550e8400-e29b-41d4-a716-446655440000"),
            "/api/v1/memberships/:id"
        );
    }
}
