use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::env;
use std::sync::Arc;

use crate::domains::loyalty::{
    LoyaltyStore, PgLoyaltyStore, ScanResolver, ScanTokenSigner,
};

/// Estado compartido de la aplicación. El secret de firma y la config del
/// resolver son read-only después de la construcción; se comparten vía Arc
/// entre todos los requests sin locking.
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub store: Arc<dyn LoyaltyStore>,
    pub signer: Arc<ScanTokenSigner>,
    pub resolver: Arc<ScanResolver>,
    /// Modo estricto token-only (rechaza payloads legacy userId:/externalId:)
    pub strict_token_only: bool,
}

impl AppState {
    pub async fn new() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|e| anyhow::anyhow!("DATABASE_URL must be set: {}", e))?;

        let db_pool = PgPoolOptions::new()
            .max_connections(
                env::var("DB_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(10),
            )
            .connect(&database_url)
            .await?;

        // La ausencia del secret es un error fatal de configuración: el
        // sistema nunca debe arrancar en modo sin firma.
        let signer = Arc::new(
            ScanTokenSigner::from_env()
                .map_err(|e| anyhow::anyhow!("SCAN_TOKEN_SECRET must be set: {}", e))?,
        );

        let strict_token_only = env::var("SCAN_STRICT_TOKEN_ONLY")
            .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE"))
            .unwrap_or(false);

        if strict_token_only {
            tracing::info!("🔒 Strict token-only mode enabled: legacy payloads rejected");
        }

        let store: Arc<dyn LoyaltyStore> = Arc::new(PgLoyaltyStore::new(db_pool.clone()));
        let resolver = Arc::new(ScanResolver::new(
            store.clone(),
            signer.clone(),
            strict_token_only,
        ));

        Ok(AppState {
            db_pool,
            store,
            signer,
            resolver,
            strict_token_only,
        })
    }
}
