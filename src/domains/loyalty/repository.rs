// ============================================================================
// LOYALTY REPOSITORY - Acceso a storage detrás de un trait
// ============================================================================
// El core depende solo de estas operaciones (get por id, get por índice
// único, insert, patch con guard de versión) y nunca del esquema de
// direccionamiento de un backend concreto. PgLoyaltyStore es la
// implementación de producción; los tests usan MemoryLoyaltyStore.
// ============================================================================

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::models::{AuditEvent, Business, Customer, LoyaltyProgram, Membership};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// El patch con compare-and-swap no encontró la versión esperada:
    /// otro writer ganó la carrera. El caller reintenta el escaneo.
    #[error("membership was modified concurrently")]
    Conflict,

    #[error("storage error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

#[async_trait]
pub trait LoyaltyStore: Send + Sync {
    async fn business_by_id(&self, business_id: &str) -> Result<Option<Business>, StoreError>;

    async fn business_by_name(&self, name: &str) -> Result<Option<Business>, StoreError>;

    async fn program_by_id(&self, program_id: &str) -> Result<Option<LoyaltyProgram>, StoreError>;

    async fn customer_by_id(&self, user_id: &str) -> Result<Option<Customer>, StoreError>;

    /// Lookup por índice único secundario (tarjeta física / sistema legacy).
    async fn customer_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Customer>, StoreError>;

    /// Índice único (user_id, program_id): a lo sumo una membership.
    async fn membership_for_user_program(
        &self,
        user_id: &str,
        program_id: &str,
    ) -> Result<Option<Membership>, StoreError>;

    async fn insert_membership(&self, membership: &Membership) -> Result<(), StoreError>;

    /// Patch con concurrencia optimista: aplica `next` solo si la fila
    /// todavía tiene `updated_at = expected_updated_at`. Garantiza que dos
    /// add_stamp concurrentes no pierdan un incremento en silencio.
    async fn patch_membership(
        &self,
        next: &Membership,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Los eventos de auditoría son append-only; el store asigna el id.
    async fn insert_audit_event(&self, event: &AuditEvent) -> Result<(), StoreError>;
}

// ============================================================================
// POSTGRES IMPLEMENTATION
// ============================================================================

pub struct PgLoyaltyStore {
    db: PgPool,
}

impl PgLoyaltyStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl LoyaltyStore for PgLoyaltyStore {
    async fn business_by_id(&self, business_id: &str) -> Result<Option<Business>, StoreError> {
        let row = sqlx::query_as::<_, Business>(
            r#"
            SELECT business_id, name, is_active, api_key_hash,
                   webhook_url, webhook_secret, created_at, updated_at
            FROM loyalty.businesses
            WHERE business_id = $1
            "#,
        )
        .bind(business_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row)
    }

    async fn business_by_name(&self, name: &str) -> Result<Option<Business>, StoreError> {
        let row = sqlx::query_as::<_, Business>(
            r#"
            SELECT business_id, name, is_active, api_key_hash,
                   webhook_url, webhook_secret, created_at, updated_at
            FROM loyalty.businesses
            WHERE LOWER(name) = LOWER($1)
            LIMIT 1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.db)
        .await?;

        Ok(row)
    }

    async fn program_by_id(&self, program_id: &str) -> Result<Option<LoyaltyProgram>, StoreError> {
        let row = sqlx::query_as::<_, LoyaltyProgram>(
            r#"
            SELECT program_id, business_id, name, max_stamps,
                   reward_description, is_active, created_at, updated_at
            FROM loyalty.programs
            WHERE program_id = $1
            "#,
        )
        .bind(program_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row)
    }

    async fn customer_by_id(&self, user_id: &str) -> Result<Option<Customer>, StoreError> {
        let row = sqlx::query_as::<_, Customer>(
            r#"
            SELECT user_id, display_name, external_id, is_active, created_at
            FROM loyalty.customers
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row)
    }

    async fn customer_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Customer>, StoreError> {
        let row = sqlx::query_as::<_, Customer>(
            r#"
            SELECT user_id, display_name, external_id, is_active, created_at
            FROM loyalty.customers
            WHERE external_id = $1
            LIMIT 1
            "#,
        )
        .bind(external_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row)
    }

    async fn membership_for_user_program(
        &self,
        user_id: &str,
        program_id: &str,
    ) -> Result<Option<Membership>, StoreError> {
        let row = sqlx::query_as::<_, Membership>(
            r#"
            SELECT membership_id, user_id, business_id, program_id,
                   current_stamps, cycle, last_stamp_at, is_active,
                   created_at, updated_at
            FROM loyalty.memberships
            WHERE user_id = $1 AND program_id = $2
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(program_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row)
    }

    async fn insert_membership(&self, membership: &Membership) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO loyalty.memberships (
                membership_id, user_id, business_id, program_id,
                current_stamps, cycle, last_stamp_at, is_active,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(&membership.membership_id)
        .bind(&membership.user_id)
        .bind(&membership.business_id)
        .bind(&membership.program_id)
        .bind(membership.current_stamps)
        .bind(membership.cycle)
        .bind(membership.last_stamp_at)
        .bind(membership.is_active)
        .bind(membership.created_at)
        .bind(membership.updated_at)
        .execute(&self.db)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23505") => {
                // unique violation en (user_id, program_id): dos primeros
                // sellos concurrentes; el que pierde reintenta el escaneo
                Err(StoreError::Conflict)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn patch_membership(
        &self,
        next: &Membership,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE loyalty.memberships
            SET current_stamps = $1,
                cycle = $2,
                last_stamp_at = $3,
                is_active = $4,
                updated_at = $5
            WHERE membership_id = $6
              AND updated_at = $7
            "#,
        )
        .bind(next.current_stamps)
        .bind(next.cycle)
        .bind(next.last_stamp_at)
        .bind(next.is_active)
        .bind(next.updated_at)
        .bind(&next.membership_id)
        .bind(expected_updated_at)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict);
        }

        Ok(())
    }

    async fn insert_audit_event(&self, event: &AuditEvent) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO loyalty.audit_events (
                event_type, actor_id, business_id, program_id,
                membership_id, user_id, stamp_count, occurred_at, source
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(event.event_type.to_string())
        .bind(&event.actor_id)
        .bind(&event.business_id)
        .bind(&event.program_id)
        .bind(&event.membership_id)
        .bind(&event.user_id)
        .bind(event.stamp_count)
        .bind(event.occurred_at)
        .bind(event.source.to_string())
        .execute(&self.db)
        .await?;

        Ok(())
    }
}
