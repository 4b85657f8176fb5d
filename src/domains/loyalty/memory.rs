// ============================================================================
// IN-MEMORY LOYALTY STORE
// ============================================================================
// Implementación de LoyaltyStore sobre HashMaps con RwLock. La usan los
// tests de protocolo (sin base de datos) y sirve para desarrollo local.
// ============================================================================

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::models::{AuditEvent, Business, Customer, LoyaltyProgram, Membership};
use super::repository::{LoyaltyStore, StoreError};

#[derive(Default)]
pub struct MemoryLoyaltyStore {
    businesses: RwLock<HashMap<String, Business>>,
    programs: RwLock<HashMap<String, LoyaltyProgram>>,
    customers: RwLock<HashMap<String, Customer>>,
    memberships: RwLock<HashMap<String, Membership>>,
    events: RwLock<Vec<AuditEvent>>,
}

impl MemoryLoyaltyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_business(&self, business: Business) {
        self.businesses
            .write()
            .await
            .insert(business.business_id.clone(), business);
    }

    pub async fn put_program(&self, program: LoyaltyProgram) {
        self.programs
            .write()
            .await
            .insert(program.program_id.clone(), program);
    }

    pub async fn put_customer(&self, customer: Customer) {
        self.customers
            .write()
            .await
            .insert(customer.user_id.clone(), customer);
    }

    pub async fn put_membership(&self, membership: Membership) {
        self.memberships
            .write()
            .await
            .insert(membership.membership_id.clone(), membership);
    }

    /// Historial completo de eventos, en orden de inserción.
    pub async fn events(&self) -> Vec<AuditEvent> {
        self.events.read().await.clone()
    }
}

#[async_trait]
impl LoyaltyStore for MemoryLoyaltyStore {
    async fn business_by_id(&self, business_id: &str) -> Result<Option<Business>, StoreError> {
        Ok(self.businesses.read().await.get(business_id).cloned())
    }

    async fn business_by_name(&self, name: &str) -> Result<Option<Business>, StoreError> {
        let businesses = self.businesses.read().await;
        Ok(businesses
            .values()
            .find(|b| b.name.eq_ignore_ascii_case(name))
            .cloned())
    }

    async fn program_by_id(&self, program_id: &str) -> Result<Option<LoyaltyProgram>, StoreError> {
        Ok(self.programs.read().await.get(program_id).cloned())
    }

    async fn customer_by_id(&self, user_id: &str) -> Result<Option<Customer>, StoreError> {
        Ok(self.customers.read().await.get(user_id).cloned())
    }

    async fn customer_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Customer>, StoreError> {
        let customers = self.customers.read().await;
        Ok(customers
            .values()
            .find(|c| c.external_id.as_deref() == Some(external_id))
            .cloned())
    }

    async fn membership_for_user_program(
        &self,
        user_id: &str,
        program_id: &str,
    ) -> Result<Option<Membership>, StoreError> {
        let memberships = self.memberships.read().await;
        Ok(memberships
            .values()
            .find(|m| m.user_id == user_id && m.program_id == program_id)
            .cloned())
    }

    async fn insert_membership(&self, membership: &Membership) -> Result<(), StoreError> {
        let mut memberships = self.memberships.write().await;
        if memberships.contains_key(&membership.membership_id) {
            return Err(StoreError::Backend(format!(
                "duplicate membership_id {}",
                membership.membership_id
            )));
        }
        memberships.insert(membership.membership_id.clone(), membership.clone());
        Ok(())
    }

    async fn patch_membership(
        &self,
        next: &Membership,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut memberships = self.memberships.write().await;
        match memberships.get_mut(&next.membership_id) {
            Some(current) if current.updated_at == expected_updated_at => {
                *current = next.clone();
                Ok(())
            }
            // versión distinta o membership inexistente: otro writer ganó
            _ => Err(StoreError::Conflict),
        }
    }

    async fn insert_audit_event(&self, event: &AuditEvent) -> Result<(), StoreError> {
        self.events.write().await.push(event.clone());
        Ok(())
    }
}
