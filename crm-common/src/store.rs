use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::model::{Contact, Dealership, Lead, NewContact, NewLead, UnattendedLead};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Enumeration of errors for operations against the relational store.
/// Errors can originate from sqlx and are wrapped by us to provide additional context.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("connection failed with: {error}")]
    Connection { error: sqlx::Error },
    #[error("{command} query failed with: {error}")]
    Query { command: String, error: sqlx::Error },
    #[error("migrations failed with: {error}")]
    Migration { error: sqlx::migrate::MigrateError },
    #[error("contact {0} not found")]
    ContactNotFound(Uuid),
    #[error("lead {0} not found")]
    LeadNotFound(Uuid),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// The shared relational state every component serializes through. All
/// coordination in the lead core happens via these calls; no component keeps
/// state of its own between invocations.
#[async_trait]
pub trait Store: Send + Sync {
    async fn list_dealerships(&self) -> StoreResult<Vec<Dealership>>;

    async fn insert_contact(&self, new: NewContact) -> StoreResult<Contact>;
    async fn get_contact(&self, id: Uuid) -> StoreResult<Contact>;
    /// Full-row save. The caller is expected to have read the row first.
    async fn update_contact(&self, contact: &Contact) -> StoreResult<()>;

    async fn insert_lead(&self, new: NewLead) -> StoreResult<Lead>;
    async fn get_lead(&self, id: Uuid) -> StoreResult<Lead>;
    /// Clears both claim fields. An expired claim is exactly as if it never
    /// happened.
    async fn clear_lead_claim(&self, lead_id: Uuid) -> StoreResult<()>;

    /// Leads with the ingestion status and no assignee.
    async fn unattended_eligible_leads(&self) -> StoreResult<Vec<Lead>>;
    /// Eligible leads holding a claim taken out before `cutoff`.
    async fn expired_claim_leads(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<Lead>>;

    async fn list_unattended(&self) -> StoreResult<Vec<UnattendedLead>>;
    async fn unattended_exists(&self, lead_id: Uuid) -> StoreResult<bool>;
    /// Idempotent on lead_id: inserting an entry that already exists is a
    /// no-op, so concurrent sweeps cannot duplicate index rows.
    async fn insert_unattended(&self, entry: UnattendedLead) -> StoreResult<()>;
    /// Idempotent: deleting an absent entry is a no-op.
    async fn delete_unattended(&self, lead_id: Uuid) -> StoreResult<()>;
}
