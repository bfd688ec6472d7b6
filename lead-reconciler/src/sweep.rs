use std::sync::Arc;

use chrono::Duration;
use metrics::counter;
use thiserror::Error;
use uuid::Uuid;

use crm_common::model::UnattendedLead;
use crm_common::store::{Store, StoreError};
use crm_common::time::Clock;

#[derive(Error, Debug)]
pub enum SweepError {
    #[error("sweep aborted: {0}")]
    Store(#[from] StoreError),
}

/// Makes the unattended-lead index converge to "leads that currently need
/// human attention". The index is a derived view; the lead rows stay the
/// source of truth, so every sweep re-derives from them.
///
/// Safe to run concurrently with itself and with ingestion: inserts are
/// existence-checked and keyed on lead id, deletes are idempotent.
pub struct Sweeper {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    lock_duration: Duration,
}

impl Sweeper {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, lock_duration: Duration) -> Self {
        Self {
            store,
            clock,
            lock_duration,
        }
    }

    /// One full reconciliation sweep. The first row-level store error aborts
    /// the whole sweep; a half-finished sweep cannot be resumed, but the
    /// next tick redoes it wholesale.
    pub async fn sweep(&self) -> Result<(), SweepError> {
        // expiry must run before retirement: pass 2 clears the claim fields
        // on the lead itself, so pass 3 sees a just-expired lead as eligible
        // instead of immediately retiring it again
        self.index_new_leads().await?;
        self.expire_stale_claims().await?;
        self.retire_ineligible().await?;

        counter!("reconciler_sweeps_total").increment(1);
        Ok(())
    }

    /// Existence-checked insert. Ingestion also writes index entries, and
    /// sweeps may overlap; without the check a re-run would duplicate rows.
    async fn ensure_indexed(&self, lead_id: Uuid) -> Result<(), StoreError> {
        if !self.store.unattended_exists(lead_id).await? {
            self.store
                .insert_unattended(UnattendedLead {
                    lead_id,
                    created_at: self.clock.now(),
                    claimed_by: None,
                    claimed_at: None,
                })
                .await?;
            counter!("reconciler_index_inserted_total").increment(1);
        }
        Ok(())
    }

    /// Pass 1: every unattended-eligible lead gets an index entry.
    async fn index_new_leads(&self) -> Result<(), StoreError> {
        for lead in self.store.unattended_eligible_leads().await? {
            self.ensure_indexed(lead.id).await?;
        }
        Ok(())
    }

    /// Pass 2: claims older than the lock window are released on the lead
    /// row itself. An expired claim is exactly as if it never happened.
    async fn expire_stale_claims(&self) -> Result<(), StoreError> {
        let cutoff = self.clock.now() - self.lock_duration;
        for lead in self.store.expired_claim_leads(cutoff).await? {
            tracing::info!(
                lead_id = %lead.id,
                claimed_by = lead.claimed_by.as_deref().unwrap_or(""),
                "releasing expired claim"
            );
            self.store.clear_lead_claim(lead.id).await?;
            counter!("reconciler_claims_expired_total").increment(1);
            self.ensure_indexed(lead.id).await?;
        }
        Ok(())
    }

    /// Pass 3: entries whose lead is gone, assigned, re-statused or under an
    /// active claim are retired from the index.
    async fn retire_ineligible(&self) -> Result<(), StoreError> {
        for entry in self.store.list_unattended().await? {
            let retire = match self.store.get_lead(entry.lead_id).await {
                Ok(lead) => !lead.is_unattended_eligible() || lead.has_active_claim(),
                Err(StoreError::LeadNotFound(_)) => true,
                Err(err) => return Err(err),
            };
            if retire {
                self.store.delete_unattended(entry.lead_id).await?;
                counter!("reconciler_index_retired_total").increment(1);
            }
        }
        Ok(())
    }
}
