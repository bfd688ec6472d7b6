use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::model::{Contact, Dealership, Lead, NewContact, NewLead, UnattendedLead};
use crate::store::{Store, StoreError, StoreResult};

/// In-memory store backend. Used as the dev backend (`MEMORY_STORE=true`)
/// and by tests that exercise the pipelines without a database.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Default)]
struct Inner {
    contacts: HashMap<Uuid, Contact>,
    leads: HashMap<Uuid, Lead>,
    unattended: HashMap<Uuid, UnattendedLead>,
    dealerships: Vec<Dealership>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_dealership(&self, name: &str, dealergroup_id: Uuid) -> Dealership {
        let dealership = Dealership {
            id: Uuid::now_v7(),
            name: name.to_string(),
            dealergroup_id,
        };
        self.inner
            .write()
            .unwrap()
            .dealerships
            .push(dealership.clone());
        dealership
    }

    pub fn contact_count(&self) -> usize {
        self.inner.read().unwrap().contacts.len()
    }

    pub fn lead_count(&self) -> usize {
        self.inner.read().unwrap().leads.len()
    }

    /// Directly place a lead row, for tests that need arbitrary prior state.
    pub fn put_lead(&self, lead: Lead) {
        self.inner.write().unwrap().leads.insert(lead.id, lead);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_dealerships(&self) -> StoreResult<Vec<Dealership>> {
        Ok(self.inner.read().unwrap().dealerships.clone())
    }

    async fn insert_contact(&self, new: NewContact) -> StoreResult<Contact> {
        let contact = Contact {
            id: Uuid::now_v7(),
            first_name: new.first_name,
            last_name: new.last_name,
            primary_email: new.primary_email,
            secondary_email: new.secondary_email,
            mobile_phone: new.mobile_phone,
            home_phone: new.home_phone,
            work_phone: new.work_phone,
            street: new.street,
            city: new.city,
            region: new.region,
            postal_code: new.postal_code,
            notes: new.notes,
            total_visits: 0,
            leads: Vec::new(),
            dealership_id: new.dealership_id,
            dealergroup_id: new.dealergroup_id,
            merged_into: None,
            created_at: Utc::now(),
        };
        self.inner
            .write()
            .unwrap()
            .contacts
            .insert(contact.id, contact.clone());
        Ok(contact)
    }

    async fn get_contact(&self, id: Uuid) -> StoreResult<Contact> {
        self.inner
            .read()
            .unwrap()
            .contacts
            .get(&id)
            .cloned()
            .ok_or(StoreError::ContactNotFound(id))
    }

    async fn update_contact(&self, contact: &Contact) -> StoreResult<()> {
        let mut inner = self.inner.write().unwrap();
        if !inner.contacts.contains_key(&contact.id) {
            return Err(StoreError::ContactNotFound(contact.id));
        }
        inner.contacts.insert(contact.id, contact.clone());
        Ok(())
    }

    async fn insert_lead(&self, new: NewLead) -> StoreResult<Lead> {
        let lead = Lead {
            id: Uuid::now_v7(),
            contact_id: new.contact_id,
            dealership_id: new.dealership_id,
            dealergroup_id: new.dealergroup_id,
            status: new.status,
            source: new.source,
            assigned_to: None,
            claimed_by: None,
            claimed_at: None,
            vehicle_year: new.vehicle_year,
            vehicle_make: new.vehicle_make,
            vehicle_model: new.vehicle_model,
            vehicle_trim: new.vehicle_trim,
            comments: new.comments,
            created_at: Utc::now(),
        };
        self.inner
            .write()
            .unwrap()
            .leads
            .insert(lead.id, lead.clone());
        Ok(lead)
    }

    async fn get_lead(&self, id: Uuid) -> StoreResult<Lead> {
        self.inner
            .read()
            .unwrap()
            .leads
            .get(&id)
            .cloned()
            .ok_or(StoreError::LeadNotFound(id))
    }

    async fn clear_lead_claim(&self, lead_id: Uuid) -> StoreResult<()> {
        let mut inner = self.inner.write().unwrap();
        let lead = inner
            .leads
            .get_mut(&lead_id)
            .ok_or(StoreError::LeadNotFound(lead_id))?;
        lead.claimed_by = None;
        lead.claimed_at = None;
        Ok(())
    }

    async fn unattended_eligible_leads(&self) -> StoreResult<Vec<Lead>> {
        let inner = self.inner.read().unwrap();
        let mut leads: Vec<Lead> = inner
            .leads
            .values()
            .filter(|l| l.is_unattended_eligible())
            .cloned()
            .collect();
        leads.sort_by_key(|l| (l.created_at, l.id));
        Ok(leads)
    }

    async fn expired_claim_leads(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<Lead>> {
        let inner = self.inner.read().unwrap();
        let mut leads: Vec<Lead> = inner
            .leads
            .values()
            .filter(|l| {
                l.is_unattended_eligible()
                    && l.claimed_by.is_some()
                    && l.claimed_at.is_some_and(|at| at < cutoff)
            })
            .cloned()
            .collect();
        leads.sort_by_key(|l| (l.created_at, l.id));
        Ok(leads)
    }

    async fn list_unattended(&self) -> StoreResult<Vec<UnattendedLead>> {
        let inner = self.inner.read().unwrap();
        let mut entries: Vec<UnattendedLead> = inner.unattended.values().cloned().collect();
        entries.sort_by_key(|e| (e.created_at, e.lead_id));
        Ok(entries)
    }

    async fn unattended_exists(&self, lead_id: Uuid) -> StoreResult<bool> {
        Ok(self.inner.read().unwrap().unattended.contains_key(&lead_id))
    }

    async fn insert_unattended(&self, entry: UnattendedLead) -> StoreResult<()> {
        let mut inner = self.inner.write().unwrap();
        // keyed on lead_id, so a concurrent duplicate insert is a no-op
        inner.unattended.entry(entry.lead_id).or_insert(entry);
        Ok(())
    }

    async fn delete_unattended(&self, lead_id: Uuid) -> StoreResult<()> {
        self.inner.write().unwrap().unattended.remove(&lead_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UNATTENDED_STATUS;

    fn new_lead(contact_id: Uuid, dealership_id: Uuid) -> NewLead {
        NewLead {
            contact_id,
            dealership_id,
            dealergroup_id: None,
            status: UNATTENDED_STATUS.to_string(),
            source: None,
            vehicle_year: None,
            vehicle_make: None,
            vehicle_model: None,
            vehicle_trim: None,
            comments: None,
        }
    }

    #[tokio::test]
    async fn unattended_insert_is_idempotent_on_lead_id() {
        let store = MemoryStore::new();
        let lead_id = Uuid::now_v7();
        let entry = UnattendedLead {
            lead_id,
            created_at: Utc::now(),
            claimed_by: None,
            claimed_at: None,
        };

        store.insert_unattended(entry.clone()).await.unwrap();
        store.insert_unattended(entry).await.unwrap();

        assert_eq!(store.list_unattended().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_unattended_tolerates_absent_entry() {
        let store = MemoryStore::new();
        store.delete_unattended(Uuid::now_v7()).await.unwrap();
    }

    #[tokio::test]
    async fn eligible_leads_excludes_assigned_and_non_sentinel() {
        let store = MemoryStore::new();
        let dealership = store.add_dealership("Ace Motors", Uuid::now_v7());
        let contact = store.insert_contact(NewContact::default()).await.unwrap();

        let eligible = store
            .insert_lead(new_lead(contact.id, dealership.id))
            .await
            .unwrap();
        let mut assigned = store
            .insert_lead(new_lead(contact.id, dealership.id))
            .await
            .unwrap();
        assigned.assigned_to = Some("alice".to_string());
        store.put_lead(assigned);
        let mut working = store
            .insert_lead(new_lead(contact.id, dealership.id))
            .await
            .unwrap();
        working.status = "working".to_string();
        store.put_lead(working);

        let found = store.unattended_eligible_leads().await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, eligible.id);
    }

    #[tokio::test]
    async fn updating_missing_contact_reports_not_found() {
        let store = MemoryStore::new();
        let contact = Contact {
            id: Uuid::now_v7(),
            first_name: None,
            last_name: None,
            primary_email: None,
            secondary_email: vec![],
            mobile_phone: None,
            home_phone: None,
            work_phone: None,
            street: None,
            city: None,
            region: None,
            postal_code: None,
            notes: None,
            total_visits: 0,
            leads: vec![],
            dealership_id: None,
            dealergroup_id: None,
            merged_into: None,
            created_at: Utc::now(),
        };
        match store.update_contact(&contact).await {
            Err(StoreError::ContactNotFound(id)) => assert_eq!(id, contact.id),
            other => panic!("expected ContactNotFound, got {:?}", other.err()),
        }
    }
}
