use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status every freshly ingested lead carries. A lead with this status and
/// no assignee is what the unattended index tracks.
pub const UNATTENDED_STATUS: &str = "new";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Contact {
    pub id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub primary_email: Option<String>,
    /// Additional addresses this person is reachable at. Set semantics:
    /// order-preserving, no duplicates.
    pub secondary_email: Vec<String>,
    pub mobile_phone: Option<String>,
    pub home_phone: Option<String>,
    pub work_phone: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub postal_code: Option<String>,
    pub notes: Option<String>,
    pub total_visits: i64,
    /// Every lead this contact has generated, kept current so the question
    /// "which leads belong to me" does not need a join.
    pub leads: Vec<Uuid>,
    pub dealership_id: Option<Uuid>,
    pub dealergroup_id: Option<Uuid>,
    /// Set when this contact lost a merge. The record then only exists to
    /// keep historical lead references resolvable.
    pub merged_into: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Contact {
    pub fn is_tombstone(&self) -> bool {
        self.merged_into.is_some()
    }
}

/// Insert shape for a contact; the store assigns id and created_at.
#[derive(Debug, Clone, Default)]
pub struct NewContact {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub primary_email: Option<String>,
    pub secondary_email: Vec<String>,
    pub mobile_phone: Option<String>,
    pub home_phone: Option<String>,
    pub work_phone: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub postal_code: Option<String>,
    pub notes: Option<String>,
    pub dealership_id: Option<Uuid>,
    pub dealergroup_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Lead {
    pub id: Uuid,
    pub contact_id: Uuid,
    pub dealership_id: Uuid,
    pub dealergroup_id: Option<Uuid>,
    pub status: String,
    pub source: Option<String>,
    pub assigned_to: Option<String>,
    pub claimed_by: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub vehicle_year: Option<String>,
    pub vehicle_make: Option<String>,
    pub vehicle_model: Option<String>,
    pub vehicle_trim: Option<String>,
    pub comments: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Lead {
    /// A lead needs human attention while it still has the ingestion status
    /// and nobody has been assigned to it.
    pub fn is_unattended_eligible(&self) -> bool {
        self.status == UNATTENDED_STATUS && self.assigned_to.is_none()
    }

    /// A claim reserves the lead for one staff member until it is released
    /// or expires.
    pub fn has_active_claim(&self) -> bool {
        self.claimed_by.is_some()
    }

    pub fn claim_expired(&self, now: DateTime<Utc>, lock_duration: Duration) -> bool {
        match self.claimed_at {
            Some(claimed_at) => now - claimed_at > lock_duration,
            None => false,
        }
    }
}

/// Insert shape for a lead; the store assigns id and created_at.
#[derive(Debug, Clone)]
pub struct NewLead {
    pub contact_id: Uuid,
    pub dealership_id: Uuid,
    pub dealergroup_id: Option<Uuid>,
    pub status: String,
    pub source: Option<String>,
    pub vehicle_year: Option<String>,
    pub vehicle_make: Option<String>,
    pub vehicle_model: Option<String>,
    pub vehicle_trim: Option<String>,
    pub comments: Option<String>,
}

/// One entry of the unattended-lead index: a materialized pointer saying
/// "this lead currently needs attention". Derived state only; the lead row
/// stays the source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UnattendedLead {
    pub lead_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub claimed_by: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Dealership {
    pub id: Uuid,
    pub name: String,
    pub dealergroup_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lead(status: &str, assigned_to: Option<&str>) -> Lead {
        Lead {
            id: Uuid::now_v7(),
            contact_id: Uuid::now_v7(),
            dealership_id: Uuid::now_v7(),
            dealergroup_id: None,
            status: status.to_string(),
            source: None,
            assigned_to: assigned_to.map(String::from),
            claimed_by: None,
            claimed_at: None,
            vehicle_year: None,
            vehicle_make: None,
            vehicle_model: None,
            vehicle_trim: None,
            comments: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn eligibility_requires_sentinel_status_and_no_assignee() {
        assert!(lead(UNATTENDED_STATUS, None).is_unattended_eligible());
        assert!(!lead(UNATTENDED_STATUS, Some("alice")).is_unattended_eligible());
        assert!(!lead("working", None).is_unattended_eligible());
    }

    #[test]
    fn claim_expiry_is_strictly_after_the_lock_window() {
        let now = Utc::now();
        let mut l = lead(UNATTENDED_STATUS, None);
        l.claimed_by = Some("alice".to_string());

        l.claimed_at = Some(now - Duration::minutes(21));
        assert!(l.claim_expired(now, Duration::minutes(20)));

        l.claimed_at = Some(now - Duration::minutes(19));
        assert!(!l.claim_expired(now, Duration::minutes(20)));

        // exactly at the boundary the claim still holds
        l.claimed_at = Some(now - Duration::minutes(20));
        assert!(!l.claim_expired(now, Duration::minutes(20)));
    }

    #[test]
    fn unclaimed_lead_never_expires() {
        let l = lead(UNATTENDED_STATUS, None);
        assert!(!l.claim_expired(Utc::now(), Duration::minutes(20)));
    }
}
