use metrics::counter;
use thiserror::Error;

use crm_common::model::Contact;
use crm_common::store::{Store, StoreError};

#[derive(Error, Debug)]
pub enum MergeError {
    #[error("primary and duplicate are the same contact")]
    SameContact,
    #[error("primary update failed: {0}")]
    PrimaryUpdate(StoreError),
    /// The primary holds all merged data at this point; at worst the
    /// duplicate briefly stays visible until the merge is retried.
    #[error("duplicate tombstone failed after primary was merged: {0}")]
    Tombstone(StoreError),
}

/// Field-by-field combination of two contacts, primary wins unless null.
/// Pure; no store access.
pub fn merged_contact(primary: &Contact, duplicate: &Contact) -> Contact {
    let mut merged = primary.clone();

    if merged.primary_email.is_none() {
        merged.primary_email = duplicate.primary_email.clone();
    }
    if merged.mobile_phone.is_none() {
        merged.mobile_phone = duplicate.mobile_phone.clone();
    }

    // the duplicate's primary address folds into the winner's secondary set
    // so it stays searchable after it stops being anyone's primary
    for email in duplicate
        .primary_email
        .iter()
        .chain(duplicate.secondary_email.iter())
    {
        if !merged.secondary_email.contains(email) {
            merged.secondary_email.push(email.clone());
        }
    }

    // both sides' visit history is real and additive
    merged.total_visits = primary.total_visits + duplicate.total_visits;

    // no lead reference may be dropped by a merge
    for lead in &duplicate.leads {
        if !merged.leads.contains(lead) {
            merged.leads.push(*lead);
        }
    }

    merged
}

/// Combine `duplicate` into `primary` and tombstone the duplicate.
///
/// The two writes are not transactional. The primary goes first: if the
/// duplicate were tombstoned first and the primary update then failed, a
/// contact would be hidden without its data having been preserved anywhere.
pub async fn merge_contacts(
    store: &dyn Store,
    primary: &Contact,
    duplicate: &Contact,
) -> Result<Contact, MergeError> {
    if primary.id == duplicate.id {
        return Err(MergeError::SameContact);
    }

    let merged = merged_contact(primary, duplicate);
    store
        .update_contact(&merged)
        .await
        .map_err(MergeError::PrimaryUpdate)?;

    let mut tombstone = duplicate.clone();
    tombstone.merged_into = Some(primary.id);
    store
        .update_contact(&tombstone)
        .await
        .map_err(MergeError::Tombstone)?;

    counter!("contacts_merged_total").increment(1);
    tracing::info!(
        primary_id = %primary.id,
        duplicate_id = %duplicate.id,
        "merged duplicate contact"
    );

    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn contact() -> Contact {
        Contact {
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
        }
    }

    #[test]
    fn unions_secondary_emails_and_leads_without_loss() {
        let lead_1 = Uuid::now_v7();
        let lead_2 = Uuid::now_v7();
        let lead_3 = Uuid::now_v7();

        let mut primary = contact();
        primary.secondary_email = vec!["x@example.com".to_string()];
        primary.leads = vec![lead_1, lead_2];

        let mut duplicate = contact();
        duplicate.primary_email = Some("y@example.com".to_string());
        duplicate.leads = vec![lead_2, lead_3];

        let merged = merged_contact(&primary, &duplicate);

        assert!(merged
            .secondary_email
            .contains(&"x@example.com".to_string()));
        assert!(merged
            .secondary_email
            .contains(&"y@example.com".to_string()));
        assert_eq!(merged.leads, vec![lead_1, lead_2, lead_3]);
    }

    #[test]
    fn primary_wins_unless_null() {
        let mut primary = contact();
        primary.primary_email = Some("keep@example.com".to_string());
        primary.mobile_phone = None;

        let mut duplicate = contact();
        duplicate.primary_email = Some("lose@example.com".to_string());
        duplicate.mobile_phone = Some("555-0100".to_string());

        let merged = merged_contact(&primary, &duplicate);

        assert_eq!(merged.primary_email.as_deref(), Some("keep@example.com"));
        assert_eq!(merged.mobile_phone.as_deref(), Some("555-0100"));
    }

    #[test]
    fn duplicate_primary_email_is_not_doubled_into_secondary() {
        let mut primary = contact();
        primary.secondary_email = vec!["y@example.com".to_string()];

        let mut duplicate = contact();
        duplicate.primary_email = Some("y@example.com".to_string());
        duplicate.secondary_email = vec!["y@example.com".to_string()];

        let merged = merged_contact(&primary, &duplicate);

        assert_eq!(merged.secondary_email, vec!["y@example.com".to_string()]);
    }

    #[test]
    fn visit_totals_are_summed_and_other_fields_untouched() {
        let mut primary = contact();
        primary.first_name = Some("Jane".to_string());
        primary.total_visits = 3;

        let mut duplicate = contact();
        duplicate.first_name = Some("Janet".to_string());
        duplicate.notes = Some("duplicate's notes".to_string());
        duplicate.total_visits = 2;

        let merged = merged_contact(&primary, &duplicate);

        assert_eq!(merged.total_visits, 5);
        // not part of the merge contract, left for an explicit
        // field-by-field reconciliation pass
        assert_eq!(merged.first_name.as_deref(), Some("Jane"));
        assert_eq!(merged.notes, None);
    }
}
