use crm_common::model::Dealership;
use crm_common::store::Store;

use crate::api::IntakeError;

/// Resolve a vendor's free-text name to a dealership record.
///
/// The match is on the trimmed name, case-insensitively. Zero matches is
/// rejected with the full directory as a diagnostic aid for integration
/// onboarding; more than one match is rejected as ambiguous rather than
/// picking an arbitrary row.
pub async fn resolve(store: &dyn Store, vendor_name: &str) -> Result<Dealership, IntakeError> {
    let wanted = vendor_name.trim().to_lowercase();
    let dealerships = store.list_dealerships().await?;

    let mut matches = dealerships
        .iter()
        .filter(|d| d.name.trim().to_lowercase() == wanted)
        .cloned();

    match (matches.next(), matches.next()) {
        (Some(dealership), None) => Ok(dealership),
        (Some(_), Some(_)) => Err(IntakeError::AmbiguousDealership(
            vendor_name.trim().to_owned(),
        )),
        (None, _) => Err(IntakeError::DealershipNotFound {
            name: vendor_name.trim().to_owned(),
            known: dealerships.into_iter().map(|d| d.name).collect(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crm_common::store::MemoryStore;
    use uuid::Uuid;

    #[tokio::test]
    async fn matching_is_case_insensitive() {
        let store = MemoryStore::new();
        let stored = store.add_dealership("Acemotors", Uuid::now_v7());

        let found = resolve(&store, "AceMotors").await.unwrap();
        assert_eq!(found.id, stored.id);
    }

    #[tokio::test]
    async fn vendor_name_is_trimmed_before_matching() {
        let store = MemoryStore::new();
        let stored = store.add_dealership("Ace Motors", Uuid::now_v7());

        let found = resolve(&store, "  ace motors \n").await.unwrap();
        assert_eq!(found.id, stored.id);
    }

    #[tokio::test]
    async fn unknown_vendor_carries_the_directory() {
        let store = MemoryStore::new();
        store.add_dealership("Ace Motors", Uuid::now_v7());
        store.add_dealership("Smith & Sons", Uuid::now_v7());

        match resolve(&store, "Nope Autos").await {
            Err(IntakeError::DealershipNotFound { name, known }) => {
                assert_eq!(name, "Nope Autos");
                assert_eq!(known.len(), 2);
                assert!(known.contains(&"Ace Motors".to_string()));
                assert!(known.contains(&"Smith & Sons".to_string()));
            }
            other => panic!("expected DealershipNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn duplicate_names_are_rejected_as_ambiguous() {
        let store = MemoryStore::new();
        store.add_dealership("Ace Motors", Uuid::now_v7());
        store.add_dealership("ACE MOTORS", Uuid::now_v7());

        assert!(matches!(
            resolve(&store, "ace motors").await,
            Err(IntakeError::AmbiguousDealership(_))
        ));
    }
}
