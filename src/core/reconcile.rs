//! Soft-deletes facilities that disappeared from the directory feed.
//!
//! One-directional: reconciliation only ever turns visibility off. A
//! facility that re-appears in a later feed is re-enabled by the full-record
//! import write, never here.

use std::collections::HashSet;

use crate::store::AvailabilityStore;
use crate::utils::error::Result;

/// Diffs the store's visible facilities against the identifiers written by
/// the current import cycle and soft-deletes the ones the feed no longer
/// carries. Returns the number of facilities soft-deleted.
///
/// The facility enumeration may lag recent writes (eventually consistent
/// index); a facility missing from the read is simply not touched, which is
/// the conservative outcome.
pub async fn reconcile_facilities<S: AvailabilityStore>(
    store: &S,
    seen_ids: &HashSet<String>,
) -> Result<usize> {
    let mut soft_deleted = 0;

    for facility in store.query_facilities().await? {
        if facility.is_visible() && !seen_ids.contains(&facility.facility_id) {
            tracing::info!(
                "Facility {} ({}) missing from feed, soft deleting",
                facility.facility_id,
                facility.name
            );
            store.soft_delete_facility(&facility.facility_id).await?;
            soft_deleted += 1;
        }
    }

    Ok(soft_deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Facility;
    use crate::store::memory::MemoryStore;

    fn facility(id: &str, visible: bool) -> Facility {
        Facility {
            facility_id: id.to_string(),
            name: format!("Palestra {}", id),
            category: String::new(),
            opening_time_desc: String::new(),
            website: String::new(),
            street: String::new(),
            street_number: String::new(),
            building: String::new(),
            city: String::new(),
            province: String::new(),
            istat_code: String::new(),
            phone: String::new(),
            representative: String::new(),
            lat: String::new(),
            lon: String::new(),
            searchable: visible,
            bookable: visible,
        }
    }

    async fn visible_ids(store: &MemoryStore) -> Vec<String> {
        let mut ids: Vec<String> = store
            .query_facilities()
            .await
            .unwrap()
            .into_iter()
            .filter(|f| f.is_visible())
            .map(|f| f.facility_id)
            .collect();
        ids.sort();
        ids
    }

    #[tokio::test]
    async fn test_exactly_the_missing_facility_is_soft_deleted() {
        let store = MemoryStore::new();
        for id in ["A", "B", "C"] {
            store.put_facility(&facility(id, true)).await.unwrap();
        }

        let seen: HashSet<String> = ["A", "C"].iter().map(|s| s.to_string()).collect();
        let soft_deleted = reconcile_facilities(&store, &seen).await.unwrap();

        assert_eq!(soft_deleted, 1);
        assert_eq!(visible_ids(&store).await, vec!["A", "C"]);
    }

    #[tokio::test]
    async fn test_already_hidden_facilities_are_left_alone() {
        let store = MemoryStore::new();
        store.put_facility(&facility("A", true)).await.unwrap();
        store.put_facility(&facility("B", false)).await.unwrap();

        let seen: HashSet<String> = ["A".to_string()].into_iter().collect();
        let soft_deleted = reconcile_facilities(&store, &seen).await.unwrap();

        // B was invisible before the cycle; nothing to do, nothing counted
        assert_eq!(soft_deleted, 0);
    }

    #[tokio::test]
    async fn test_reconcile_is_idempotent() {
        let store = MemoryStore::new();
        store.put_facility(&facility("A", true)).await.unwrap();
        store.put_facility(&facility("B", true)).await.unwrap();

        let seen: HashSet<String> = ["A".to_string()].into_iter().collect();
        assert_eq!(reconcile_facilities(&store, &seen).await.unwrap(), 1);
        assert_eq!(reconcile_facilities(&store, &seen).await.unwrap(), 0);
        assert_eq!(visible_ids(&store).await, vec!["A"]);
    }
}
