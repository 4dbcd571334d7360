use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{Arc, RwLock};

use crate::core::keys;
use crate::domain::model::{Booking, Facility, Slot};
use crate::store::{AvailabilityStore, StoredRecord, MAX_BATCH_PUT};
use crate::utils::error::{LedgerError, Result};

/// Ordered in-memory table. Rows are keyed by `(pk, sk)`, so a range over the
/// map is exactly the lexicographic sort-key scan the key scheme relies on.
/// Clones share the same underlying table, mirroring a shared client handle.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    rows: Arc<RwLock<BTreeMap<(String, String), StoredRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row_count(&self) -> usize {
        self.rows.read().expect("store lock poisoned").len()
    }

    /// Bookings are written by the reservation API, not by this crate, so the
    /// write sits outside [`AvailabilityStore`]. Tests and local fixtures use
    /// it to seed booking rows.
    pub fn put_booking(&self, booking: &Booking) {
        let pk = keys::facility_pk(&booking.facility_id);
        let sk = keys::booking_sk(booking.start, &booking.secret_code);
        self.rows
            .write()
            .expect("store lock poisoned")
            .insert((pk, sk), StoredRecord::Booking(booking.clone()));
    }

    fn put_facility_row(&self, facility: &Facility) {
        let pk = keys::facility_pk(&facility.facility_id);
        self.rows.write().expect("store lock poisoned").insert(
            (pk, keys::FACILITY_INFO_SK.to_string()),
            StoredRecord::Facility(facility.clone()),
        );
    }

    fn put_slot_row(&self, slot: &Slot) {
        let pk = keys::facility_pk(&slot.facility_id);
        let sk = keys::slot_sk(slot.start, slot.duration_minutes);
        self.rows
            .write()
            .expect("store lock poisoned")
            .insert((pk, sk), StoredRecord::Slot(slot.clone()));
    }
}

impl AvailabilityStore for MemoryStore {
    async fn put_facility(&self, facility: &Facility) -> Result<()> {
        self.put_facility_row(facility);
        Ok(())
    }

    async fn batch_put_facilities(&self, facilities: &[Facility]) -> Result<()> {
        for chunk in facilities.chunks(MAX_BATCH_PUT) {
            for facility in chunk {
                self.put_facility_row(facility);
            }
        }
        Ok(())
    }

    async fn batch_put_slots(&self, slots: &[Slot]) -> Result<()> {
        for chunk in slots.chunks(MAX_BATCH_PUT) {
            for slot in chunk {
                self.put_slot_row(slot);
            }
        }
        Ok(())
    }

    async fn query_range(
        &self,
        facility_id: &str,
        sk_low: &str,
        sk_high: &str,
    ) -> Result<Vec<StoredRecord>> {
        let pk = keys::facility_pk(facility_id);
        let low = (pk.clone(), sk_low.to_string());
        let high = (pk, sk_high.to_string());
        let rows = self.rows.read().expect("store lock poisoned");
        Ok(rows
            .range((Bound::Included(low), Bound::Included(high)))
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn query_facilities(&self) -> Result<Vec<Facility>> {
        let rows = self.rows.read().expect("store lock poisoned");
        Ok(rows
            .values()
            .filter_map(|record| match record {
                StoredRecord::Facility(f) => Some(f.clone()),
                _ => None,
            })
            .collect())
    }

    async fn soft_delete_facility(&self, facility_id: &str) -> Result<()> {
        let key = (
            keys::facility_pk(facility_id),
            keys::FACILITY_INFO_SK.to_string(),
        );
        let mut rows = self.rows.write().expect("store lock poisoned");
        match rows.get_mut(&key) {
            Some(StoredRecord::Facility(facility)) => {
                facility.searchable = false;
                facility.bookable = false;
                Ok(())
            }
            _ => Err(LedgerError::StoreError {
                message: format!("no facility record for {}", facility_id),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn facility(id: &str) -> Facility {
        Facility {
            facility_id: id.to_string(),
            name: format!("Palestra {}", id),
            category: "palestra".to_string(),
            opening_time_desc: "8-20".to_string(),
            website: String::new(),
            street: "Via Roma".to_string(),
            street_number: "1".to_string(),
            building: String::new(),
            city: "Venezia".to_string(),
            province: "VE".to_string(),
            istat_code: "027042".to_string(),
            phone: "0415551234".to_string(),
            representative: "rep@example.com".to_string(),
            lat: "45.44".to_string(),
            lon: "12.33".to_string(),
            searchable: true,
            bookable: true,
        }
    }

    fn slot(id: &str, hour: u32, duration: u32) -> Slot {
        Slot::new(
            id.to_string(),
            Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap(),
            duration,
            10,
            10,
            Utc.with_ymd_and_hms(2024, 1, 1, 4, 0, 0).unwrap(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_put_is_idempotent() {
        let store = MemoryStore::new();
        let f = facility("1");
        store.put_facility(&f).await.unwrap();
        store.put_facility(&f).await.unwrap();
        assert_eq!(store.row_count(), 1);
        assert_eq!(store.query_facilities().await.unwrap(), vec![f]);
    }

    #[tokio::test]
    async fn test_batch_put_splits_oversized_batches() {
        let store = MemoryStore::new();
        let slots: Vec<Slot> = (0..(MAX_BATCH_PUT as u32 * 2 + 3))
            .map(|i| slot("1", i % 24, 30 + i))
            .collect();
        store.batch_put_slots(&slots).await.unwrap();
        // distinct (start, duration) pairs, so every row survives
        assert_eq!(store.row_count(), slots.len());
    }

    #[tokio::test]
    async fn test_query_range_is_ordered_and_inclusive() {
        let store = MemoryStore::new();
        store
            .batch_put_slots(&[slot("1", 12, 60), slot("1", 10, 60), slot("1", 14, 60)])
            .await
            .unwrap();
        // another facility's rows must not leak into the scan
        store.batch_put_slots(&[slot("2", 11, 60)]).await.unwrap();

        let records = store
            .query_range("1", "s-2024-01-01T10:00:00Z", "s-2024-01-01T12:00:00Z~99")
            .await
            .unwrap();
        let starts: Vec<u32> = records
            .iter()
            .map(|r| match r {
                StoredRecord::Slot(s) => s.start.format("%H").to_string().parse().unwrap(),
                _ => panic!("expected slot"),
            })
            .collect();
        assert_eq!(starts, vec![10, 12]);
    }

    #[tokio::test]
    async fn test_soft_delete_only_touches_flags() {
        let store = MemoryStore::new();
        store.put_facility(&facility("1")).await.unwrap();
        store.soft_delete_facility("1").await.unwrap();

        let stored = &store.query_facilities().await.unwrap()[0];
        assert!(!stored.searchable);
        assert!(!stored.bookable);
        assert_eq!(stored.name, "Palestra 1");
        assert_eq!(stored.representative, "rep@example.com");

        // a later full-record write re-enables the facility
        store.put_facility(&facility("1")).await.unwrap();
        assert!(store.query_facilities().await.unwrap()[0].bookable);
    }

    #[tokio::test]
    async fn test_soft_delete_missing_facility_is_an_error() {
        let store = MemoryStore::new();
        assert!(store.soft_delete_facility("404").await.is_err());
    }
}
