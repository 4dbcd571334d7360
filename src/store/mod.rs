//! Abstraction over the single key-value table holding facilities, slots and
//! bookings. All writes are idempotent last-write-wins puts; oversized
//! batches are split, never dropped.

pub mod memory;

#[cfg(feature = "lambda")]
pub mod dynamo;

use crate::domain::model::{Booking, Facility, Slot};
use crate::utils::error::Result;

/// Largest sub-batch a single batched write may carry. DynamoDB's
/// `BatchWriteItem` rejects more than 25 items per request; the in-memory
/// store honors the same ceiling so batching behavior is observable in tests.
pub const MAX_BATCH_PUT: usize = 25;

/// A decoded table row. The sort-key tag selects the variant.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredRecord {
    Facility(Facility),
    Slot(Slot),
    Booking(Booking),
}

pub trait AvailabilityStore: Send + Sync {
    /// Full-record facility write. Sets both visibility flags to whatever the
    /// record carries; this is the only path that re-enables a soft-deleted
    /// facility.
    fn put_facility(&self, facility: &Facility)
        -> impl std::future::Future<Output = Result<()>> + Send;

    fn batch_put_facilities(
        &self,
        facilities: &[Facility],
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    fn batch_put_slots(&self, slots: &[Slot])
        -> impl std::future::Future<Output = Result<()>> + Send;

    /// Ordered scan of one facility's rows with sort keys in
    /// `[sk_low, sk_high]` (inclusive bounds).
    fn query_range(
        &self,
        facility_id: &str,
        sk_low: &str,
        sk_high: &str,
    ) -> impl std::future::Future<Output = Result<Vec<StoredRecord>>> + Send;

    /// Enumerates every facility via the entity-type index. Eventually
    /// consistent reads are acceptable here; callers treat rows that lag
    /// recent writes conservatively.
    fn query_facilities(&self) -> impl std::future::Future<Output = Result<Vec<Facility>>> + Send;

    /// Forces both visibility flags false, leaving every other attribute
    /// untouched. Idempotent.
    fn soft_delete_facility(
        &self,
        facility_id: &str,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}
