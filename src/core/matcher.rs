//! Pairs bookings to their owning slots and derives per-slot occupancy.
//!
//! A booking's timestamp is not guaranteed to equal its slot's start, so
//! attribution is by half-open span containment. When deliberately
//! overlapping slots both contain a booking, the earliest-start slot wins;
//! valid feeds never overlap, the tie-break just makes bad input
//! deterministic.

use chrono::{DateTime, Duration, Timelike, Utc};

use crate::core::keys;
use crate::domain::model::{Booking, Slot};
use crate::store::{AvailabilityStore, StoredRecord};
use crate::utils::error::Result;

/// Time window a match runs over. `fetch_from` extends below `now` so slots
/// already in progress are still fetched; only slots ending after `now` and
/// starting before `until` are reported.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchWindow {
    pub fetch_from: DateTime<Utc>,
    pub now: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

impl MatchWindow {
    /// The daily reporting window: `now` truncated to the hour, one hour of
    /// look-back for in-progress slots, up to tomorrow at 00:00 UTC.
    pub fn daily_report(now: DateTime<Utc>) -> Self {
        let now = now
            .with_minute(0)
            .and_then(|t| t.with_second(0))
            .and_then(|t| t.with_nanosecond(0))
            .expect("hour truncation cannot fail");
        let until = (now + Duration::days(1))
            .with_hour(0)
            .and_then(|t| t.with_minute(0))
            .and_then(|t| t.with_second(0))
            .and_then(|t| t.with_nanosecond(0))
            .expect("midnight truncation cannot fail");
        Self {
            fetch_from: now - Duration::hours(1),
            now,
            until,
        }
    }
}

/// One reported slot with the confirmation codes attributed to it. Occupancy
/// comes from the capacity fields, not from counting bookings.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotOccupancy {
    pub slot: Slot,
    pub codes: Vec<String>,
}

impl SlotOccupancy {
    pub fn booked_places(&self) -> u32 {
        self.slot.booked_places()
    }
}

/// Fetches one facility's slots and bookings for the window and joins them.
/// The booking range bounds are the slot range bounds with the entity tag
/// rewritten, never re-derived.
pub async fn match_facility<S: AvailabilityStore>(
    store: &S,
    facility_id: &str,
    window: &MatchWindow,
) -> Result<Vec<SlotOccupancy>> {
    let (slot_low, slot_high) =
        keys::time_scan_bounds(keys::SLOT_TAG, window.fetch_from, window.until);
    let booking_low = keys::rewrite_tag(&slot_low, keys::BOOKING_TAG)?;
    let booking_high = keys::rewrite_tag(&slot_high, keys::BOOKING_TAG)?;

    let slots: Vec<Slot> = store
        .query_range(facility_id, &slot_low, &slot_high)
        .await?
        .into_iter()
        .filter_map(|record| match record {
            StoredRecord::Slot(slot) => Some(slot),
            _ => None,
        })
        .collect();

    let bookings: Vec<Booking> = store
        .query_range(facility_id, &booking_low, &booking_high)
        .await?
        .into_iter()
        .filter_map(|record| match record {
            StoredRecord::Booking(booking) => Some(booking),
            _ => None,
        })
        .collect();

    Ok(assign_bookings(slots, &bookings, window))
}

/// Pure join of already-fetched slots and bookings.
pub fn assign_bookings(
    mut slots: Vec<Slot>,
    bookings: &[Booking],
    window: &MatchWindow,
) -> Vec<SlotOccupancy> {
    slots.sort_by_key(|slot| slot.start);

    // attribute each booking to the earliest slot containing its timestamp
    let mut codes_per_slot: Vec<Vec<String>> = vec![Vec::new(); slots.len()];
    for booking in bookings {
        match slots.iter().position(|slot| slot.span_contains(booking.start)) {
            Some(i) => codes_per_slot[i].push(booking.secret_code.clone()),
            None => tracing::debug!(
                "booking {} at {} matches no slot",
                booking.secret_code,
                booking.start
            ),
        }
    }

    slots
        .into_iter()
        .zip(codes_per_slot)
        .filter(|(slot, _)| slot.end() > window.now && slot.start < window.until)
        .map(|(slot, codes)| {
            // Capacity fields are authoritative: a fully-available slot
            // reports no bookings even when stray booking rows sit in its
            // span (cancellations may free capacity without removing rows).
            let codes = if slot.booked_places() == 0 {
                Vec::new()
            } else {
                codes
            };
            SlotOccupancy { slot, codes }
        })
        .collect()
}
