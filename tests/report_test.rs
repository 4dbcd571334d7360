use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use slot_ledger::core::Mailer;
use slot_ledger::{
    AvailabilityStore, Booking, Facility, MemoryStore, ReportJob, ReportMessage, Result, Slot,
};

/// Collects outgoing messages instead of sending them.
#[derive(Clone, Default)]
struct CaptureMailer {
    sent: Arc<Mutex<Vec<ReportMessage>>>,
}

impl CaptureMailer {
    fn messages(&self) -> Vec<ReportMessage> {
        self.sent.lock().unwrap().clone()
    }
}

impl Mailer for CaptureMailer {
    async fn send(&self, message: &ReportMessage) -> Result<()> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

fn facility(id: &str, bookable: bool, representative: &str) -> Facility {
    Facility {
        facility_id: id.to_string(),
        name: format!("Palestra {}", id),
        category: "palestra".to_string(),
        opening_time_desc: String::new(),
        website: String::new(),
        street: String::new(),
        street_number: String::new(),
        building: String::new(),
        city: String::new(),
        province: String::new(),
        istat_code: String::new(),
        phone: String::new(),
        representative: representative.to_string(),
        lat: String::new(),
        lon: String::new(),
        searchable: true,
        bookable,
    }
}

fn ts(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}

fn slot(facility_id: &str, start: DateTime<Utc>, allowed: u32, available: u32) -> Slot {
    Slot::new(
        facility_id.to_string(),
        start,
        60,
        allowed,
        available,
        ts(2024, 1, 1, 4, 0),
    )
    .unwrap()
}

fn booking(facility_id: &str, start: DateTime<Utc>, code: &str) -> Booking {
    Booking {
        facility_id: facility_id.to_string(),
        start,
        secret_code: code.to_string(),
    }
}

#[tokio::test]
async fn test_end_to_end_occupancy_report() {
    let store = MemoryStore::new();
    store
        .put_facility(&facility("1", true, "rep@example.com"))
        .await
        .unwrap();
    store
        .batch_put_slots(&[slot("1", ts(2024, 1, 1, 10, 0), 10, 7)])
        .await
        .unwrap();
    // the booking does not share the slot's start time; containment matches it
    store.put_booking(&booking("1", ts(2024, 1, 1, 10, 15), "ABC123"));

    let mailer = CaptureMailer::default();
    let summary = ReportJob::new(store, mailer.clone())
        .run(ts(2024, 1, 1, 10, 0))
        .await
        .unwrap();

    assert_eq!(summary.emails_sent, 1);
    let messages = mailer.messages();
    assert_eq!(messages.len(), 1);

    let message = &messages[0];
    assert_eq!(message.to, "rep@example.com");
    assert_eq!(message.subject, "Report slots palestra digitale Palestra 1");
    // occupied = allowedPeople - availablePlaces = 3
    assert!(message
        .text_body
        .contains("Posti disponibili: 7, Posti prenotati: 3"));
    assert!(message.text_body.contains("ABC123"));
}

#[tokio::test]
async fn test_booking_at_slot_end_is_not_reported() {
    let store = MemoryStore::new();
    store
        .put_facility(&facility("1", true, "rep@example.com"))
        .await
        .unwrap();
    store
        .batch_put_slots(&[slot("1", ts(2024, 1, 1, 10, 0), 10, 9)])
        .await
        .unwrap();
    // exactly at start + duration: half-open span excludes it
    store.put_booking(&booking("1", ts(2024, 1, 1, 11, 0), "EDGE01"));

    let mailer = CaptureMailer::default();
    ReportJob::new(store, mailer.clone())
        .run(ts(2024, 1, 1, 10, 0))
        .await
        .unwrap();

    let messages = mailer.messages();
    assert_eq!(messages.len(), 1);
    assert!(!messages[0].text_body.contains("EDGE01"));
}

#[tokio::test]
async fn test_fully_available_slot_reports_no_bookings() {
    let store = MemoryStore::new();
    store
        .put_facility(&facility("1", true, "rep@example.com"))
        .await
        .unwrap();
    store
        .batch_put_slots(&[slot("1", ts(2024, 1, 1, 10, 0), 10, 10)])
        .await
        .unwrap();
    // stray booking row left behind by a cancellation path that only
    // restored capacity; capacity wins
    store.put_booking(&booking("1", ts(2024, 1, 1, 10, 15), "STALE1"));

    let mailer = CaptureMailer::default();
    ReportJob::new(store, mailer.clone())
        .run(ts(2024, 1, 1, 10, 0))
        .await
        .unwrap();

    let messages = mailer.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].text_body.contains("Nessuna prenotazione"));
    assert!(!messages[0].text_body.contains("STALE1"));
}

#[tokio::test]
async fn test_non_bookable_and_contactless_facilities_are_skipped() {
    let store = MemoryStore::new();
    store
        .put_facility(&facility("1", false, "rep@example.com"))
        .await
        .unwrap();
    store
        .put_facility(&facility("2", true, ""))
        .await
        .unwrap();
    for id in ["1", "2"] {
        store
            .batch_put_slots(&[slot(id, ts(2024, 1, 1, 10, 0), 10, 5)])
            .await
            .unwrap();
    }

    let mailer = CaptureMailer::default();
    let summary = ReportJob::new(store, mailer.clone())
        .run(ts(2024, 1, 1, 10, 0))
        .await
        .unwrap();

    assert_eq!(summary.emails_sent, 0);
    assert!(mailer.messages().is_empty());
}

#[tokio::test]
async fn test_facility_with_no_overlapping_slots_is_skipped() {
    let store = MemoryStore::new();
    store
        .put_facility(&facility("1", true, "rep@example.com"))
        .await
        .unwrap();
    // finished well before the report window
    store
        .batch_put_slots(&[slot("1", ts(2024, 1, 1, 6, 0), 10, 5)])
        .await
        .unwrap();

    let mailer = CaptureMailer::default();
    let summary = ReportJob::new(store, mailer.clone())
        .run(ts(2024, 1, 1, 10, 0))
        .await
        .unwrap();

    assert_eq!(summary.emails_sent, 0);
}

#[tokio::test]
async fn test_report_covers_until_tomorrow_midnight() {
    let store = MemoryStore::new();
    store
        .put_facility(&facility("1", true, "rep@example.com"))
        .await
        .unwrap();
    store
        .batch_put_slots(&[
            // in progress at 10:00, fetched through the one-hour look-back
            slot("1", ts(2024, 1, 1, 9, 30), 10, 5),
            // tonight
            slot("1", ts(2024, 1, 1, 23, 0), 10, 5),
            // tomorrow: outside the window
            slot("1", ts(2024, 1, 2, 8, 0), 10, 5),
        ])
        .await
        .unwrap();

    let mailer = CaptureMailer::default();
    // 10:42 truncates to a 10:00 reference time
    ReportJob::new(store, mailer.clone())
        .run(ts(2024, 1, 1, 10, 42))
        .await
        .unwrap();

    let messages = mailer.messages();
    assert_eq!(messages.len(), 1);
    let body = &messages[0].text_body;
    // 9:30/23:00 UTC render as 10:30/00:00 Europe/Rome local time
    assert!(body.contains("Slot delle 10:30"));
    assert!(body.contains("Slot delle 00:00"));
    assert_eq!(body.matches("Slot delle").count(), 2);
}
