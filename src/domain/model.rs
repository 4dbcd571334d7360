use crate::utils::error::{LedgerError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One facility from the canonical directory feed. Attribute names mirror the
/// table row (`data` map) written by the import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Facility {
    pub facility_id: String,
    pub name: String,
    pub category: String,
    pub opening_time_desc: String,
    pub website: String,
    pub street: String,
    pub street_number: String,
    pub building: String,
    pub city: String,
    pub province: String,
    pub istat_code: String,
    pub phone: String,
    pub representative: String,
    pub lat: String,
    pub lon: String,
    pub searchable: bool,
    pub bookable: bool,
}

impl Facility {
    /// Visible in the directory or open for bookings. The reconciler only
    /// soft-deletes facilities that are still visible by this definition.
    pub fn is_visible(&self) -> bool {
        self.searchable || self.bookable
    }

    pub fn has_contact(&self) -> bool {
        !self.representative.trim().is_empty()
    }
}

/// One bookable time slice of a facility. Identity is
/// `(facility_id, start, duration_minutes)`: distinct durations at the same
/// start time are distinct slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub facility_id: String,
    pub start: DateTime<Utc>,
    pub duration_minutes: u32,
    pub allowed_people: u32,
    pub available_places: u32,
    pub last_update: DateTime<Utc>,
}

impl Slot {
    pub fn new(
        facility_id: String,
        start: DateTime<Utc>,
        duration_minutes: u32,
        allowed_people: u32,
        available_places: u32,
        last_update: DateTime<Utc>,
    ) -> Result<Self> {
        if available_places > allowed_people {
            return Err(LedgerError::ValidationError {
                message: format!(
                    "slot {}/{}: availablePlaces {} exceeds allowedPeople {}",
                    facility_id, start, available_places, allowed_people
                ),
            });
        }
        Ok(Self {
            facility_id,
            start,
            duration_minutes,
            allowed_people,
            available_places,
            last_update,
        })
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.start + Duration::minutes(i64::from(self.duration_minutes))
    }

    /// Half-open span check: `start <= t < start + duration`.
    pub fn span_contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t < self.end()
    }

    pub fn booked_places(&self) -> u32 {
        self.allowed_people - self.available_places
    }
}

/// A reservation row. Written by the booking API, read-only here; both
/// identity fields decode from the sort key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub facility_id: String,
    pub start: DateTime<Utc>,
    pub secret_code: String,
}

/// A feed row that could not be imported. Collected per batch, never aborts
/// the batch.
#[derive(Debug, Clone)]
pub struct RowError {
    /// 1-based data row in the feed; absent for failures past the parse
    /// phase (e.g. a rejected batch write).
    pub row: Option<usize>,
    pub id: Option<String>,
    pub reason: String,
}

impl std::fmt::Display for RowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(row) = self.row {
            write!(f, "row {}", row)?;
        } else {
            write!(f, "write")?;
        }
        if let Some(id) = &self.id {
            write!(f, " (id {})", id)?;
        }
        write!(f, ": {}", self.reason)
    }
}

/// Parsed feed content: typed records plus the rows that failed parsing or
/// validation.
#[derive(Debug)]
pub struct TransformOutcome<R> {
    pub records: Vec<R>,
    pub failures: Vec<RowError>,
}

impl<R> TransformOutcome<R> {
    pub fn attempted(&self) -> usize {
        self.records.len() + self.failures.len()
    }
}

/// Aggregate result of an import's load phase. `seen_ids` holds the facility
/// identifiers of successfully written rows; the reconciler diffs against it.
#[derive(Debug)]
pub struct ImportSummary {
    pub imported: usize,
    pub failed: Vec<RowError>,
    pub seen_ids: std::collections::HashSet<String>,
}

impl ImportSummary {
    pub fn attempted(&self) -> usize {
        self.imported + self.failed.len()
    }
}

/// Outcome of a full facility cycle (import then reconcile).
#[derive(Debug)]
pub struct CycleReport {
    pub imported: usize,
    pub soft_deleted: usize,
}

/// One outbound occupancy report.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportMessage {
    pub to: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}
