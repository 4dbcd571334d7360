//! Feed payload parsing and feed sources.
//!
//! Parsing is best-effort per row: a bad row becomes a [`RowError`] in the
//! outcome, never an abort. Only structural failures (unreadable header,
//! broken payload) error out the whole feed.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use csv::StringRecord;

use crate::core::keys;
use crate::domain::model::{Facility, RowError, Slot, TransformOutcome};
use crate::domain::ports::FeedSource;
use crate::utils::error::Result;

/// Column names of the canonical facility directory feed (semicolon CSV).
const COL_FACILITY_ID: &str = "ID_NUMBER";
const COL_NAME: &str = "NOME";
const COL_CATEGORY: &str = "CATEGORIA";
const COL_OPENING_TIME: &str = "ORARIO";
const COL_WEBSITE: &str = "SITO_WWW";
const COL_STREET: &str = "SEDE_VIA";
const COL_STREET_NUMBER: &str = "SEDE_CIVIC";
const COL_BUILDING: &str = "SEDE_PRESS";
const COL_CITY: &str = "COMUNE";
const COL_PROVINCE: &str = "SEDE_PROV";
const COL_ISTAT: &str = "COD_ISTAT";
const COL_PHONE: &str = "TELEFONO";
const COL_REPRESENTATIVE: &str = "REFERENTE";
const COL_LAT: &str = "Latitudine";
const COL_LON: &str = "Longitudine";

/// Column names of the slot capacity feed (comma CSV).
const COL_SLOT_FACILITY: &str = "ID Palestra";
const COL_SLOT_START: &str = "Data e ora inizio slot (ISO 8601)";
const COL_SLOT_DURATION: &str = "Durata in minuti";
const COL_SLOT_CAPACITY: &str = "Posti disponibili";

struct FeedReader {
    index: HashMap<String, usize>,
}

impl FeedReader {
    fn new(headers: &StringRecord) -> Self {
        let index = headers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim().to_string(), i))
            .collect();
        Self { index }
    }

    /// Tolerant lookup: a missing column or cell becomes an empty string and
    /// a warning, matching the directory feed's loose schema.
    fn field_or_empty(&self, record: &StringRecord, name: &str) -> String {
        match self.index.get(name).and_then(|&i| record.get(i)) {
            Some(value) => value.trim().to_string(),
            None => {
                tracing::warn!("Missing field: {}", name);
                String::new()
            }
        }
    }

    /// Strict lookup for fields a row cannot be imported without.
    fn required_field(&self, record: &StringRecord, name: &str) -> std::result::Result<String, String> {
        match self.index.get(name).and_then(|&i| record.get(i)) {
            Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
            _ => Err(format!("missing required field {}", name)),
        }
    }
}

/// Parses the semicolon-delimited facility directory feed. Every imported
/// facility comes back searchable and bookable; re-appearing after a soft
/// delete re-enables it through this full-record path.
pub fn parse_facility_feed(raw: &[u8]) -> Result<TransformOutcome<Facility>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_reader(raw);
    let reader = FeedReader::new(csv_reader.headers()?);

    let mut records = Vec::new();
    let mut failures = Vec::new();

    for (i, row) in csv_reader.records().enumerate() {
        let row_number = i + 1;
        let record = match row {
            Ok(record) => record,
            Err(e) => {
                let failure = RowError {
                    row: Some(row_number),
                    id: None,
                    reason: e.to_string(),
                };
                tracing::warn!("Facility feed {}", failure);
                failures.push(failure);
                continue;
            }
        };

        let facility_id = match reader.required_field(&record, COL_FACILITY_ID) {
            Ok(id) => id,
            Err(reason) => {
                let failure = RowError {
                    row: Some(row_number),
                    id: None,
                    reason,
                };
                tracing::warn!("Facility feed {}", failure);
                failures.push(failure);
                continue;
            }
        };

        records.push(Facility {
            facility_id,
            name: reader.field_or_empty(&record, COL_NAME),
            category: reader.field_or_empty(&record, COL_CATEGORY),
            opening_time_desc: reader.field_or_empty(&record, COL_OPENING_TIME),
            website: reader.field_or_empty(&record, COL_WEBSITE),
            street: reader.field_or_empty(&record, COL_STREET),
            street_number: reader.field_or_empty(&record, COL_STREET_NUMBER),
            building: reader.field_or_empty(&record, COL_BUILDING),
            city: reader.field_or_empty(&record, COL_CITY),
            province: reader.field_or_empty(&record, COL_PROVINCE),
            istat_code: reader.field_or_empty(&record, COL_ISTAT),
            phone: reader.field_or_empty(&record, COL_PHONE),
            representative: reader.field_or_empty(&record, COL_REPRESENTATIVE),
            lat: reader.field_or_empty(&record, COL_LAT),
            lon: reader.field_or_empty(&record, COL_LON),
            searchable: true,
            bookable: true,
        });
    }

    Ok(TransformOutcome { records, failures })
}

/// Parses the comma-delimited slot capacity feed. The feed's capacity value
/// resets both `allowed_people` and `available_places`: a re-import fully
/// replaces the capacity fields for its `(facility, start, duration)` key.
pub fn parse_slot_feed(raw: &[u8], last_update: DateTime<Utc>) -> Result<TransformOutcome<Slot>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b',')
        .flexible(true)
        .from_reader(raw);
    let reader = FeedReader::new(csv_reader.headers()?);

    let mut records = Vec::new();
    let mut failures = Vec::new();

    for (i, row) in csv_reader.records().enumerate() {
        let row_number = i + 1;
        match parse_slot_row(&reader, row, last_update) {
            Ok(slot) => records.push(slot),
            Err((id, reason)) => {
                let failure = RowError {
                    row: Some(row_number),
                    id,
                    reason,
                };
                tracing::warn!("Slot feed {}", failure);
                failures.push(failure);
            }
        }
    }

    Ok(TransformOutcome { records, failures })
}

fn parse_slot_row(
    reader: &FeedReader,
    row: csv::Result<StringRecord>,
    last_update: DateTime<Utc>,
) -> std::result::Result<Slot, (Option<String>, String)> {
    let record = row.map_err(|e| (None, e.to_string()))?;

    let facility_id = reader
        .required_field(&record, COL_SLOT_FACILITY)
        .map_err(|reason| (None, reason))?;
    let fail = |reason: String| (Some(facility_id.clone()), reason);

    let start_raw = reader
        .required_field(&record, COL_SLOT_START)
        .map_err(&fail)?;
    // only the fixed-width sortable format is admissible in a slot key
    let start = keys::parse_timestamp(&start_raw).map_err(|e| fail(e.to_string()))?;

    let duration_minutes = reader
        .required_field(&record, COL_SLOT_DURATION)
        .map_err(&fail)?
        .parse::<u32>()
        .map_err(|_| fail("duration is not an unsigned integer".to_string()))?;

    let capacity = reader
        .required_field(&record, COL_SLOT_CAPACITY)
        .map_err(&fail)?
        .parse::<u32>()
        .map_err(|_| fail("capacity is not an unsigned integer".to_string()))?;

    Slot::new(
        facility_id,
        start,
        duration_minutes,
        capacity,
        capacity,
        last_update,
    )
    .map_err(|e| (None, e.to_string()))
}

/// Feed payload from the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalFeed {
    path: PathBuf,
}

impl LocalFeed {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl FeedSource for LocalFeed {
    async fn fetch(&self) -> Result<Vec<u8>> {
        let data = tokio::fs::read(&self.path).await?;
        Ok(data)
    }
}

/// Feed payload fetched over HTTP (the public facility directory endpoint).
#[derive(Debug, Clone)]
pub struct HttpFeed {
    client: reqwest::Client,
    url: String,
}

impl HttpFeed {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

impl FeedSource for HttpFeed {
    async fn fetch(&self) -> Result<Vec<u8>> {
        tracing::debug!("Fetching feed from: {}", self.url);
        let response = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const FACILITY_HEADER: &str = "ID_NUMBER;NOME;CATEGORIA;ORARIO;SITO_WWW;SEDE_VIA;SEDE_CIVIC;SEDE_PRESS;COMUNE;SEDE_PROV;COD_ISTAT;TELEFONO;REFERENTE;Latitudine;Longitudine";

    fn last_update() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 4, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_facility_feed() {
        let feed = format!(
            "{}\n42;Palestra Uno;palestra;8-20;;Via Roma;1;;Venezia;VE;027042;041555;rep@example.com;45.44;12.33\n",
            FACILITY_HEADER
        );
        let outcome = parse_facility_feed(feed.as_bytes()).unwrap();
        assert_eq!(outcome.failures.len(), 0);
        assert_eq!(outcome.records.len(), 1);

        let facility = &outcome.records[0];
        assert_eq!(facility.facility_id, "42");
        assert_eq!(facility.name, "Palestra Uno");
        assert_eq!(facility.website, "");
        assert!(facility.searchable && facility.bookable);
    }

    #[test]
    fn test_facility_feed_missing_column_becomes_empty() {
        // no REFERENTE column at all
        let feed = "ID_NUMBER;NOME\n42;Palestra Uno\n";
        let outcome = parse_facility_feed(feed.as_bytes()).unwrap();
        assert_eq!(outcome.failures.len(), 0);
        assert_eq!(outcome.records[0].representative, "");
    }

    #[test]
    fn test_facility_feed_missing_id_fails_the_row_only() {
        let feed = "ID_NUMBER;NOME\n;Palestra Senza Id\n43;Palestra Due\n";
        let outcome = parse_facility_feed(feed.as_bytes()).unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].facility_id, "43");
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].row, Some(1));
    }

    #[test]
    fn test_parse_slot_feed() {
        let feed = "ID Palestra,Data e ora inizio slot (ISO 8601),Durata in minuti,Posti disponibili\n1,2024-01-01T10:00:00Z,60,10\n";
        let outcome = parse_slot_feed(feed.as_bytes(), last_update()).unwrap();
        assert_eq!(outcome.failures.len(), 0);

        let slot = &outcome.records[0];
        assert_eq!(slot.facility_id, "1");
        assert_eq!(slot.duration_minutes, 60);
        assert_eq!(slot.allowed_people, 10);
        assert_eq!(slot.available_places, 10);
        assert_eq!(slot.last_update, last_update());
    }

    #[test]
    fn test_slot_feed_rejects_non_sortable_timestamp() {
        let feed = "ID Palestra,Data e ora inizio slot (ISO 8601),Durata in minuti,Posti disponibili\n1,2024-01-01T10:00:00+02:00,60,10\n1,2024-01-01T11:00:00Z,60,8\n";
        let outcome = parse_slot_feed(feed.as_bytes(), last_update()).unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].id.as_deref(), Some("1"));
    }

    #[test]
    fn test_slot_feed_rejects_bad_numbers() {
        let feed = "ID Palestra,Data e ora inizio slot (ISO 8601),Durata in minuti,Posti disponibili\n1,2024-01-01T10:00:00Z,sixty,10\n1,2024-01-01T10:00:00Z,60,-3\n";
        let outcome = parse_slot_feed(feed.as_bytes(), last_update()).unwrap();
        assert_eq!(outcome.records.len(), 0);
        assert_eq!(outcome.failures.len(), 2);
    }
}
