use std::collections::HashMap;
use std::time::Duration;

use aws_sdk_dynamodb::types::{AttributeValue, PutRequest, WriteRequest};
use aws_sdk_dynamodb::Client as DynamoClient;
use chrono::{DateTime, Utc};

use crate::core::keys;
use crate::domain::model::{Booking, Facility, Slot};
use crate::store::{AvailabilityStore, StoredRecord, MAX_BATCH_PUT};
use crate::utils::error::{LedgerError, Result};

/// How many times a batch write re-drives unprocessed items before giving up.
/// The SDK already retries transient request failures; this only covers
/// partial batch acceptance under throttling.
const MAX_UNPROCESSED_PASSES: u32 = 5;

/// DynamoDB-backed table. One table, `pk`/`sk` string keys, a `GSI1` index
/// keyed on the constant `gsi1pk` attribute for facility enumeration.
#[derive(Debug, Clone)]
pub struct DynamoStore {
    client: DynamoClient,
    table: String,
}

impl DynamoStore {
    pub fn new(client: DynamoClient, table: String) -> Self {
        Self { client, table }
    }

    async fn write_batch(&self, mut requests: Vec<WriteRequest>) -> Result<()> {
        let mut pass = 0;
        while !requests.is_empty() {
            if pass >= MAX_UNPROCESSED_PASSES {
                return Err(LedgerError::StoreError {
                    message: format!(
                        "{} items still unprocessed after {} batch write passes",
                        requests.len(),
                        pass
                    ),
                });
            }
            if pass > 0 {
                tokio::time::sleep(Duration::from_millis(50 << pass)).await;
            }

            let output = self
                .client
                .batch_write_item()
                .request_items(self.table.clone(), requests)
                .send()
                .await
                .map_err(|e| LedgerError::StoreError {
                    message: format!("batch write failed: {}", e),
                })?;

            requests = output
                .unprocessed_items()
                .and_then(|tables| tables.get(&self.table))
                .cloned()
                .unwrap_or_default();
            pass += 1;
        }
        Ok(())
    }

    async fn batch_put_items(&self, items: Vec<HashMap<String, AttributeValue>>) -> Result<()> {
        for chunk in items.chunks(MAX_BATCH_PUT) {
            let requests = chunk
                .iter()
                .map(|item| {
                    let put = PutRequest::builder()
                        .set_item(Some(item.clone()))
                        .build()
                        .map_err(|e| LedgerError::StoreError {
                            message: format!("invalid put request: {}", e),
                        })?;
                    Ok(WriteRequest::builder().put_request(put).build())
                })
                .collect::<Result<Vec<_>>>()?;
            self.write_batch(requests).await?;
        }
        Ok(())
    }
}

impl AvailabilityStore for DynamoStore {
    async fn put_facility(&self, facility: &Facility) -> Result<()> {
        self.client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(facility_item(facility)))
            .send()
            .await
            .map_err(|e| LedgerError::StoreError {
                message: format!("put facility {} failed: {}", facility.facility_id, e),
            })?;
        Ok(())
    }

    async fn batch_put_facilities(&self, facilities: &[Facility]) -> Result<()> {
        self.batch_put_items(facilities.iter().map(facility_item).collect())
            .await
    }

    async fn batch_put_slots(&self, slots: &[Slot]) -> Result<()> {
        self.batch_put_items(slots.iter().map(slot_item).collect())
            .await
    }

    async fn query_range(
        &self,
        facility_id: &str,
        sk_low: &str,
        sk_high: &str,
    ) -> Result<Vec<StoredRecord>> {
        let mut records = Vec::new();
        let mut exclusive_start_key = None;

        loop {
            let output = self
                .client
                .query()
                .table_name(&self.table)
                .key_condition_expression("pk = :pk AND sk BETWEEN :lo AND :hi")
                .expression_attribute_values(
                    ":pk",
                    AttributeValue::S(keys::facility_pk(facility_id)),
                )
                .expression_attribute_values(":lo", AttributeValue::S(sk_low.to_string()))
                .expression_attribute_values(":hi", AttributeValue::S(sk_high.to_string()))
                .set_exclusive_start_key(exclusive_start_key)
                .send()
                .await
                .map_err(|e| LedgerError::StoreError {
                    message: format!("range query for {} failed: {}", facility_id, e),
                })?;

            for item in output.items() {
                records.push(decode_record(item)?);
            }

            exclusive_start_key = output.last_evaluated_key().cloned();
            if exclusive_start_key.is_none() {
                break;
            }
        }

        Ok(records)
    }

    async fn query_facilities(&self) -> Result<Vec<Facility>> {
        let mut facilities = Vec::new();
        let mut exclusive_start_key = None;

        loop {
            let output = self
                .client
                .query()
                .table_name(&self.table)
                .index_name("GSI1")
                .key_condition_expression("gsi1pk = :place")
                .expression_attribute_values(
                    ":place",
                    AttributeValue::S(keys::FACILITY_INDEX_PK.to_string()),
                )
                .set_exclusive_start_key(exclusive_start_key)
                .send()
                .await
                .map_err(|e| LedgerError::StoreError {
                    message: format!("facility index query failed: {}", e),
                })?;

            for item in output.items() {
                facilities.push(decode_facility(item)?);
            }

            exclusive_start_key = output.last_evaluated_key().cloned();
            if exclusive_start_key.is_none() {
                break;
            }
        }

        Ok(facilities)
    }

    async fn soft_delete_facility(&self, facility_id: &str) -> Result<()> {
        self.client
            .update_item()
            .table_name(&self.table)
            .key("pk", AttributeValue::S(keys::facility_pk(facility_id)))
            .key("sk", AttributeValue::S(keys::FACILITY_INFO_SK.to_string()))
            .update_expression("SET #data.searchable = :off, #data.bookable = :off")
            .expression_attribute_names("#data", "data")
            .expression_attribute_values(":off", AttributeValue::Bool(false))
            .send()
            .await
            .map_err(|e| LedgerError::StoreError {
                message: format!("soft delete of {} failed: {}", facility_id, e),
            })?;
        Ok(())
    }
}

fn facility_item(facility: &Facility) -> HashMap<String, AttributeValue> {
    let s = |v: &str| AttributeValue::S(v.to_string());
    let data = HashMap::from([
        ("placeId".to_string(), s(&facility.facility_id)),
        ("name".to_string(), s(&facility.name)),
        ("category".to_string(), s(&facility.category)),
        (
            "openingTimeDesc".to_string(),
            s(&facility.opening_time_desc),
        ),
        ("website".to_string(), s(&facility.website)),
        ("street".to_string(), s(&facility.street)),
        ("streetNumber".to_string(), s(&facility.street_number)),
        ("building".to_string(), s(&facility.building)),
        ("city".to_string(), s(&facility.city)),
        ("province".to_string(), s(&facility.province)),
        ("istatCode".to_string(), s(&facility.istat_code)),
        ("phone".to_string(), s(&facility.phone)),
        ("representative".to_string(), s(&facility.representative)),
        ("lat".to_string(), s(&facility.lat)),
        ("lon".to_string(), s(&facility.lon)),
        (
            "searchable".to_string(),
            AttributeValue::Bool(facility.searchable),
        ),
        (
            "bookable".to_string(),
            AttributeValue::Bool(facility.bookable),
        ),
    ]);

    HashMap::from([
        (
            "pk".to_string(),
            s(&keys::facility_pk(&facility.facility_id)),
        ),
        ("sk".to_string(), s(keys::FACILITY_INFO_SK)),
        ("gsi1pk".to_string(), s(keys::FACILITY_INDEX_PK)),
        ("data".to_string(), AttributeValue::M(data)),
    ])
}

fn slot_item(slot: &Slot) -> HashMap<String, AttributeValue> {
    HashMap::from([
        (
            "pk".to_string(),
            AttributeValue::S(keys::facility_pk(&slot.facility_id)),
        ),
        (
            "sk".to_string(),
            AttributeValue::S(keys::slot_sk(slot.start, slot.duration_minutes)),
        ),
        (
            "startDatetime".to_string(),
            AttributeValue::S(keys::format_timestamp(slot.start)),
        ),
        (
            "duration".to_string(),
            AttributeValue::N(slot.duration_minutes.to_string()),
        ),
        (
            "allowedPeople".to_string(),
            AttributeValue::N(slot.allowed_people.to_string()),
        ),
        (
            "availablePlaces".to_string(),
            AttributeValue::N(slot.available_places.to_string()),
        ),
        (
            "lastUpdate".to_string(),
            AttributeValue::S(slot.last_update.to_rfc3339()),
        ),
    ])
}

fn decode_record(item: &HashMap<String, AttributeValue>) -> Result<StoredRecord> {
    let sk = get_str(item, "sk")?;
    if sk == keys::FACILITY_INFO_SK {
        return Ok(StoredRecord::Facility(decode_facility(item)?));
    }
    match sk.chars().next() {
        Some(keys::SLOT_TAG) => Ok(StoredRecord::Slot(decode_slot(item)?)),
        Some(keys::BOOKING_TAG) => Ok(StoredRecord::Booking(decode_booking(item)?)),
        _ => Err(LedgerError::KeyError {
            key: sk.to_string(),
            reason: "unknown entity tag".to_string(),
        }),
    }
}

fn decode_facility(item: &HashMap<String, AttributeValue>) -> Result<Facility> {
    let facility_id = keys::facility_id_from_pk(get_str(item, "pk")?)?.to_string();
    let data = match item.get("data") {
        Some(AttributeValue::M(m)) => m,
        _ => {
            return Err(LedgerError::StoreError {
                message: format!("facility {} has no data map", facility_id),
            })
        }
    };

    let field = |name: &str| -> String {
        match data.get(name) {
            Some(AttributeValue::S(v)) => v.clone(),
            _ => String::new(),
        }
    };
    let flag = |name: &str| -> bool {
        matches!(data.get(name), Some(AttributeValue::Bool(true)))
    };

    Ok(Facility {
        facility_id,
        name: field("name"),
        category: field("category"),
        opening_time_desc: field("openingTimeDesc"),
        website: field("website"),
        street: field("street"),
        street_number: field("streetNumber"),
        building: field("building"),
        city: field("city"),
        province: field("province"),
        istat_code: field("istatCode"),
        phone: field("phone"),
        representative: field("representative"),
        lat: field("lat"),
        lon: field("lon"),
        searchable: flag("searchable"),
        bookable: flag("bookable"),
    })
}

fn decode_slot(item: &HashMap<String, AttributeValue>) -> Result<Slot> {
    let facility_id = keys::facility_id_from_pk(get_str(item, "pk")?)?.to_string();
    let (start, duration_minutes) = keys::decode_slot_sk(get_str(item, "sk")?)?;
    let allowed_people = get_num(item, "allowedPeople")?;
    let available_places = get_num(item, "availablePlaces")?;
    let last_update = parse_last_update(get_str(item, "lastUpdate")?)?;

    Slot::new(
        facility_id,
        start,
        duration_minutes,
        allowed_people,
        available_places,
        last_update,
    )
}

fn decode_booking(item: &HashMap<String, AttributeValue>) -> Result<Booking> {
    let facility_id = keys::facility_id_from_pk(get_str(item, "pk")?)?.to_string();
    let (start, secret_code) = keys::decode_booking_sk(get_str(item, "sk")?)?;
    Ok(Booking {
        facility_id,
        start,
        secret_code,
    })
}

fn parse_last_update(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .or_else(|_| keys::parse_timestamp(raw))
        .map_err(|_| LedgerError::StoreError {
            message: format!("unparseable lastUpdate attribute: {}", raw),
        })
}

fn get_str<'a>(item: &'a HashMap<String, AttributeValue>, name: &str) -> Result<&'a str> {
    match item.get(name) {
        Some(AttributeValue::S(v)) => Ok(v),
        _ => Err(LedgerError::StoreError {
            message: format!("missing string attribute {}", name),
        }),
    }
}

fn get_num(item: &HashMap<String, AttributeValue>, name: &str) -> Result<u32> {
    match item.get(name) {
        Some(AttributeValue::N(v)) => v.parse().map_err(|_| LedgerError::StoreError {
            message: format!("attribute {} is not an unsigned integer: {}", name, v),
        }),
        _ => Err(LedgerError::StoreError {
            message: format!("missing numeric attribute {}", name),
        }),
    }
}
