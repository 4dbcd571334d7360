//! The two feed import pipelines and their cycle orchestration.
//!
//! Loads are best-effort: every sub-batch is attempted, failures are
//! aggregated, and the cycle as a whole fails afterwards if any row did.
//! Facility reconciliation runs only after a zero-failure import, so a
//! partial or corrupt feed can never soft-delete facilities it merely
//! failed to mention.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;

use crate::core::engine::ImportEngine;
use crate::core::feeds;
use crate::core::reconcile::reconcile_facilities;
use crate::domain::model::{
    CycleReport, Facility, ImportSummary, RowError, Slot, TransformOutcome,
};
use crate::domain::ports::{FeedSource, ImportPipeline};
use crate::store::{AvailabilityStore, MAX_BATCH_PUT};
use crate::utils::error::{LedgerError, Result};

/// Imports the canonical facility directory feed.
pub struct FacilityImport<S, F> {
    store: S,
    feed: F,
}

impl<S, F> FacilityImport<S, F> {
    pub fn new(store: S, feed: F) -> Self {
        Self { store, feed }
    }
}

#[async_trait]
impl<S: AvailabilityStore, F: FeedSource> ImportPipeline for FacilityImport<S, F> {
    type Record = Facility;

    async fn extract(&self) -> Result<Vec<u8>> {
        self.feed.fetch().await
    }

    async fn transform(&self, raw: Vec<u8>) -> Result<TransformOutcome<Facility>> {
        feeds::parse_facility_feed(&raw)
    }

    async fn load(&self, outcome: TransformOutcome<Facility>) -> Result<ImportSummary> {
        let TransformOutcome { records, mut failures } = outcome;
        let mut imported = 0;
        let mut seen_ids = HashSet::new();

        for chunk in records.chunks(MAX_BATCH_PUT) {
            match self.store.batch_put_facilities(chunk).await {
                Ok(()) => {
                    imported += chunk.len();
                    seen_ids.extend(chunk.iter().map(|f| f.facility_id.clone()));
                }
                Err(e) => {
                    for facility in chunk {
                        let failure = RowError {
                            row: None,
                            id: Some(facility.facility_id.clone()),
                            reason: e.to_string(),
                        };
                        tracing::warn!("Facility import {}", failure);
                        failures.push(failure);
                    }
                }
            }
        }

        Ok(ImportSummary {
            imported,
            failed: failures,
            seen_ids,
        })
    }
}

/// Imports one slot capacity feed file.
pub struct SlotImport<S, F> {
    store: S,
    feed: F,
    last_update: chrono::DateTime<Utc>,
}

impl<S, F> SlotImport<S, F> {
    pub fn new(store: S, feed: F) -> Self {
        Self {
            store,
            feed,
            last_update: Utc::now(),
        }
    }

    pub fn with_last_update(store: S, feed: F, last_update: chrono::DateTime<Utc>) -> Self {
        Self {
            store,
            feed,
            last_update,
        }
    }
}

#[async_trait]
impl<S: AvailabilityStore, F: FeedSource> ImportPipeline for SlotImport<S, F> {
    type Record = Slot;

    async fn extract(&self) -> Result<Vec<u8>> {
        self.feed.fetch().await
    }

    async fn transform(&self, raw: Vec<u8>) -> Result<TransformOutcome<Slot>> {
        feeds::parse_slot_feed(&raw, self.last_update)
    }

    async fn load(&self, outcome: TransformOutcome<Slot>) -> Result<ImportSummary> {
        let TransformOutcome { records, mut failures } = outcome;
        let mut imported = 0;
        let mut seen_ids = HashSet::new();

        for chunk in records.chunks(MAX_BATCH_PUT) {
            match self.store.batch_put_slots(chunk).await {
                Ok(()) => {
                    imported += chunk.len();
                    seen_ids.extend(chunk.iter().map(|s| s.facility_id.clone()));
                }
                Err(e) => {
                    for slot in chunk {
                        let failure = RowError {
                            row: None,
                            id: Some(slot.facility_id.clone()),
                            reason: e.to_string(),
                        };
                        tracing::warn!("Slot import {}", failure);
                        failures.push(failure);
                    }
                }
            }
        }

        Ok(ImportSummary {
            imported,
            failed: failures,
            seen_ids,
        })
    }
}

/// Full facility cycle: import the directory feed, and only if every row
/// made it, reconcile away the facilities the feed stopped mentioning.
pub async fn run_facility_cycle<S, F>(store: &S, feed: F, monitor: bool) -> Result<CycleReport>
where
    S: AvailabilityStore + Clone,
    F: FeedSource,
{
    let pipeline = FacilityImport::new(store.clone(), feed);
    let summary = ImportEngine::new_with_monitoring(pipeline, monitor).run().await?;
    ensure_complete(&summary)?;

    let soft_deleted = reconcile_facilities(store, &summary.seen_ids).await?;
    Ok(CycleReport {
        imported: summary.imported,
        soft_deleted,
    })
}

/// Slot feed import; no reconciliation phase, same all-rows-or-failure exit
/// contract.
pub async fn run_slot_import<S, F>(store: &S, feed: F, monitor: bool) -> Result<usize>
where
    S: AvailabilityStore + Clone,
    F: FeedSource,
{
    let pipeline = SlotImport::new(store.clone(), feed);
    let summary = ImportEngine::new_with_monitoring(pipeline, monitor).run().await?;
    ensure_complete(&summary)?;
    Ok(summary.imported)
}

fn ensure_complete(summary: &ImportSummary) -> Result<()> {
    if summary.failed.is_empty() {
        Ok(())
    } else {
        Err(LedgerError::ImportFailed {
            failed: summary.failed.len(),
            attempted: summary.attempted(),
        })
    }
}
