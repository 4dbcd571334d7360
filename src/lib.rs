pub mod config;
pub mod core;
pub mod domain;
pub mod store;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::cli::{CliCommand, CliConfig, StdoutMailer};

#[cfg(feature = "lambda")]
pub use crate::config::lambda::{LambdaConfig, S3Feed, SesMailer};

pub use crate::core::engine::ImportEngine;
pub use crate::core::feeds::{HttpFeed, LocalFeed};
pub use crate::core::import::{run_facility_cycle, run_slot_import, FacilityImport, SlotImport};
pub use crate::core::matcher::{MatchWindow, SlotOccupancy};
pub use crate::core::reconcile::reconcile_facilities;
pub use crate::core::report::{ReportJob, ReportSummary};
pub use crate::domain::model::{
    Booking, CycleReport, Facility, ImportSummary, ReportMessage, Slot,
};
pub use crate::store::{memory::MemoryStore, AvailabilityStore, StoredRecord};
pub use crate::utils::error::{LedgerError, Result};
