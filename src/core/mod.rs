pub mod engine;
pub mod feeds;
pub mod import;
pub mod keys;
pub mod matcher;
pub mod reconcile;
pub mod report;

pub use crate::domain::model::{ImportSummary, TransformOutcome};
pub use crate::domain::ports::{FeedSource, ImportPipeline, Mailer};
pub use crate::utils::error::Result;
