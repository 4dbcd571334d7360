use crate::domain::model::{ImportSummary, ReportMessage, TransformOutcome};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Source of one feed payload (local file, HTTP endpoint, S3 object).
pub trait FeedSource: Send + Sync {
    fn fetch(&self) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
}

/// Outbound delivery of an occupancy report.
pub trait Mailer: Send + Sync {
    fn send(&self, message: &ReportMessage) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// One feed import, split into the classic three phases. `transform` turns
/// raw bytes into per-row outcomes without touching the store; `load` writes
/// best-effort and aggregates row failures instead of aborting on them.
#[async_trait]
pub trait ImportPipeline: Send + Sync {
    type Record: Send + Sync;

    async fn extract(&self) -> Result<Vec<u8>>;

    async fn transform(&self, raw: Vec<u8>) -> Result<TransformOutcome<Self::Record>>;

    async fn load(&self, outcome: TransformOutcome<Self::Record>) -> Result<ImportSummary>;
}
