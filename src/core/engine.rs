use crate::domain::model::ImportSummary;
use crate::domain::ports::ImportPipeline;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

/// Drives one import pipeline through extract, transform and load with
/// per-phase logging and optional system monitoring.
pub struct ImportEngine<P: ImportPipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: ImportPipeline> ImportEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(false),
        }
    }

    pub fn new_with_monitoring(pipeline: P, enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(enabled),
        }
    }

    pub async fn run(&self) -> Result<ImportSummary> {
        tracing::info!("Starting import");

        let raw = self.pipeline.extract().await?;
        tracing::info!("Extracted {} bytes", raw.len());
        self.monitor.log_stats("Extract");

        let outcome = self.pipeline.transform(raw).await?;
        tracing::info!(
            "Parsed {} records, {} row failures",
            outcome.records.len(),
            outcome.failures.len()
        );
        self.monitor.log_stats("Transform");

        let summary = self.pipeline.load(outcome).await?;
        tracing::info!(
            "Imported {} of {} rows",
            summary.imported,
            summary.attempted()
        );
        self.monitor.log_stats("Load");
        self.monitor.log_final_stats();

        Ok(summary)
    }
}
