#[cfg(feature = "lambda")]
use aws_config::BehaviorVersion;
#[cfg(feature = "lambda")]
use chrono::Utc;
#[cfg(feature = "lambda")]
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
#[cfg(feature = "lambda")]
use serde::{Deserialize, Serialize};
#[cfg(feature = "lambda")]
use slot_ledger::store::dynamo::DynamoStore;
#[cfg(feature = "lambda")]
use slot_ledger::utils::{logger, validation::Validate};
#[cfg(feature = "lambda")]
use slot_ledger::{
    run_facility_cycle, run_slot_import, HttpFeed, LambdaConfig, ReportJob, S3Feed, SesMailer,
};

#[cfg(feature = "lambda")]
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Job {
    ImportFacilities,
    ImportSlots,
    Report,
}

#[cfg(feature = "lambda")]
#[derive(Deserialize)]
pub struct Request {
    pub job: Job,
    /// Bucket and key of the slot feed object (import-slots only).
    pub s3_bucket: Option<String>,
    pub s3_key: Option<String>,
    /// Overrides the configured facility feed URL (import-facilities only).
    pub feed_url: Option<String>,
}

#[cfg(feature = "lambda")]
#[derive(Serialize)]
pub struct Response {
    pub message: String,
    pub imported: usize,
    pub soft_deleted: usize,
    pub emails_sent: usize,
}

#[cfg(feature = "lambda")]
async fn function_handler(event: LambdaEvent<Request>) -> Result<Response, Error> {
    let config = LambdaConfig::from_env().map_err(boxed)?;
    config.validate().map_err(boxed)?;

    let aws_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let dynamo_client = aws_sdk_dynamodb::Client::new(&aws_config);
    let store = DynamoStore::new(dynamo_client, config.data_table.clone());

    match event.payload.job {
        Job::ImportFacilities => {
            let url = event
                .payload
                .feed_url
                .unwrap_or_else(|| config.facility_feed_url.clone());
            tracing::info!("Importing facility directory from {}", url);
            let cycle = run_facility_cycle(&store, HttpFeed::new(url), false)
                .await
                .map_err(boxed)?;
            Ok(Response {
                message: "facility import completed".to_string(),
                imported: cycle.imported,
                soft_deleted: cycle.soft_deleted,
                emails_sent: 0,
            })
        }
        Job::ImportSlots => {
            let bucket = event
                .payload
                .s3_bucket
                .ok_or("import-slots requires s3_bucket")?;
            let key = event.payload.s3_key.ok_or("import-slots requires s3_key")?;
            tracing::info!("Importing slot feed from s3://{}/{}", bucket, key);

            let s3_client = aws_sdk_s3::Client::new(&aws_config);
            let feed = S3Feed::new(s3_client, bucket, key);
            let imported = run_slot_import(&store, feed, false).await.map_err(boxed)?;
            Ok(Response {
                message: "slot import completed".to_string(),
                imported,
                soft_deleted: 0,
                emails_sent: 0,
            })
        }
        Job::Report => {
            let sender = config
                .sender_email
                .clone()
                .ok_or("report requires SENDER_EMAIL")?;
            let ses_client = aws_sdk_sesv2::Client::new(&aws_config);
            let mailer = SesMailer::new(ses_client, sender);

            let summary = ReportJob::new(store, mailer)
                .run(Utc::now())
                .await
                .map_err(boxed)?;
            Ok(Response {
                message: format!("sent {} emails", summary.emails_sent),
                imported: 0,
                soft_deleted: 0,
                emails_sent: summary.emails_sent,
            })
        }
    }
}

#[cfg(feature = "lambda")]
fn boxed(e: slot_ledger::LedgerError) -> Error {
    Box::new(e) as Box<dyn std::error::Error + Send + Sync>
}

#[cfg(feature = "lambda")]
#[tokio::main]
async fn main() -> Result<(), Error> {
    logger::init_lambda_logger();
    run(service_fn(function_handler)).await
}
