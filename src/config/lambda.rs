use std::env;

use aws_sdk_s3::Client as S3Client;
use aws_sdk_sesv2::types::{Body, Content, Destination, EmailContent, Message};
use aws_sdk_sesv2::Client as SesClient;

use crate::config::DEFAULT_FACILITY_FEED_URL;
use crate::domain::model::ReportMessage;
use crate::domain::ports::{FeedSource, Mailer};
use crate::utils::error::{LedgerError, Result};
use crate::utils::validation::{validate_non_empty_string, validate_url, Validate};

#[derive(Debug, Clone)]
pub struct LambdaConfig {
    pub data_table: String,
    pub facility_feed_url: String,
    pub sender_email: Option<String>,
}

impl LambdaConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            data_table: env::var("DATA_TABLE").map_err(|_| LedgerError::MissingConfigError {
                field: "DATA_TABLE".to_string(),
            })?,
            facility_feed_url: env::var("FACILITY_FEED_URL")
                .unwrap_or_else(|_| DEFAULT_FACILITY_FEED_URL.to_string()),
            sender_email: env::var("SENDER_EMAIL").ok(),
        })
    }
}

impl Validate for LambdaConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("data_table", &self.data_table)?;
        validate_url("facility_feed_url", &self.facility_feed_url)?;
        if let Some(sender) = &self.sender_email {
            validate_non_empty_string("sender_email", sender)?;
        }
        Ok(())
    }
}

/// Slot capacity feed dropped into the ingest bucket.
#[derive(Debug, Clone)]
pub struct S3Feed {
    client: S3Client,
    bucket: String,
    key: String,
}

impl S3Feed {
    pub fn new(client: S3Client, bucket: String, key: String) -> Self {
        Self {
            client,
            bucket,
            key,
        }
    }
}

impl FeedSource for S3Feed {
    async fn fetch(&self) -> Result<Vec<u8>> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .send()
            .await
            .map_err(|e| LedgerError::FeedRetrievalError {
                message: format!("failed to read s3://{}/{}: {}", self.bucket, self.key, e),
            })?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| LedgerError::FeedRetrievalError {
                message: format!("failed to collect s3://{}/{}: {}", self.bucket, self.key, e),
            })?;

        Ok(data.into_bytes().to_vec())
    }
}

/// Report delivery through SES.
#[derive(Debug, Clone)]
pub struct SesMailer {
    client: SesClient,
    sender: String,
}

impl SesMailer {
    pub fn new(client: SesClient, sender: String) -> Self {
        Self { client, sender }
    }
}

impl Mailer for SesMailer {
    async fn send(&self, message: &ReportMessage) -> Result<()> {
        let mail_error = |message: String| LedgerError::MailError { message };

        let subject = Content::builder()
            .data(&message.subject)
            .charset("UTF-8")
            .build()
            .map_err(|e| mail_error(format!("invalid subject: {}", e)))?;
        let text = Content::builder()
            .data(&message.text_body)
            .charset("UTF-8")
            .build()
            .map_err(|e| mail_error(format!("invalid text body: {}", e)))?;
        let html = Content::builder()
            .data(&message.html_body)
            .charset("UTF-8")
            .build()
            .map_err(|e| mail_error(format!("invalid html body: {}", e)))?;

        let body = Body::builder().text(text).html(html).build();
        let content = Message::builder()
            .subject(subject)
            .body(body)
            .build();

        self.client
            .send_email()
            .from_email_address(&self.sender)
            .reply_to_addresses(&self.sender)
            .destination(Destination::builder().to_addresses(&message.to).build())
            .content(EmailContent::builder().simple(content).build())
            .send()
            .await
            .map_err(|e| mail_error(format!("send to {} failed: {}", message.to, e)))?;

        Ok(())
    }
}
