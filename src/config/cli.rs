use clap::{Parser, Subcommand};

use crate::domain::model::ReportMessage;
use crate::domain::ports::Mailer;
use crate::utils::error::Result;
use crate::utils::validation::{validate_path, validate_timestamp, validate_url, Validate};

#[derive(Debug, Parser)]
#[command(name = "slot-ledger")]
#[command(about = "Availability ledger tooling for bookable facility slots")]
pub struct CliConfig {
    #[command(subcommand)]
    pub command: CliCommand,

    #[arg(long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Enable system monitoring")]
    pub monitor: bool,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Parse feed files and report row-level problems without writing anything
    Check {
        #[arg(long, help = "Facility directory feed (semicolon CSV)")]
        facilities_file: Option<String>,

        #[arg(long, help = "Slot capacity feed (comma CSV)")]
        slots_file: Option<String>,
    },
    /// Run a full import cycle and today's report against an in-memory ledger
    Preview {
        #[arg(long, help = "Facility directory feed (semicolon CSV)")]
        facilities_file: Option<String>,

        #[arg(long, help = "Fetch the facility feed over HTTP instead")]
        facilities_url: Option<String>,

        #[arg(long, help = "Slot capacity feed (comma CSV)")]
        slots_file: Option<String>,

        #[arg(long, help = "Report reference time, e.g. 2024-01-01T10:00:00Z")]
        now: Option<String>,
    },
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        match &self.command {
            CliCommand::Check {
                facilities_file,
                slots_file,
            } => {
                if facilities_file.is_none() && slots_file.is_none() {
                    return Err(crate::utils::error::LedgerError::ConfigError {
                        message: "check needs --facilities-file and/or --slots-file".to_string(),
                    });
                }
                if let Some(path) = facilities_file {
                    validate_path("facilities_file", path)?;
                }
                if let Some(path) = slots_file {
                    validate_path("slots_file", path)?;
                }
            }
            CliCommand::Preview {
                facilities_file,
                facilities_url,
                slots_file,
                now,
            } => {
                match (facilities_file, facilities_url) {
                    (Some(_), Some(_)) | (None, None) => {
                        return Err(crate::utils::error::LedgerError::ConfigError {
                            message:
                                "preview needs exactly one of --facilities-file or --facilities-url"
                                    .to_string(),
                        });
                    }
                    (Some(path), None) => validate_path("facilities_file", path)?,
                    (None, Some(url)) => validate_url("facilities_url", url)?,
                }
                if let Some(path) = slots_file {
                    validate_path("slots_file", path)?;
                }
                if let Some(now) = now {
                    validate_timestamp("now", now)?;
                }
            }
        }
        Ok(())
    }
}

/// Mailer for local runs: prints each report to stdout instead of sending.
#[derive(Debug, Clone, Default)]
pub struct StdoutMailer;

impl Mailer for StdoutMailer {
    async fn send(&self, message: &ReportMessage) -> Result<()> {
        println!("To: {}", message.to);
        println!("Subject: {}", message.subject);
        println!();
        println!("{}", message.text_body);
        println!("---");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_requires_at_least_one_feed() {
        let config = CliConfig {
            command: CliCommand::Check {
                facilities_file: None,
                slots_file: None,
            },
            verbose: false,
            monitor: false,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_preview_requires_exactly_one_facility_source() {
        let both = CliConfig {
            command: CliCommand::Preview {
                facilities_file: Some("gyms.csv".to_string()),
                facilities_url: Some("https://example.com/gyms.csv".to_string()),
                slots_file: None,
                now: None,
            },
            verbose: false,
            monitor: false,
        };
        assert!(both.validate().is_err());

        let file_only = CliConfig {
            command: CliCommand::Preview {
                facilities_file: Some("gyms.csv".to_string()),
                facilities_url: None,
                slots_file: None,
                now: Some("2024-01-01T10:00:00Z".to_string()),
            },
            verbose: false,
            monitor: false,
        };
        assert!(file_only.validate().is_ok());
    }
}
