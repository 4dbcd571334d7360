use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Feed request failed: {0}")]
    FeedError(#[from] reqwest::Error),

    #[error("Feed retrieval failed: {message}")]
    FeedRetrievalError { message: String },

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Timestamp parse error: {0}")]
    TimestampError(#[from] chrono::ParseError),

    #[error("Malformed key '{key}': {reason}")]
    KeyError { key: String, reason: String },

    #[error("Store operation failed: {message}")]
    StoreError { message: String },

    #[error("Mail delivery failed: {message}")]
    MailError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("{failed} of {attempted} feed rows failed to import")]
    ImportFailed { failed: usize, attempted: usize },
}

pub type Result<T> = std::result::Result<T, LedgerError>;
