//! Error types for actweek
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, bad config, malformed input)
//! - 3: Blocked (week already closed, conditional write lost)
//! - 4: Operation failed (storage, secrets, notification)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the actweek CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const BLOCKED: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for actweek operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid trigger event: {0}")]
    InvalidEvent(String),

    #[error("Missing required column '{0}'")]
    MissingColumn(String),

    #[error("Invalid value {value:?} for column '{column}' on line {line}")]
    InvalidRow {
        line: u64,
        column: String,
        value: String,
    },

    #[error("Snapshot columns differ: {0}")]
    SchemaMismatch(String),

    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    // Blocked (exit code 3)
    #[error("Week {week} is already closed ({phase})")]
    WeekClosed { week: u32, phase: String },

    #[error("Concurrent update of {0}")]
    Conflict(String),

    // Operation failures (exit code 4)
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("Week {week} was claimed but {key} is missing")]
    MissingSnapshot { week: u32, key: String },

    #[error("Secret not found: {0}")]
    SecretNotFound(String),

    #[error("Notification failed: {0}")]
    Notify(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            // User errors
            Error::InvalidConfig(_)
            | Error::InvalidArgument(_)
            | Error::InvalidEvent(_)
            | Error::MissingColumn(_)
            | Error::InvalidRow { .. }
            | Error::SchemaMismatch(_)
            | Error::InvalidKey(_) => exit_codes::USER_ERROR,

            // Blocked
            Error::WeekClosed { .. } | Error::Conflict(_) => exit_codes::BLOCKED,

            // Operation failures
            Error::ObjectNotFound(_)
            | Error::MissingSnapshot { .. }
            | Error::SecretNotFound(_)
            | Error::Notify(_)
            | Error::Http(_)
            | Error::Csv(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::Watch(_)
            | Error::LockFailed(_)
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Status code reported back to the triggering environment
    pub fn status_code(&self) -> u16 {
        match self {
            Error::InvalidEvent(_)
            | Error::MissingColumn(_)
            | Error::InvalidRow { .. }
            | Error::SchemaMismatch(_)
            | Error::InvalidKey(_)
            | Error::Csv(_) => 400,
            Error::ObjectNotFound(_) => 404,
            Error::WeekClosed { .. } | Error::Conflict(_) => 409,
            _ => 500,
        }
    }

    /// Structured details for JSON error output
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::InvalidRow {
                line,
                column,
                value,
            } => Some(serde_json::json!({
                "line": line,
                "column": column,
                "value": value,
            })),
            Error::WeekClosed { week, phase } => Some(serde_json::json!({
                "week": week,
                "phase": phase,
            })),
            Error::MissingColumn(column) => Some(serde_json::json!({ "column": column })),
            Error::MissingSnapshot { week, key } => Some(serde_json::json!({
                "week": week,
                "key": key,
            })),
            _ => None,
        }
    }
}

/// Result type alias for actweek operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wrapper for displaying errors in JSON format
#[derive(serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        JsonError {
            error: err.to_string(),
            code: err.exit_code(),
            details: err.details(),
        }
    }
}
