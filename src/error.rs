use std::fmt;

use thiserror::Error;

/// The backend operation a failure happened in, used as the message prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Save,
    Remove,
    Fetch,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let prefix = match self {
            Operation::Create => "Cannot create storage",
            Operation::Save => "Cannot store item",
            Operation::Remove => "Unable to remove",
            Operation::Fetch => "Unable to fetch",
        };
        write!(f, "{prefix}")
    }
}

#[derive(Error, Debug)]
pub enum OrmletError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Not found: no {resource} with key {key}")]
    NotFound { resource: String, key: String },
    #[error("{operation}: {message}")]
    Backend { operation: Operation, message: String },
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Parse error: {message}")]
    Parse { message: String, line: Option<usize>, col: Option<usize> },
    #[error("No driver installed, call use_driver first")]
    NoDriver,
}

pub type Result<T> = std::result::Result<T, OrmletError>;

impl OrmletError {
    /// Wraps a failure with the prefix of the operation it broke. Configuration
    /// and lookup failures are already descriptive and pass through untouched.
    pub fn during(self, operation: Operation) -> Self {
        match self {
            e @ (Self::Config(_) | Self::NotFound { .. } | Self::Backend { .. }) => e,
            other => Self::Backend { operation, message: other.to_string() },
        }
    }
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

// Helper conversions
impl From<rusqlite::Error> for OrmletError {
    fn from(e: rusqlite::Error) -> Self { Self::Persistence(e.to_string()) }
}
impl From<reqwest::Error> for OrmletError {
    fn from(e: reqwest::Error) -> Self { Self::Transport(e.to_string()) }
}
impl From<serde_json::Error> for OrmletError {
    fn from(e: serde_json::Error) -> Self { Self::Serialization(e.to_string()) }
}
impl From<config::ConfigError> for OrmletError {
    fn from(e: config::ConfigError) -> Self { Self::Config(e.to_string()) }
}
