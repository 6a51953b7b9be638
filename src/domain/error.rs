//! Domain error types.

use serde::Serialize;
use std::fmt;

/// Coarse classification of a failure, carried alongside per-item results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    UpstreamUnavailable,
    InsufficientData,
    PartialFailure,
    Cancelled,
    Config,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::InvalidInput => "invalid input",
            ErrorKind::NotFound => "not found",
            ErrorKind::UpstreamUnavailable => "upstream unavailable",
            ErrorKind::InsufficientData => "insufficient data",
            ErrorKind::PartialFailure => "partial failure",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Config => "config",
            ErrorKind::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// Top-level error type for fundscreen.
#[derive(Debug, thiserror::Error)]
pub enum ScreenError {
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("{entity} not found: {code}")]
    NotFound { entity: &'static str, code: String },

    #[error("data provider unavailable: {reason}")]
    UpstreamUnavailable { reason: String },

    #[error("insufficient data: {reason}")]
    InsufficientData { reason: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("worker task failed: {reason}")]
    TaskFailed { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ScreenError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScreenError::InvalidInput { .. } => ErrorKind::InvalidInput,
            ScreenError::NotFound { .. } => ErrorKind::NotFound,
            ScreenError::UpstreamUnavailable { .. } => ErrorKind::UpstreamUnavailable,
            ScreenError::InsufficientData { .. } => ErrorKind::InsufficientData,
            ScreenError::Cancelled => ErrorKind::Cancelled,
            ScreenError::TaskFailed { .. } | ScreenError::Io(_) => ErrorKind::Internal,
            ScreenError::ConfigParse { .. }
            | ScreenError::ConfigMissing { .. }
            | ScreenError::ConfigInvalid { .. } => ErrorKind::Config,
        }
    }

    pub fn fund_not_found(code: &str) -> Self {
        ScreenError::NotFound {
            entity: "fund",
            code: code.to_string(),
        }
    }

    pub fn stock_not_found(code: &str) -> Self {
        ScreenError::NotFound {
            entity: "stock",
            code: code.to_string(),
        }
    }
}

/// A failure attached to one item of a batch instead of aborting the batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemFailure {
    pub kind: ErrorKind,
    pub reason: String,
}

impl From<&ScreenError> for ItemFailure {
    fn from(err: &ScreenError) -> Self {
        Self {
            kind: err.kind(),
            reason: err.to_string(),
        }
    }
}

impl From<ScreenError> for ItemFailure {
    fn from(err: ScreenError) -> Self {
        Self::from(&err)
    }
}

impl From<&ScreenError> for std::process::ExitCode {
    fn from(err: &ScreenError) -> Self {
        let code: u8 = match err {
            ScreenError::Io(_) | ScreenError::TaskFailed { .. } => 1,
            ScreenError::ConfigParse { .. }
            | ScreenError::ConfigMissing { .. }
            | ScreenError::ConfigInvalid { .. } => 2,
            ScreenError::UpstreamUnavailable { .. } | ScreenError::NotFound { .. } => 3,
            ScreenError::InvalidInput { .. } => 4,
            ScreenError::InsufficientData { .. } => 5,
            ScreenError::Cancelled => 130,
        };
        std::process::ExitCode::from(code)
    }
}
