//! Domain-level error taxonomy for DriveBench.
//!
//! Only failures that abort a whole run live here. Per-scenario failures
//! (transport, parsing, judge) are recovered in place and carried as values.

use std::path::PathBuf;

/// DriveBench domain errors.
#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    #[error("dataset not found: {path:?} ({reason})")]
    DatasetNotFound { path: PathBuf, reason: String },

    #[error("an assessment for agent '{0}' is already running")]
    RunInProgress(String),

    #[error("invalid driver endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("model error: {0}")]
    Llm(#[from] drivebench_llm::LlmError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for DriveBench domain operations.
pub type Result<T> = std::result::Result<T, BenchError>;
