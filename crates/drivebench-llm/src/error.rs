//! Error types for drivebench-llm

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while talking to a language-model backend
#[derive(Error, Debug)]
pub enum LlmError {
    /// Transport-level failure (DNS, connect, TLS, timeout)
    #[error("model request failed: {0}")]
    Request(String),

    /// Backend answered with a non-success status
    #[error("model backend returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body did not have the expected shape
    #[error("unexpected model response: {0}")]
    Decode(String),

    /// Backend returned an empty completion
    #[error("model returned an empty completion")]
    EmptyResponse,

    /// Backend requires an API key and none was configured
    #[error("missing API key for {backend} backend")]
    MissingApiKey { backend: String },

    /// Image attachment could not be read
    #[error("failed to read image {path:?}: {message}")]
    Image { path: PathBuf, message: String },

    /// Failure injected by a scripted model
    #[error("scripted failure: {0}")]
    Scripted(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Request(err.to_string())
    }
}
