//! DriveBench LLM: model clients for judges and drivers
//!
//! This crate provides the language-model layer used by DriveBench.
//! The judge grades driver answers through it, and the in-process driver
//! answers driving tasks through it.
//!
//! ## Backends
//!
//! - [`OllamaClient`]: local Ollama server (`/api/chat`)
//! - [`OpenAiClient`]: OpenAI-compatible `/chat/completions`
//! - [`ScriptedModel`]: in-memory fake for tests

pub mod config;
pub mod error;
mod images;
pub mod ollama;
pub mod openai;
pub mod scripted;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

pub use config::{Backend, ModelConfig};
pub use error::LlmError;
pub use ollama::OllamaClient;
pub use openai::OpenAiClient;
pub use scripted::ScriptedModel;

/// Result type for model operations
pub type Result<T> = std::result::Result<T, LlmError>;

/// Seed pinned on every judge call so repeated grading is reproducible.
pub const JUDGE_SEED: u64 = 42;

/// A single prompt sent to a model.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// User prompt
    pub prompt: String,
    /// Images attached to the prompt
    pub images: Vec<PathBuf>,
    /// Ask the backend to force a JSON object as output
    pub json_output: bool,
    /// Sampling temperature
    pub temperature: f32,
    /// Sampling seed, where the backend supports one
    pub seed: Option<u64>,
}

impl CompletionRequest {
    /// A plain prompt with temperature 0 and no seed.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            images: Vec::new(),
            json_output: false,
            temperature: 0.0,
            seed: None,
        }
    }

    /// Judge-style request: temperature 0 and the fixed judge seed.
    pub fn deterministic(prompt: impl Into<String>) -> Self {
        Self::new(prompt).with_seed(JUDGE_SEED)
    }

    pub fn with_json_output(mut self) -> Self {
        self.json_output = true;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_image(mut self, path: impl Into<PathBuf>) -> Self {
        self.images.push(path.into());
        self
    }
}

/// A synchronous-per-call text completion service.
///
/// Implementations return the raw completion text; callers own parsing.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Short identifier used in logs (e.g. `ollama:llama3.2`).
    fn name(&self) -> String;

    /// Run one completion.
    async fn complete(&self, request: CompletionRequest) -> Result<String>;
}

/// Build a shared client for the configured backend.
pub fn build_model(config: &ModelConfig) -> Result<Arc<dyn LanguageModel>> {
    match config.backend {
        Backend::Ollama => Ok(Arc::new(OllamaClient::new(config.clone())?)),
        Backend::OpenAi => Ok(Arc::new(OpenAiClient::new(config.clone())?)),
    }
}

pub(crate) fn http_client(config: &ModelConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("drivebench-llm/", env!("CARGO_PKG_VERSION")))
        .timeout(std::time::Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}
