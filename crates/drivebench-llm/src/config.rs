//! Backend configuration for model clients.

use serde::{Deserialize, Serialize};

/// Which HTTP API a model is served through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Ollama `/api/chat`
    Ollama,
    /// Any OpenAI-compatible `/chat/completions` endpoint
    OpenAi,
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Ollama => "ollama",
            Backend::OpenAi => "openai",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ollama" => Some(Backend::Ollama),
            "openai" | "open_ai" | "openai-compatible" => Some(Backend::OpenAi),
            _ => None,
        }
    }

    fn default_base_url(self) -> &'static str {
        match self {
            Backend::Ollama => "http://localhost:11434",
            Backend::OpenAi => "https://api.openai.com/v1",
        }
    }
}

/// Model client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// HTTP API flavour
    pub backend: Backend,
    /// Model name as understood by the backend
    pub model: String,
    /// Base URL of the backend
    pub base_url: String,
    /// Bearer token (required for OpenAI)
    pub api_key: Option<String>,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            backend: Backend::Ollama,
            model: "llama3.2".to_string(),
            base_url: Backend::Ollama.default_base_url().to_string(),
            api_key: None,
            timeout_secs: 120,
        }
    }
}

impl ModelConfig {
    /// Create config for a specific backend and model, using the backend's default URL
    pub fn new(backend: Backend, model: &str) -> Self {
        ModelConfig {
            backend,
            model: model.to_string(),
            base_url: backend.default_base_url().to_string(),
            ..Default::default()
        }
    }

    /// Read `{PREFIX}_BACKEND`, `{PREFIX}_MODEL`, `{PREFIX}_URL`, `{PREFIX}_API_KEY`
    /// and `{PREFIX}_TIMEOUT_SECS` on top of `self`.
    ///
    /// `OPENAI_API_KEY` is used as a last resort for the OpenAI backend.
    pub fn with_env_overrides(mut self, prefix: &str) -> Self {
        let var = |name: &str| std::env::var(format!("{}_{}", prefix, name)).ok();

        if let Some(backend) = var("BACKEND").as_deref().and_then(Backend::parse) {
            if backend != self.backend && var("URL").is_none() {
                self.base_url = backend.default_base_url().to_string();
            }
            self.backend = backend;
        }
        if let Some(model) = var("MODEL") {
            self.model = model;
        }
        if let Some(url) = var("URL") {
            self.base_url = url;
        }
        if let Some(key) = var("API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(secs) = var("TIMEOUT_SECS").and_then(|s| s.parse().ok()) {
            self.timeout_secs = secs;
        }
        if self.api_key.is_none() && self.backend == Backend::OpenAi {
            self.api_key = std::env::var("OPENAI_API_KEY").ok();
        }
        self
    }

    /// Set authentication token
    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }

    /// Override the base URL
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }

    /// Join `path` onto the base URL without doubling slashes
    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
