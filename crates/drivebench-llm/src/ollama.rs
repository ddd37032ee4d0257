//! Ollama chat client
//!
//! Talks to a local or remote Ollama server through `/api/chat` with
//! streaming disabled.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::ModelConfig;
use crate::images::encode_base64;
use crate::{http_client, CompletionRequest, LanguageModel, LlmError, Result};

/// Ollama client
pub struct OllamaClient {
    config: ModelConfig,
    http_client: reqwest::Client,
}

impl OllamaClient {
    /// Create a new Ollama client
    pub fn new(config: ModelConfig) -> Result<Self> {
        let http_client = http_client(&config)?;
        Ok(OllamaClient {
            config,
            http_client,
        })
    }

    async fn request_body(&self, request: &CompletionRequest) -> Result<Value> {
        let mut message = json!({
            "role": "user",
            "content": request.prompt,
        });

        if !request.images.is_empty() {
            let mut encoded = Vec::with_capacity(request.images.len());
            for path in &request.images {
                encoded.push(encode_base64(path).await?);
            }
            message["images"] = json!(encoded);
        }

        let mut options = json!({ "temperature": request.temperature });
        if let Some(seed) = request.seed {
            options["seed"] = json!(seed);
        }

        let mut body = json!({
            "model": self.config.model,
            "messages": [message],
            "stream": false,
            "options": options,
        });
        if request.json_output {
            body["format"] = json!("json");
        }
        Ok(body)
    }
}

#[async_trait]
impl LanguageModel for OllamaClient {
    fn name(&self) -> String {
        format!("ollama:{}", self.config.model)
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let url = self.config.endpoint("api/chat");
        let body = self.request_body(&request).await?;
        debug!(model = %self.config.model, json = request.json_output, "ollama chat request");

        let response = self.http_client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status { status, body });
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| LlmError::Decode(format!("invalid JSON body: {}", e)))?;

        extract_content(&json)
    }
}

fn extract_content(json: &Value) -> Result<String> {
    let content = json["message"]["content"]
        .as_str()
        .ok_or_else(|| LlmError::Decode("missing message.content".to_string()))?;
    if content.trim().is_empty() {
        return Err(LlmError::EmptyResponse);
    }
    Ok(content.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_request_body_pins_options_and_format() {
        let client = OllamaClient::new(ModelConfig::default()).expect("client");
        let req = CompletionRequest::deterministic("grade").with_json_output();
        let body = client.request_body(&req).await.expect("body");

        assert_eq!(body["model"], "llama3.2");
        assert_eq!(body["stream"], false);
        assert_eq!(body["format"], "json");
        assert_eq!(body["options"]["temperature"], 0.0);
        assert_eq!(body["options"]["seed"], 42);
        assert!(body["messages"][0].get("images").is_none());
    }

    #[tokio::test]
    async fn test_request_body_attaches_images() {
        let dir = tempfile::tempdir().expect("tempdir");
        let image = dir.path().join("scene.jpg");
        std::fs::write(&image, b"abc").expect("write");

        let client = OllamaClient::new(ModelConfig::default()).expect("client");
        let req = CompletionRequest::new("drive").with_image(&image);
        let body = client.request_body(&req).await.expect("body");

        assert_eq!(body["messages"][0]["images"][0], "YWJj");
        assert!(body.get("format").is_none());
        assert!(body["options"].get("seed").is_none());
    }

    #[test]
    fn test_extract_content() {
        let ok = json!({"message": {"content": "SCORE: 8"}});
        assert_eq!(extract_content(&ok).unwrap(), "SCORE: 8");

        let empty = json!({"message": {"content": "  "}});
        assert!(matches!(extract_content(&empty), Err(LlmError::EmptyResponse)));

        let missing = json!({"done": true});
        assert!(matches!(extract_content(&missing), Err(LlmError::Decode(_))));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_request_error() {
        let config = ModelConfig::default().with_base_url("http://127.0.0.1:1");
        let client = OllamaClient::new(config).expect("client");
        let err = client
            .complete(CompletionRequest::new("hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Request(_)));
    }
}
