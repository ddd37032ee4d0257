//! OpenAI-compatible chat completions client

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::ModelConfig;
use crate::images::{encode_base64, mime_type};
use crate::{http_client, CompletionRequest, LanguageModel, LlmError, Result};

pub struct OpenAiClient {
    config: ModelConfig,
    http_client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(config: ModelConfig) -> Result<Self> {
        let http_client = http_client(&config)?;
        Ok(OpenAiClient {
            config,
            http_client,
        })
    }

    fn api_key(&self) -> Result<&str> {
        self.config
            .api_key
            .as_deref()
            .ok_or_else(|| LlmError::MissingApiKey {
                backend: "openai".to_string(),
            })
    }

    async fn request_body(&self, request: &CompletionRequest) -> Result<Value> {
        let content = if request.images.is_empty() {
            json!(request.prompt)
        } else {
            let mut parts = vec![json!({"type": "text", "text": request.prompt})];
            for path in &request.images {
                let data = encode_base64(path).await?;
                parts.push(json!({
                    "type": "image_url",
                    "image_url": {"url": format!("data:{};base64,{}", mime_type(path), data)},
                }));
            }
            Value::Array(parts)
        };

        let mut body = json!({
            "model": self.config.model,
            "messages": [{"role": "user", "content": content}],
            "temperature": request.temperature,
        });
        if let Some(seed) = request.seed {
            body["seed"] = json!(seed);
        }
        if request.json_output {
            body["response_format"] = json!({"type": "json_object"});
        }
        Ok(body)
    }
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    fn name(&self) -> String {
        format!("openai:{}", self.config.model)
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let api_key = self.api_key()?.to_string();
        let url = self.config.endpoint("chat/completions");
        let body = self.request_body(&request).await?;
        debug!(model = %self.config.model, json = request.json_output, "chat completion request");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status { status, body });
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| LlmError::Decode(format!("invalid JSON body: {}", e)))?;

        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| LlmError::Decode("missing choices[0].message.content".to_string()))?;
        if content.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(content.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Backend;

    fn client() -> OpenAiClient {
        OpenAiClient::new(ModelConfig::new(Backend::OpenAi, "gpt-4o-mini").with_api_key("sk-test"))
            .expect("client")
    }

    #[tokio::test]
    async fn test_request_body_plain_prompt() {
        let req = CompletionRequest::deterministic("grade").with_json_output();
        let body = client().request_body(&req).await.expect("body");

        assert_eq!(body["messages"][0]["content"], "grade");
        assert_eq!(body["seed"], 42);
        assert_eq!(body["temperature"], 0.0);
        assert_eq!(body["response_format"]["type"], "json_object");
    }

    #[tokio::test]
    async fn test_request_body_with_image_uses_data_url() {
        let dir = tempfile::tempdir().expect("tempdir");
        let image = dir.path().join("scene.png");
        std::fs::write(&image, b"abc").expect("write");

        let req = CompletionRequest::new("drive").with_image(&image);
        let body = client().request_body(&req).await.expect("body");

        let parts = body["messages"][0]["content"].as_array().expect("parts");
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1]["image_url"]["url"], "data:image/png;base64,YWJj");
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_before_request() {
        let client = OpenAiClient::new(ModelConfig::new(Backend::OpenAi, "gpt-4o-mini"))
            .expect("client");
        let err = client
            .complete(CompletionRequest::new("hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::MissingApiKey { .. }));
    }
}
