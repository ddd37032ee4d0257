//! Driver transports.
//!
//! The orchestrator only sees [`DriverTransport`]. Two variants exist:
//!
//! - [`InProcessTransport`]: wraps any [`Driver`] living in this process
//!   (e.g. [`ModelDriver`]) under a timeout
//! - [`RemoteTransport`]: POSTs the task to a driver service over HTTP
//!
//! Dispatch never fails. Timeouts, connection errors, bad statuses and
//! driver errors all come back as [`DriverResponse::Failed`].

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use drivebench_llm::{CompletionRequest, LanguageModel};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::domain::{BenchError, Result};

/// Default round-trip bound for one dispatch.
pub const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Sampling temperature for model-backed drivers.
pub const DRIVER_TEMPERATURE: f32 = 0.6;

/// Why a dispatch produced no answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    Connection,
    Status,
    Driver,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl TransportFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// Raw outcome of one dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverResponse {
    /// A JSON body.
    Structured(Value),
    /// Free-form text.
    Text(String),
    Failed(TransportFailure),
}

impl DriverResponse {
    /// Classify a response body. `{"error": ...}` bodies are failures.
    pub fn from_body(body: &str) -> Self {
        match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(map)) if map.len() == 1 && map.contains_key("error") => {
                let message = match &map["error"] {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                DriverResponse::Failed(TransportFailure::new(FailureKind::Driver, message))
            }
            Ok(value @ Value::Object(_)) => DriverResponse::Structured(value),
            _ => DriverResponse::Text(body.to_string()),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, DriverResponse::Failed(_))
    }
}

/// What the orchestrator dispatches tasks through.
#[async_trait]
pub trait DriverTransport: Send + Sync {
    /// Human-readable target, for logs.
    fn describe(&self) -> String;

    /// Send one task and wait for the answer.
    async fn dispatch(&self, task_message: &str, image_reference: Option<&Path>) -> DriverResponse;
}

/// A driver that lives in this process.
#[async_trait]
pub trait Driver: Send + Sync {
    fn name(&self) -> String;

    async fn receive_task(&self, message: &str, image: Option<&Path>) -> Result<DriverResponse>;
}

/// Bounded-time adapter from [`Driver`] to [`DriverTransport`].
pub struct InProcessTransport {
    driver: Arc<dyn Driver>,
    timeout: Duration,
}

impl InProcessTransport {
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self {
            driver,
            timeout: DEFAULT_DISPATCH_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl DriverTransport for InProcessTransport {
    fn describe(&self) -> String {
        format!("in-process:{}", self.driver.name())
    }

    async fn dispatch(&self, task_message: &str, image_reference: Option<&Path>) -> DriverResponse {
        let call = self.driver.receive_task(task_message, image_reference);
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => DriverResponse::Failed(TransportFailure::new(
                FailureKind::Driver,
                format!("Agent Error: {}", e),
            )),
            Err(_) => DriverResponse::Failed(TransportFailure::new(
                FailureKind::Timeout,
                format!("no answer within {}s", self.timeout.as_secs_f64()),
            )),
        }
    }
}

/// In-process driver backed by a vision language model.
pub struct ModelDriver {
    model: Arc<dyn LanguageModel>,
    temperature: f32,
}

impl ModelDriver {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            temperature: DRIVER_TEMPERATURE,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
impl Driver for ModelDriver {
    fn name(&self) -> String {
        self.model.name()
    }

    async fn receive_task(&self, message: &str, image: Option<&Path>) -> Result<DriverResponse> {
        let mut request = CompletionRequest::new(message)
            .with_json_output()
            .with_temperature(self.temperature);
        if let Some(path) = image {
            request = request.with_image(path);
        }
        let raw = self.model.complete(request).await?;
        debug!(model = %self.model.name(), chars = raw.len(), "driver model answered");
        Ok(DriverResponse::Text(raw))
    }
}

/// Validate and canonicalize a driver endpoint.
///
/// A missing scheme defaults to `http://`; trailing slashes are dropped.
pub fn normalize_endpoint(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(BenchError::InvalidEndpoint {
            endpoint: raw.to_string(),
            reason: "endpoint is empty".to_string(),
        });
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };
    let endpoint = with_scheme.trim_end_matches('/').to_string();

    let url = reqwest::Url::parse(&endpoint).map_err(|e| BenchError::InvalidEndpoint {
        endpoint: raw.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(BenchError::InvalidEndpoint {
            endpoint: raw.to_string(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    if url.host_str().is_none() {
        return Err(BenchError::InvalidEndpoint {
            endpoint: raw.to_string(),
            reason: "missing host".to_string(),
        });
    }
    Ok(endpoint)
}

/// HTTP adapter for a driver running as a separate service.
///
/// Wire format: `POST <endpoint>` with `{"message": ..., "image_path": ...}`.
pub struct RemoteTransport {
    endpoint: String,
    client: reqwest::Client,
}

impl RemoteTransport {
    pub fn new(endpoint: &str) -> Result<Self> {
        Self::with_timeout(endpoint, DEFAULT_DISPATCH_TIMEOUT)
    }

    pub fn with_timeout(endpoint: &str, timeout: Duration) -> Result<Self> {
        let endpoint = normalize_endpoint(endpoint)?;
        let client = reqwest::Client::builder()
            .user_agent(concat!("drivebench/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| BenchError::Config(format!("http client: {}", e)))?;
        Ok(Self { endpoint, client })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl DriverTransport for RemoteTransport {
    fn describe(&self) -> String {
        format!("remote:{}", self.endpoint)
    }

    async fn dispatch(&self, task_message: &str, image_reference: Option<&Path>) -> DriverResponse {
        let payload = json!({
            "message": task_message,
            "image_path": image_reference.map(|p| p.display().to_string()),
        });

        let response = match self.client.post(&self.endpoint).json(&payload).send().await {
            Ok(response) => response,
            Err(e) => {
                let kind = if e.is_timeout() {
                    FailureKind::Timeout
                } else {
                    FailureKind::Connection
                };
                warn!(endpoint = %self.endpoint, error = %e, "remote driver unreachable");
                return DriverResponse::Failed(TransportFailure::new(
                    kind,
                    format!("Remote Connection Failed: {}", e),
                ));
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return DriverResponse::Failed(TransportFailure::new(
                    FailureKind::Connection,
                    format!("Remote Connection Failed: {}", e),
                ))
            }
        };

        if !status.is_success() {
            return DriverResponse::Failed(TransportFailure::new(
                FailureKind::Status,
                format!("HTTP {}: {}", status.as_u16(), body.chars().take(200).collect::<String>()),
            ));
        }

        DriverResponse::from_body(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drivebench_llm::ScriptedModel;

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(normalize_endpoint("localhost:9000/").unwrap(), "http://localhost:9000");
        assert_eq!(
            normalize_endpoint(" https://driver.example.com/api// ").unwrap(),
            "https://driver.example.com/api"
        );
        assert_eq!(normalize_endpoint("http://10.0.0.5:8001").unwrap(), "http://10.0.0.5:8001");
    }

    #[test]
    fn test_normalize_endpoint_rejects_garbage() {
        assert!(matches!(
            normalize_endpoint(""),
            Err(BenchError::InvalidEndpoint { .. })
        ));
        assert!(matches!(
            normalize_endpoint("ftp://host"),
            Err(BenchError::InvalidEndpoint { .. })
        ));
        assert!(matches!(
            normalize_endpoint("http://"),
            Err(BenchError::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn test_from_body() {
        assert!(matches!(
            DriverResponse::from_body(r#"{"planning": "Stop."}"#),
            DriverResponse::Structured(_)
        ));
        assert!(matches!(
            DriverResponse::from_body("just stop"),
            DriverResponse::Text(_)
        ));
        match DriverResponse::from_body(r#"{"error": "Remote Connection Failed: refused"}"#) {
            DriverResponse::Failed(f) => {
                assert_eq!(f.kind, FailureKind::Driver);
                assert!(f.message.contains("refused"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_remote_is_failed_response() {
        let transport =
            RemoteTransport::with_timeout("127.0.0.1:1", Duration::from_secs(2)).unwrap();
        let response = transport.dispatch("task", None).await;
        match response {
            DriverResponse::Failed(f) => assert!(f.message.starts_with("Remote Connection Failed")),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_model_driver_uses_json_mode_and_image() {
        let model = Arc::new(ScriptedModel::new().with_fallback(r#"{"planning": "Stop."}"#));
        let driver = ModelDriver::new(model.clone());
        let response = driver
            .receive_task("SYSTEM TASK", Some(Path::new("/data/images/1.jpg")))
            .await
            .unwrap();
        assert_eq!(response, DriverResponse::Text(r#"{"planning": "Stop."}"#.to_string()));

        let call = &model.calls()[0];
        assert!(call.json_output);
        assert_eq!(call.temperature, DRIVER_TEMPERATURE);
        assert_eq!(call.images.len(), 1);
    }

    #[tokio::test]
    async fn test_in_process_driver_error_becomes_failure() {
        let driver = Arc::new(ModelDriver::new(Arc::new(ScriptedModel::new())));
        let transport = InProcessTransport::new(driver);
        match transport.dispatch("task", None).await {
            DriverResponse::Failed(f) => {
                assert_eq!(f.kind, FailureKind::Driver);
                assert!(f.message.starts_with("Agent Error"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(transport.describe(), "in-process:scripted");
    }

    struct SlowDriver;

    #[async_trait]
    impl Driver for SlowDriver {
        fn name(&self) -> String {
            "slow".to_string()
        }

        async fn receive_task(&self, _: &str, _: Option<&Path>) -> Result<DriverResponse> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(DriverResponse::Text("late".to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_process_timeout() {
        let transport =
            InProcessTransport::new(Arc::new(SlowDriver)).with_timeout(Duration::from_secs(60));
        match transport.dispatch("task", None).await {
            DriverResponse::Failed(f) => assert_eq!(f.kind, FailureKind::Timeout),
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
