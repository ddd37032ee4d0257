//! In-memory driver fake (testing only)
//!
//! `StaticDriver` answers every task with the same canned response and
//! records what it was sent. It is both a [`Driver`] and a
//! [`DriverTransport`], so tests can skip the timeout adapter.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::Result;
use crate::transport::{Driver, DriverResponse, DriverTransport, FailureKind, TransportFailure};

/// One recorded dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedTask {
    pub message: String,
    pub image: Option<PathBuf>,
}

#[derive(Debug)]
pub struct StaticDriver {
    name: String,
    response: DriverResponse,
    tasks: Mutex<Vec<RecordedTask>>,
}

impl StaticDriver {
    pub fn new(name: &str, response: DriverResponse) -> Self {
        Self {
            name: name.to_string(),
            response,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Always answers with this JSON value.
    pub fn structured(name: &str, value: Value) -> Self {
        Self::new(name, DriverResponse::Structured(value))
    }

    /// Always answers with this text.
    pub fn text(name: &str, text: &str) -> Self {
        Self::new(name, DriverResponse::Text(text.to_string()))
    }

    /// Always fails as if the connection were refused.
    pub fn failing(name: &str) -> Self {
        Self::new(
            name,
            DriverResponse::Failed(TransportFailure::new(
                FailureKind::Connection,
                "Remote Connection Failed: connection refused",
            )),
        )
    }

    pub fn tasks(&self) -> Vec<RecordedTask> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn record(&self, message: &str, image: Option<&Path>) -> DriverResponse {
        self.tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedTask {
                message: message.to_string(),
                image: image.map(Path::to_path_buf),
            });
        self.response.clone()
    }
}

#[async_trait]
impl Driver for StaticDriver {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn receive_task(&self, message: &str, image: Option<&Path>) -> Result<DriverResponse> {
        Ok(self.record(message, image))
    }
}

#[async_trait]
impl DriverTransport for StaticDriver {
    fn describe(&self) -> String {
        format!("static:{}", self.name)
    }

    async fn dispatch(&self, task_message: &str, image_reference: Option<&Path>) -> DriverResponse {
        self.record(task_message, image_reference)
    }
}
