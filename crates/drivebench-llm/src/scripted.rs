//! In-memory scripted model (testing only)
//!
//! Answers each prompt with the reply of the first rule whose needle occurs in
//! the prompt, or with the fallback reply. Every request is recorded.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::{CompletionRequest, LanguageModel, LlmError, Result};

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Fail(String),
}

#[derive(Debug, Clone)]
struct Rule {
    needle: String,
    reply: Reply,
}

/// Deterministic fake `LanguageModel`.
#[derive(Debug)]
pub struct ScriptedModel {
    rules: Vec<Rule>,
    fallback: Reply,
    calls: Mutex<Vec<CompletionRequest>>,
}

impl Default for ScriptedModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedModel {
    /// A model with no rules; every prompt fails until rules are added.
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            fallback: Reply::Fail("no scripted reply".to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Reply with `text` when the prompt contains `needle`.
    pub fn reply_when(mut self, needle: &str, text: &str) -> Self {
        self.rules.push(Rule {
            needle: needle.to_string(),
            reply: Reply::Text(text.to_string()),
        });
        self
    }

    /// Fail with `message` when the prompt contains `needle`.
    pub fn fail_when(mut self, needle: &str, message: &str) -> Self {
        self.rules.push(Rule {
            needle: needle.to_string(),
            reply: Reply::Fail(message.to_string()),
        });
        self
    }

    /// Reply with `text` when no rule matches.
    pub fn with_fallback(mut self, text: &str) -> Self {
        self.fallback = Reply::Text(text.to_string());
        self
    }

    /// Snapshot of every request received so far.
    pub fn calls(&self) -> Vec<CompletionRequest> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of requests received so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> String {
        "scripted".to_string()
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let reply = self
            .rules
            .iter()
            .find(|rule| request.prompt.contains(&rule.needle))
            .map(|rule| rule.reply.clone())
            .unwrap_or_else(|| self.fallback.clone());

        self.calls.lock().unwrap_or_else(|e| e.into_inner()).push(request);

        match reply {
            Reply::Text(text) => Ok(text),
            Reply::Fail(message) => Err(LlmError::Scripted(message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_matching_rule_wins() {
        let model = ScriptedModel::new()
            .reply_when("PLANNING", "SCORE: 9")
            .reply_when("PLAN", "SCORE: 1")
            .with_fallback("SCORE: 5");

        let planning = model
            .complete(CompletionRequest::new("CATEGORY: PLANNING"))
            .await
            .unwrap();
        assert_eq!(planning, "SCORE: 9");

        let other = model
            .complete(CompletionRequest::new("CATEGORY: PERCEPTION"))
            .await
            .unwrap();
        assert_eq!(other, "SCORE: 5");
        assert_eq!(model.call_count(), 2);
    }

    #[tokio::test]
    async fn test_unscripted_prompt_fails() {
        let model = ScriptedModel::new().fail_when("boom", "down");
        let err = model
            .complete(CompletionRequest::new("boom"))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Scripted(ref m) if m == "down"));

        let err = model
            .complete(CompletionRequest::new("anything"))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Scripted(_)));
    }
}
