//! Safety rule catalog and violation detection.
//!
//! - [`catalog`]: static concept → constraint knowledge base
//! - [`detector`]: deterministic pair matching and the semantic audit prompt
//!
//! [`check_plan`] runs both and merges the results.

pub mod catalog;
pub mod detector;

use drivebench_llm::{CompletionRequest, LanguageModel};
use tracing::warn;

pub use catalog::{active_rules, SafetyRule};
pub use detector::{detect_violations, merge_violations, Violation};

/// Outcome of the semantic audit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SemanticVerdict {
    /// The judge answered; extra violations it found (possibly none).
    Checked(Vec<String>),
    /// The judge failed or answered with no usable verdict.
    Unavailable(String),
}

/// Ask the judge for violations the keyword pairs cannot see.
///
/// Skipped (checked, no findings) when the ground truth activates no rule.
pub async fn semantic_check(
    judge: &dyn LanguageModel,
    plan: &str,
    scene_text: &str,
    already_found: &[String],
) -> SemanticVerdict {
    let rules = active_rules(scene_text);
    if rules.is_empty() {
        return SemanticVerdict::Checked(Vec::new());
    }

    let prompt = detector::semantic_audit_prompt(plan, scene_text, &rules, already_found);
    let request = CompletionRequest::deterministic(prompt).with_json_output();
    match judge.complete(request).await {
        Ok(raw) => match detector::parse_semantic_verdict(&raw) {
            Some(found) => SemanticVerdict::Checked(found),
            None => SemanticVerdict::Unavailable("unparseable audit reply".to_string()),
        },
        Err(e) => SemanticVerdict::Unavailable(e.to_string()),
    }
}

/// Deterministic and semantic violations of `plan`, merged.
///
/// A failed audit degrades to the deterministic findings alone.
pub async fn check_plan(judge: &dyn LanguageModel, plan: &str, scene_text: &str) -> Vec<String> {
    let deterministic: Vec<String> = detect_violations(plan, scene_text)
        .iter()
        .map(Violation::message)
        .collect();

    match semantic_check(judge, plan, scene_text, &deterministic).await {
        SemanticVerdict::Checked(extra) => merge_violations(deterministic, extra),
        SemanticVerdict::Unavailable(reason) => {
            warn!(reason = %reason, "semantic safety audit unavailable, using keyword checks only");
            deterministic
        }
    }
}
