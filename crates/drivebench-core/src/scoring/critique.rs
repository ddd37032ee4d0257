//! One-sentence case critique.

use drivebench_llm::{CompletionRequest, LanguageModel};

pub const NEAR_PERFECT_CRITIQUE: &str = "Excellent reasoning; matches expert human driver logic.";
pub const CRITIQUE_UNAVAILABLE: &str = "Critique unavailable.";

pub fn critique_prompt(plan: &str, truth_plan: &str, score: f64, violations: &[String]) -> String {
    let violations = if violations.is_empty() {
        "None".to_string()
    } else {
        violations.join("; ")
    };
    format!(
        "Explain in 1 sentence why this plan got {:.2}/1.0.\nGT: {}\nStudent: {}\nViolations: {}",
        score, truth_plan, plan, violations
    )
}

/// Ask the judge for a critique; `None` when it fails or says nothing.
pub async fn request_critique(
    judge: &dyn LanguageModel,
    plan: &str,
    truth_plan: &str,
    score: f64,
    violations: &[String],
) -> Option<String> {
    let prompt = critique_prompt(plan, truth_plan, score, violations);
    let raw = judge
        .complete(CompletionRequest::deterministic(prompt))
        .await
        .ok()?;
    let text = raw.trim().replace('"', "");
    (!text.is_empty()).then_some(text)
}
