//! Rubric-driven field grading through the judge model.
//!
//! The rubric is asymmetric. Perception is graded for hallucinated hazards
//! and terseness; planning is graded against the whole ground-truth context
//! so that caution toward a real hazard is rewarded and a stop for an absent
//! one is not.

use std::sync::OnceLock;

use drivebench_llm::{CompletionRequest, LanguageModel};
use regex::Regex;

use crate::domain::Field;

use super::policy::ScoringPolicy;

/// Result of grading one field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldGrade {
    /// The judge produced a usable score.
    Graded {
        score: f64,
        critique: Option<String>,
    },
    /// The judge failed; a neutral default stands in.
    Defaulted { score: f64, reason: String },
}

impl FieldGrade {
    pub fn score(&self) -> f64 {
        match self {
            FieldGrade::Graded { score, .. } | FieldGrade::Defaulted { score, .. } => *score,
        }
    }

    pub fn critique(&self) -> Option<&str> {
        match self {
            FieldGrade::Graded { critique, .. } => critique.as_deref(),
            FieldGrade::Defaulted { .. } => None,
        }
    }
}

fn rubric(field: Field) -> &'static str {
    match field {
        Field::Perception => {
            "SCORING RUBRIC (0-10):\n\
             - 9-10: Describes the same key objects and hazards as the truth.\n\
             - 5-8: Main hazard noticed, some details missed.\n\
             - 1-4: Vague, terse, or misses the main hazard.\n\
             - 0: Hallucination. Invents a hazard, signal or object the truth does not mention \
             (e.g. reports a red light when the truth says green)."
        }
        Field::Prediction => {
            "SCORING RUBRIC (0-10):\n\
             - 9-10: Anticipates the same behavior of other road users as the truth.\n\
             - 5-8: Reasonable anticipation with minor differences.\n\
             - 1-4: Generic or misses the relevant road users.\n\
             - 0: Predicts behavior that contradicts the truth."
        }
        Field::Planning => {
            "SCORING RUBRIC (0-10):\n\
             - 9-10: Close semantic match with the expected action.\n\
             - 7-10: Cautious action (slowing, yielding, stopping) toward a hazard that IS in the \
             truth context, even if phrased differently.\n\
             - 4 or less: Answers under 5 words, however correct they sound.\n\
             - 0: FALSE STOP. Acts on a hazard that is NOT in the truth context, or contradicts \
             the expected action (stop vs go)."
        }
    }
}

/// Grading prompt for one field.
///
/// `truth_context` is the composite ground truth the planning rubric
/// compares against; other fields compare against their own truth only.
pub fn rubric_prompt(field: Field, truth: &str, answer: &str, truth_context: &str) -> String {
    let truth_block = match field {
        Field::Planning => format!("TRUTH: {}\nTRUTH CONTEXT: {}", truth, truth_context),
        _ => format!("TRUTH: {}", truth),
    };
    format!(
        "Act as a Driving Instructor. Grade the Student against the Truth.\n\
         CATEGORY: {category}\n\
         {truth_block}\n\
         STUDENT: {answer}\n\n\
         {rubric}\n\n\
         INSTRUCTIONS:\n\
         1. Give a score from 0 to 10.\n\
         2. Write a 1-sentence critique.\n\
         3. Use this EXACT format:\n\
         SCORE: <number>\n\
         CRITIQUE: <text>",
        category = field.as_str().to_uppercase(),
        rubric = rubric(field),
    )
}

fn score_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)SCORE:\s*([0-9]*\.?[0-9]+)")
            .unwrap_or_else(|e| panic!("invalid score pattern: {e}"))
    })
}

fn number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"[0-9]*\.?[0-9]+").unwrap_or_else(|e| panic!("invalid number pattern: {e}"))
    })
}

fn critique_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?is)CRITIQUE:\s*(.*)").unwrap_or_else(|e| panic!("invalid critique pattern: {e}"))
    })
}

/// Extract a 0.0–1.0 score from judge output.
///
/// Prefers a `SCORE:` line, else the first bare number. The rubric asks for
/// 0–10, so the value is always divided by ten and then clamped.
pub fn parse_score(raw: &str) -> Option<f64> {
    let text = score_pattern()
        .captures(raw)
        .and_then(|c| c.get(1))
        .or_else(|| number_pattern().find(raw))?
        .as_str();
    let value: f64 = text.parse().ok()?;
    Some((value / 10.0).clamp(0.0, 1.0))
}

/// The text after `CRITIQUE:`, if any.
pub fn parse_critique(raw: &str) -> Option<String> {
    critique_pattern()
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().replace('"', ""))
        .filter(|s| !s.is_empty())
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Grade one field of the driver's answer.
pub async fn grade_field(
    judge: &dyn LanguageModel,
    field: Field,
    truth: &str,
    answer: &str,
    truth_context: &str,
    policy: &ScoringPolicy,
) -> FieldGrade {
    if answer.trim().is_empty() {
        return FieldGrade::Graded {
            score: 0.0,
            critique: Some(format!("No {} given.", field)),
        };
    }

    let request = CompletionRequest::deterministic(rubric_prompt(field, truth, answer, truth_context));
    let raw = match judge.complete(request).await {
        Ok(raw) => raw,
        Err(e) => {
            return FieldGrade::Defaulted {
                score: policy.neutral_score,
                reason: e.to_string(),
            }
        }
    };

    let Some(mut score) = parse_score(&raw) else {
        return FieldGrade::Defaulted {
            score: policy.neutral_score,
            reason: "no score in judge reply".to_string(),
        };
    };

    let capped = matches!(field, Field::Perception | Field::Planning);
    if capped && word_count(answer) < policy.short_answer_words {
        score = score.min(policy.short_answer_cap);
    }

    FieldGrade::Graded {
        score,
        critique: parse_critique(&raw),
    }
}
