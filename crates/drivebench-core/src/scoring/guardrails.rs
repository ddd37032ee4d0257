//! Guardrails that classify unusable answers before any grading.

use crate::domain::{DriveRecord, Field};
use crate::prompt::SCHEMA_PLACEHOLDERS;

use super::policy::ScoringPolicy;

/// Older schema text some drivers were trained on; matched as substrings.
const LEGACY_PLACEHOLDERS: [&str; 3] = [
    "string (detailed observation)",
    "string (anticipation)",
    "string (action)",
];

/// Schema words that only count when they are a field's entire answer.
const BARE_PLACEHOLDERS: [&str; 4] = ["Detailed observation", "Anticipation", "Action", "string"];

/// Error markers that make a plan invalid (case-sensitive).
const INVALID_PLAN_MARKERS: [&str; 4] = ["N/A", "Error", "Parsing failed", "Agent Error"];

/// Why an answer was rejected outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CriticalFailure {
    CopiedSchema,
    InvalidPlan,
}

impl CriticalFailure {
    pub fn message(self) -> &'static str {
        match self {
            CriticalFailure::CopiedSchema => {
                "CRITICAL: Agent copied prompt schema instead of generating answer."
            }
            CriticalFailure::InvalidPlan => "CRITICAL: Agent failed to generate a valid plan.",
        }
    }
}

fn echoes_schema(record: &DriveRecord) -> bool {
    Field::ALL.iter().any(|field| {
        let text = record.field(*field);
        let lower = text.to_lowercase();
        let substring_hit = SCHEMA_PLACEHOLDERS
            .iter()
            .chain(LEGACY_PLACEHOLDERS.iter())
            .any(|ph| lower.contains(&ph.to_lowercase()));
        let bare_hit = BARE_PLACEHOLDERS
            .iter()
            .any(|ph| text.trim().eq_ignore_ascii_case(ph));
        substring_hit || bare_hit
    })
}

fn invalid_plan(plan: &str, policy: &ScoringPolicy) -> bool {
    let plan = plan.trim();
    plan.is_empty()
        || plan.chars().count() < policy.min_plan_chars
        || INVALID_PLAN_MARKERS.iter().any(|m| plan.contains(m))
}

/// Classify a normalized answer; `None` when it can be graded.
pub fn check(record: &DriveRecord, policy: &ScoringPolicy) -> Option<CriticalFailure> {
    if echoes_schema(record) {
        Some(CriticalFailure::CopiedSchema)
    } else if invalid_plan(&record.planning, policy) {
        Some(CriticalFailure::InvalidPlan)
    } else {
        None
    }
}
