//! Per-scenario reports and run-level results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::scenario::Field;

/// Field scores in 0.0–1.0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldScores {
    pub perception: f64,
    pub prediction: f64,
    pub planning: f64,
}

impl FieldScores {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn get(&self, field: Field) -> f64 {
        match field {
            Field::Perception => self.perception,
            Field::Prediction => self.prediction,
            Field::Planning => self.planning,
        }
    }

    pub fn set(&mut self, field: Field, score: f64) {
        match field {
            Field::Perception => self.perception = score,
            Field::Prediction => self.prediction = score,
            Field::Planning => self.planning = score,
        }
    }
}

/// Echo of what the driver said, next to the expected plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratedResponses {
    pub perception: String,
    pub prediction: String,
    pub planning: String,
    pub gt_planning_context: String,
}

/// Judged outcome for one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub id: String,
    /// Image handle, kept so report renderers can embed the frame.
    pub image_reference: String,
    pub scores: FieldScores,
    /// Safety violations, or the critical-failure reason.
    pub violations: Vec<String>,
    pub violation_count: usize,
    pub penalty: f64,
    /// True when the answer was unusable and grading was skipped.
    pub critical_failure: bool,
    pub critique: String,
    /// Driver round trip in seconds.
    pub latency: f64,
    pub generated_responses: GeneratedResponses,
}

/// Categorical run grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Grade {
    Pass,
    Fail,
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Grade::Pass => f.write_str("PASS"),
            Grade::Fail => f.write_str("FAIL"),
        }
    }
}

/// Mean field scores and the violation total for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub perception: f64,
    pub prediction: f64,
    pub planning: f64,
    pub total_violations: usize,
}

/// Qualitative summary of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualitativeAnalysis {
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Graded summary of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub metrics: RunMetrics,
    /// Weighted score as a percentage (0–100).
    pub overall_score_percent: f64,
    pub overall_grade: Grade,
    pub scenario_count: usize,
    pub analysis: QualitativeAnalysis,
}

/// One full assessment of one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: Uuid,
    pub agent_name: String,
    pub assessed_at: DateTime<Utc>,
    pub summary: RunSummary,
    /// Per-scenario reports in dispatch order.
    pub details: Vec<ScenarioReport>,
}

impl RunResult {
    /// Mean driver latency in seconds, 0.0 for an empty run.
    pub fn mean_latency(&self) -> f64 {
        if self.details.is_empty() {
            return 0.0;
        }
        self.details.iter().map(|d| d.latency).sum::<f64>() / self.details.len() as f64
    }
}

/// Round half away from zero to `places` decimals.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
