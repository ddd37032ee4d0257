//! Scoring policy: weights, thresholds and fallbacks.

use serde::{Deserialize, Serialize};

use crate::domain::{FieldScores, Grade};

/// Field weights for the overall score. Should sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldWeights {
    pub perception: f64,
    pub prediction: f64,
    pub planning: f64,
}

impl Default for FieldWeights {
    fn default() -> Self {
        Self {
            perception: 0.2,
            prediction: 0.3,
            planning: 0.5,
        }
    }
}

/// Tunable constants used by the scoring engine and the aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringPolicy {
    pub weights: FieldWeights,
    /// Weighted score (0.0–1.0) a run must exceed to pass.
    pub pass_threshold: f64,
    /// Plans shorter than this many characters are critical failures.
    pub min_plan_chars: usize,
    /// Planning score at or above which the canned critique is used.
    pub near_perfect: f64,
    /// Score used when the judge cannot grade a field.
    pub neutral_score: f64,
    /// Perception and planning answers under this many words are capped.
    pub short_answer_words: usize,
    pub short_answer_cap: f64,
    pub critical_penalty: f64,
    /// Critiques fed to the qualitative analysis.
    pub max_critiques: usize,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            weights: FieldWeights::default(),
            pass_threshold: 0.7,
            min_plan_chars: 3,
            near_perfect: 0.9,
            neutral_score: 0.5,
            short_answer_words: 5,
            short_answer_cap: 0.4,
            critical_penalty: 10.0,
            max_critiques: 15,
        }
    }
}

impl ScoringPolicy {
    /// Weighted score in 0.0–1.0.
    pub fn weighted(&self, scores: &FieldScores) -> f64 {
        self.weights.perception * scores.perception
            + self.weights.prediction * scores.prediction
            + self.weights.planning * scores.planning
    }

    /// PASS only above the threshold and with zero violations.
    pub fn grade(&self, weighted: f64, total_violations: usize) -> Grade {
        if weighted > self.pass_threshold && total_violations == 0 {
            Grade::Pass
        } else {
            Grade::Fail
        }
    }
}
