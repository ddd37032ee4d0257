//! Scenario and driving-record definitions.

use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};

use crate::normalizer::text_of;

/// The three graded fields of a driving decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Perception,
    Prediction,
    Planning,
}

impl Field {
    pub const ALL: [Field; 3] = [Field::Perception, Field::Prediction, Field::Planning];

    pub fn as_str(self) -> &'static str {
        match self {
            Field::Perception => "perception",
            Field::Prediction => "prediction",
            Field::Planning => "planning",
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical `{perception, prediction, planning}` record.
///
/// Used both for ground truth and for normalized driver answers. All three
/// keys are always present; an unrecoverable field is the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveRecord {
    #[serde(default, deserialize_with = "lenient_text")]
    pub perception: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub prediction: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub planning: String,
}

/// Expected reasoning for a scenario.
pub type GroundTruth = DriveRecord;

impl DriveRecord {
    pub fn new(perception: &str, prediction: &str, planning: &str) -> Self {
        Self {
            perception: perception.to_string(),
            prediction: prediction.to_string(),
            planning: planning.to_string(),
        }
    }

    pub fn field(&self, field: Field) -> &str {
        match field {
            Field::Perception => &self.perception,
            Field::Prediction => &self.prediction,
            Field::Planning => &self.planning,
        }
    }

    pub fn field_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::Perception => &mut self.perception,
            Field::Prediction => &mut self.prediction,
            Field::Planning => &mut self.planning,
        }
    }

    /// True when every field is blank.
    pub fn is_blank(&self) -> bool {
        Field::ALL.iter().all(|f| self.field(*f).trim().is_empty())
    }

    /// Scene facts used for safety checks: perception followed by planning.
    pub fn scene_text(&self) -> String {
        format!("{} {}", self.perception, self.planning)
    }
}

/// One labeled driving case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: String,
    pub image_reference: PathBuf,
    pub context: String,
    pub goal: String,
    pub ground_truth: GroundTruth,
}

/// A ground-truth case shown to the driver as in-context guidance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FewShotExample {
    pub context: String,
    pub response: GroundTruth,
}

/// On-disk description record (`descriptions/<stem>.json`).
///
/// Optional fields of any JSON type are stringified so an odd `id` never
/// costs the record its ground truth.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct DescriptionRecord {
    #[serde(default, deserialize_with = "lenient_optional_text")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_optional_text")]
    pub context: Option<String>,
    #[serde(default, deserialize_with = "lenient_optional_text")]
    pub goal: Option<String>,
    #[serde(flatten)]
    pub truth: GroundTruth,
}

fn lenient_text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(text_of(&value))
}

fn lenient_optional_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let text = text_of(&value);
    Ok((!text.is_empty()).then_some(text))
}
