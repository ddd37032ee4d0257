//! Domain models for DriveBench.
//!
//! Canonical definitions for the core entities:
//! - `Scenario`: one labeled driving image with its ground truth
//! - `DriveRecord`: the `{perception, prediction, planning}` triple
//! - `ScenarioReport`: judged outcome for one scenario
//! - `RunResult`: one full assessment of one agent

pub mod error;
pub mod report;
pub mod scenario;

pub use error::{BenchError, Result};
pub use report::{
    round_to, FieldScores, GeneratedResponses, Grade, QualitativeAnalysis, RunMetrics, RunResult,
    RunSummary, ScenarioReport,
};
pub use scenario::{DriveRecord, Field, FewShotExample, GroundTruth, Scenario};
