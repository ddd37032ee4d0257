//! DriveBench Core Library
//!
//! Assessment engine for vision-conditioned driving agents: a judge model
//! grades a driver's `{perception, prediction, planning}` answers against
//! held-out ground truth and checks the plan against traffic-law rules.
//!
//! Data flow for one run:
//!
//! ```text
//! Assessor → ScenarioStore (batch) → DriverTransport → normalizer
//!          → ScoringEngine (safety catalog) → Aggregator → RunHistory
//! ```

pub mod aggregate;
pub mod config;
pub mod dataset;
pub mod domain;
pub mod fakes;
pub mod history;
pub mod normalizer;
pub mod obs;
pub mod orchestrator;
pub mod prompt;
pub mod reporting;
pub mod safety;
pub mod scoring;
pub mod telemetry;
pub mod transport;
pub mod validation;

pub use domain::{
    BenchError, DriveRecord, FewShotExample, Field, FieldScores, GeneratedResponses, Grade,
    GroundTruth, QualitativeAnalysis, Result, RunMetrics, RunResult, RunSummary, Scenario,
    ScenarioReport,
};

pub use aggregate::{compute_metrics, Aggregator};
pub use config::{BenchConfig, DatasetConfig, DriverConfig};
pub use dataset::{RuntimeBatch, ScenarioStore, SplitPolicy};
pub use history::{RunHistory, RunLease};
pub use normalizer::{normalize, normalize_text, normalize_value};
pub use orchestrator::{AssessmentConfig, Assessor, Phase};
pub use prompt::build_task_message;
pub use reporting::{generate_artifacts, render_leaderboard_md, ArtifactPaths};
pub use safety::{active_rules, detect_violations};
pub use scoring::{CriticalFailure, FieldGrade, ScoringEngine, ScoringPolicy, Screening};
pub use transport::{
    normalize_endpoint, Driver, DriverResponse, DriverTransport, FailureKind,
    InProcessTransport, ModelDriver, RemoteTransport, TransportFailure,
};
pub use validation::{run_self_check, SelfCheckReport};
