//! Benchmark configuration.
//!
//! Layering, lowest first: defaults, an optional TOML file, `DRIVEBENCH_*`
//! environment variables. The binary applies its flags on top.
//!
//! ```toml
//! output_dir = "results"
//!
//! [dataset]
//! path = "dataset"
//! split_seed = 42
//! split = { kind = "train_count", value = 125 }
//!
//! [scoring]
//! pass_threshold = 0.7
//!
//! [judge]
//! backend = "ollama"
//! model = "llama3.2"
//!
//! [driver]
//! endpoint = "http://localhost:9000"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use drivebench_llm::{Backend, ModelConfig};
use serde::{Deserialize, Serialize};

use crate::dataset::SplitPolicy;
use crate::domain::{BenchError, Result};
use crate::orchestrator::AssessmentConfig;
use crate::scoring::ScoringPolicy;

pub const ENV_PREFIX: &str = "DRIVEBENCH";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub path: PathBuf,
    /// Seed of the train/test partition shuffle.
    pub split_seed: u64,
    pub split: SplitPolicy,
    pub few_shot_count: usize,
    /// Fixed seed for the per-run test sample; unset draws fresh each run.
    pub sampling_seed: Option<u64>,
    /// Test scenarios per run; unset runs the whole test partition.
    pub limit: Option<usize>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("dataset"),
            split_seed: 42,
            split: SplitPolicy::default(),
            few_shot_count: 5,
            sampling_seed: None,
            limit: Some(5),
        }
    }
}

/// Where the driver under test lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Remote driver service; when unset the local model is used.
    pub endpoint: Option<String>,
    /// Model for the in-process driver.
    pub model: ModelConfig,
    pub timeout_secs: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: ModelConfig::new(Backend::Ollama, "llava"),
            timeout_secs: 60,
        }
    }
}

impl DriverConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    pub dataset: DatasetConfig,
    pub scoring: ScoringPolicy,
    pub judge: ModelConfig,
    pub driver: DriverConfig,
    pub output_dir: PathBuf,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            dataset: DatasetConfig::default(),
            scoring: ScoringPolicy::default(),
            judge: ModelConfig::default(),
            driver: DriverConfig::default(),
            output_dir: PathBuf::from("results"),
        }
    }
}

impl BenchConfig {
    /// Defaults, then `path` if given, then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    BenchError::Config(format!("cannot read {}: {}", path.display(), e))
                })?;
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        Ok(config.with_env_overrides())
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| BenchError::Config(e.to_string()))
    }

    /// Apply `DRIVEBENCH_*` variables.
    pub fn with_env_overrides(mut self) -> Self {
        self.judge = self.judge.with_env_overrides(&format!("{}_JUDGE", ENV_PREFIX));
        self.driver.model = self
            .driver
            .model
            .with_env_overrides(&format!("{}_DRIVER", ENV_PREFIX));
        self.apply_vars(|name| std::env::var(format!("{}_{}", ENV_PREFIX, name)).ok())
    }

    fn apply_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(path) = var("DATASET") {
            self.dataset.path = PathBuf::from(path);
        }
        if let Some(seed) = var("SPLIT_SEED").and_then(|s| s.parse().ok()) {
            self.dataset.split_seed = seed;
        }
        if let Some(seed) = var("SAMPLING_SEED").and_then(|s| s.parse().ok()) {
            self.dataset.sampling_seed = Some(seed);
        }
        if let Some(limit) = var("LIMIT").and_then(|s| s.parse().ok()) {
            self.dataset.limit = Some(limit);
        }
        if let Some(endpoint) = var("DRIVER_ENDPOINT") {
            self.driver.endpoint = Some(endpoint);
        }
        if let Some(dir) = var("OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        self
    }

    /// Orchestrator settings derived from this configuration.
    pub fn assessment_config(&self) -> AssessmentConfig {
        AssessmentConfig {
            split_seed: self.dataset.split_seed,
            split: self.dataset.split,
            sampling_seed: self.dataset.sampling_seed,
            few_shot_count: self.dataset.few_shot_count,
            scoring: self.scoring.clone(),
        }
    }
}
