//! Assessment orchestrator.
//!
//! One run moves through
//! `IDLE → PARTITIONING → SAMPLING → DISPATCHING → AGGREGATING → PERSISTED`.
//! Scenarios are dispatched strictly one after another; a failed dispatch
//! is scored as a critical failure and the run goes on. Only dataset
//! initialization and a concurrent run for the same agent abort a run.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use drivebench_llm::LanguageModel;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, Instrument};
use uuid::Uuid;

use crate::aggregate::Aggregator;
use crate::dataset::{ScenarioStore, SplitPolicy};
use crate::domain::{round_to, BenchError, Result, RunResult};
use crate::history::RunHistory;
use crate::obs;
use crate::prompt::build_task_message;
use crate::scoring::{ScoringEngine, ScoringPolicy};
use crate::transport::{DriverResponse, DriverTransport};

/// Lifecycle phase of one assessment run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Partitioning,
    Sampling,
    Dispatching,
    Aggregating,
    Persisted,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Idle => "IDLE",
            Phase::Partitioning => "PARTITIONING",
            Phase::Sampling => "SAMPLING",
            Phase::Dispatching => "DISPATCHING",
            Phase::Aggregating => "AGGREGATING",
            Phase::Persisted => "PERSISTED",
        }
    }
}

struct PhaseTracker {
    run_id: String,
    current: Phase,
}

impl PhaseTracker {
    fn new(run_id: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            current: Phase::Idle,
        }
    }

    fn advance(&mut self, to: Phase) {
        obs::emit_phase(&self.run_id, self.current.as_str(), to.as_str());
        self.current = to;
    }
}

/// Settings for every run of an [`Assessor`].
#[derive(Debug, Clone, PartialEq)]
pub struct AssessmentConfig {
    pub split_seed: u64,
    pub split: SplitPolicy,
    /// `None` draws a fresh test sample per run.
    pub sampling_seed: Option<u64>,
    pub few_shot_count: usize,
    pub scoring: ScoringPolicy,
}

impl Default for AssessmentConfig {
    fn default() -> Self {
        Self {
            split_seed: 42,
            split: SplitPolicy::default(),
            sampling_seed: None,
            few_shot_count: 5,
            scoring: ScoringPolicy::default(),
        }
    }
}

/// Runs assessments and records them in a shared [`RunHistory`].
pub struct Assessor {
    engine: ScoringEngine,
    aggregator: Aggregator,
    history: Arc<RunHistory>,
    config: AssessmentConfig,
    stores: Mutex<HashMap<PathBuf, Arc<ScenarioStore>>>,
}

impl Assessor {
    pub fn new(
        judge: Arc<dyn LanguageModel>,
        history: Arc<RunHistory>,
        config: AssessmentConfig,
    ) -> Self {
        Self {
            engine: ScoringEngine::new(Arc::clone(&judge), config.scoring.clone()),
            aggregator: Aggregator::new(judge, config.scoring.clone()),
            history,
            config,
            stores: Mutex::new(HashMap::new()),
        }
    }

    pub fn history(&self) -> &Arc<RunHistory> {
        &self.history
    }

    pub fn engine(&self) -> &ScoringEngine {
        &self.engine
    }

    /// Open the store for `dataset_path`, reusing an earlier partition.
    pub fn store(&self, dataset_path: &Path) -> Result<Arc<ScenarioStore>> {
        let mut stores = self.stores.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(store) = stores.get(dataset_path) {
            return Ok(Arc::clone(store));
        }
        let store = Arc::new(ScenarioStore::open_with_split(
            dataset_path,
            self.config.split_seed,
            self.config.split,
        )?);
        stores.insert(dataset_path.to_path_buf(), Arc::clone(&store));
        Ok(store)
    }

    /// Assess the driver behind `transport` and store the result under
    /// `agent_name`, replacing any earlier result for that name.
    pub async fn run_assessment(
        &self,
        transport: &dyn DriverTransport,
        dataset_path: &Path,
        limit: Option<usize>,
        agent_name: &str,
    ) -> Result<RunResult> {
        let lease = self.history.begin_run(agent_name)?;
        let run_id = Uuid::new_v4();
        let span = obs::run_span(&run_id.to_string(), agent_name);

        async move {
            let started = Instant::now();
            let run_key = run_id.to_string();
            let mut phase = PhaseTracker::new(&run_key);
            obs::emit_run_started(
                &run_key,
                agent_name,
                &dataset_path.display().to_string(),
                &transport.describe(),
            );

            phase.advance(Phase::Partitioning);
            let store = self.store(dataset_path)?;

            phase.advance(Phase::Sampling);
            let batch = store.prepare_runtime_batch(limit, self.config.sampling_seed);
            let mut rng = match self.config.sampling_seed {
                Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(1)),
                None => StdRng::from_os_rng(),
            };
            let examples = batch.sample_few_shot_examples(self.config.few_shot_count, &mut rng);
            let scenarios = batch.materialize_test_batch();
            info!(
                scenarios = scenarios.len(),
                examples = examples.len(),
                "few-shot context loaded"
            );

            phase.advance(Phase::Dispatching);
            let mut details = Vec::with_capacity(scenarios.len());
            for scenario in &scenarios {
                let message = build_task_message(scenario, &examples);
                let sent = Instant::now();
                let response = transport
                    .dispatch(&message, Some(scenario.image_reference.as_path()))
                    .await;
                let latency = round_to(sent.elapsed().as_secs_f64(), 2);
                if let DriverResponse::Failed(failure) = &response {
                    obs::emit_transport_failure(&scenario.id, failure);
                }
                details.push(self.engine.score(scenario, &response, latency).await);
            }

            phase.advance(Phase::Aggregating);
            let summary = self.aggregator.aggregate(agent_name, &details).await;
            let result = RunResult {
                run_id,
                agent_name: agent_name.to_string(),
                assessed_at: chrono::Utc::now(),
                summary,
                details,
            };

            lease.commit(result.clone());
            phase.advance(Phase::Persisted);
            obs::emit_run_finished(
                &run_key,
                started.elapsed().as_millis() as u64,
                result.summary.overall_score_percent,
                result.summary.overall_grade,
                result.summary.metrics.total_violations,
            );
            Ok::<_, BenchError>(result)
        }
        .instrument(span)
        .await
    }
}
