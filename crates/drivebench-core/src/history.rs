//! Run history: the latest [`RunResult`] per agent name.
//!
//! Writes are serialized per agent through [`RunLease`]: at most one run per
//! agent name is in flight, and a second `begin_run` for the same name fails
//! with [`BenchError::RunInProgress`] until the first lease is dropped.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::domain::{BenchError, Result, RunResult};

#[derive(Debug, Default)]
struct HistoryState {
    results: BTreeMap<String, RunResult>,
    active: HashSet<String>,
}

/// Shared store of completed runs, keyed by agent name.
#[derive(Debug, Default)]
pub struct RunHistory {
    state: Mutex<HistoryState>,
}

impl RunHistory {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HistoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Reserve `agent_name` for one run.
    pub fn begin_run(self: &Arc<Self>, agent_name: &str) -> Result<RunLease> {
        let mut state = self.lock();
        if !state.active.insert(agent_name.to_string()) {
            return Err(BenchError::RunInProgress(agent_name.to_string()));
        }
        debug!(agent_name = %agent_name, "run lease acquired");
        Ok(RunLease {
            history: Arc::clone(self),
            agent_name: agent_name.to_string(),
        })
    }

    /// Latest result for an agent.
    pub fn get(&self, agent_name: &str) -> Option<RunResult> {
        self.lock().results.get(agent_name).cloned()
    }

    /// Every stored result, ordered by agent name.
    pub fn snapshot(&self) -> BTreeMap<String, RunResult> {
        self.lock().results.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True while a lease for `agent_name` is held.
    pub fn is_running(&self, agent_name: &str) -> bool {
        self.lock().active.contains(agent_name)
    }
}

/// Exclusive right to write one agent's result. Released on drop.
#[derive(Debug)]
pub struct RunLease {
    history: Arc<RunHistory>,
    agent_name: String,
}

impl RunLease {
    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    /// Store `result`, replacing any earlier result for this agent.
    pub fn commit(self, result: RunResult) {
        let mut state = self.history.lock();
        if state.results.insert(self.agent_name.clone(), result).is_some() {
            debug!(agent_name = %self.agent_name, "previous result overwritten");
        }
    }
}

impl Drop for RunLease {
    fn drop(&mut self) {
        self.history.lock().active.remove(&self.agent_name);
    }
}
