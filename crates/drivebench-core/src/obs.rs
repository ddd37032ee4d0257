//! Structured observability hooks for the assessment lifecycle.
//!
//! This module provides:
//! - A run-scoped tracing span via [`run_span`]
//! - Emission functions for lifecycle events: run start, phase transitions,
//!   per-scenario scoring, recovered failures, run finish
//!
//! Events are emitted at `info!` level, recovered failures at `warn!`.
//! Filtering follows `RUST_LOG`; see [`crate::telemetry::init_tracing`].

use tracing::{info, warn};

use crate::domain::{Grade, ScenarioReport};
use crate::transport::TransportFailure;

/// Span that scopes every event of one run.
///
/// Attach it with `tracing::Instrument` so it survives `.await` points.
///
/// # Example
///
/// ```ignore
/// assess(...).instrument(run_span("6f1c...", "moondream")).await
/// // every event inside carries run_id and agent_name
/// ```
pub fn run_span(run_id: &str, agent_name: &str) -> tracing::Span {
    tracing::info_span!("drivebench.run", run_id = %run_id, agent_name = %agent_name)
}

pub fn emit_run_started(run_id: &str, agent_name: &str, dataset: &str, transport: &str) {
    info!(
        event = "run.started",
        run_id = %run_id,
        agent_name = %agent_name,
        dataset = %dataset,
        transport = %transport,
    );
}

/// Emit event: orchestrator moved between phases.
pub fn emit_phase(run_id: &str, from: &str, to: &str) {
    info!(event = "run.phase", run_id = %run_id, from = %from, to = %to);
}

pub fn emit_scenario_scored(report: &ScenarioReport) {
    info!(
        event = "scenario.scored",
        scenario_id = %report.id,
        perception = report.scores.perception,
        prediction = report.scores.prediction,
        planning = report.scores.planning,
        violations = report.violation_count,
        critical = report.critical_failure,
        latency_s = report.latency,
    );
}

pub fn emit_critical_failure(scenario_id: &str, reason: &str) {
    warn!(event = "scenario.critical", scenario_id = %scenario_id, reason = %reason);
}

pub fn emit_transport_failure(scenario_id: &str, failure: &TransportFailure) {
    warn!(
        event = "transport.failed",
        scenario_id = %scenario_id,
        kind = ?failure.kind,
        message = %failure.message,
    );
}

/// Emit event: the judge could not grade a field and the neutral default was used.
pub fn emit_judge_fallback(scenario_id: &str, field: &str, reason: &str) {
    warn!(
        event = "judge.fallback",
        scenario_id = %scenario_id,
        field = %field,
        reason = %reason,
    );
}

pub fn emit_run_finished(
    run_id: &str,
    duration_ms: u64,
    score_percent: f64,
    grade: Grade,
    total_violations: usize,
) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        score_percent = score_percent,
        grade = %grade,
        total_violations = total_violations,
    );
}
