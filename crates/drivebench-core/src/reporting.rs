use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::domain::{round_to, RunResult};
use crate::history::RunHistory;

pub const RESULTS_FILE: &str = "tournament_results.json";
pub const LEADERBOARD_FILE: &str = "leaderboard.md";

/// Paths written by [`generate_artifacts`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub results_json: PathBuf,
    pub leaderboard_md: PathBuf,
}

/// Copy of `result` with every reported number at its fixed precision.
pub fn rounded(result: &RunResult) -> RunResult {
    let mut out = result.clone();
    let metrics = &mut out.summary.metrics;
    metrics.perception = round_to(metrics.perception, 2);
    metrics.prediction = round_to(metrics.prediction, 2);
    metrics.planning = round_to(metrics.planning, 2);
    out.summary.overall_score_percent = round_to(out.summary.overall_score_percent, 1);
    for detail in &mut out.details {
        detail.scores.perception = round_to(detail.scores.perception, 3);
        detail.scores.prediction = round_to(detail.scores.prediction, 3);
        detail.scores.planning = round_to(detail.scores.planning, 3);
        detail.latency = round_to(detail.latency, 2);
    }
    out
}

/// Agent name → run result, agents sorted by name.
pub fn render_results_json(results: &BTreeMap<String, RunResult>) -> Result<String> {
    let rounded: BTreeMap<&str, RunResult> = results
        .iter()
        .map(|(name, result)| (name.as_str(), rounded(result)))
        .collect();
    serde_json::to_string_pretty(&rounded).context("serialize tournament results")
}

/// Markdown leaderboard ranked by overall score, ties broken by name.
pub fn render_leaderboard_md(results: &BTreeMap<String, RunResult>) -> String {
    let mut ranked: Vec<(&String, &RunResult)> = results.iter().collect();
    ranked.sort_by(|(an, a), (bn, b)| {
        b.summary
            .overall_score_percent
            .total_cmp(&a.summary.overall_score_percent)
            .then_with(|| an.cmp(bn))
    });

    let mut out = String::new();
    out.push_str("# DriveBench Leaderboard\n\n");
    if ranked.is_empty() {
        out.push_str("_No assessments recorded._\n");
        return out;
    }

    out.push_str(
        "| Rank | Agent | Grade | Score (%) | Perception | Prediction | Planning | Violations | Mean latency (s) |\n",
    );
    out.push_str("|---:|---|---|---:|---:|---:|---:|---:|---:|\n");
    for (rank, (name, result)) in ranked.iter().enumerate() {
        let summary = &result.summary;
        out.push_str(&format!(
            "| {} | {} | {} | {:.1} | {:.2} | {:.2} | {:.2} | {} | {:.2} |\n",
            rank + 1,
            name,
            summary.overall_grade,
            summary.overall_score_percent,
            summary.metrics.perception,
            summary.metrics.prediction,
            summary.metrics.planning,
            summary.metrics.total_violations,
            result.mean_latency(),
        ));
    }

    for (name, result) in &ranked {
        let analysis = &result.summary.analysis;
        out.push_str(&format!("\n## {}\n\n", name));
        if !analysis.weaknesses.is_empty() {
            out.push_str("### Weaknesses\n");
            for item in &analysis.weaknesses {
                out.push_str(&format!("- {}\n", item));
            }
        }
        if !analysis.recommendations.is_empty() {
            out.push_str("### Recommendations\n");
            for item in &analysis.recommendations {
                out.push_str(&format!("- {}\n", item));
            }
        }
    }
    out
}

/// Write tournament_results.json and leaderboard.md under `output_dir`.
pub fn generate_artifacts(history: &RunHistory, output_dir: &Path) -> Result<ArtifactPaths> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("create output dir {:?}", output_dir))?;
    let results = history.snapshot();

    let results_json = output_dir.join(RESULTS_FILE);
    let json = render_results_json(&results)?;
    std::fs::write(&results_json, json).with_context(|| format!("write {:?}", results_json))?;

    let leaderboard_md = output_dir.join(LEADERBOARD_FILE);
    std::fs::write(&leaderboard_md, render_leaderboard_md(&results))
        .with_context(|| format!("write {:?}", leaderboard_md))?;

    Ok(ArtifactPaths {
        results_json,
        leaderboard_md,
    })
}
