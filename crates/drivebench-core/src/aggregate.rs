//! Aggregation of per-scenario reports into a graded run summary.

use std::sync::Arc;

use drivebench_llm::{CompletionRequest, LanguageModel};
use serde_json::Value;
use tracing::warn;

use crate::domain::{
    round_to, FieldScores, Grade, QualitativeAnalysis, RunMetrics, RunSummary, ScenarioReport,
};
use crate::scoring::ScoringPolicy;

const SILENT_FAILURE: &str = "System failed silently or produced invalid output.";

/// Unrounded metrics and weighted score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Computed {
    pub means: FieldScores,
    pub total_violations: usize,
    /// Weighted score in 0.0–1.0.
    pub weighted: f64,
}

/// Means, violation total and weighted score. `None` for an empty run.
pub fn compute_metrics(reports: &[ScenarioReport], policy: &ScoringPolicy) -> Option<Computed> {
    if reports.is_empty() {
        return None;
    }
    let n = reports.len() as f64;
    let means = FieldScores {
        perception: reports.iter().map(|r| r.scores.perception).sum::<f64>() / n,
        prediction: reports.iter().map(|r| r.scores.prediction).sum::<f64>() / n,
        planning: reports.iter().map(|r| r.scores.planning).sum::<f64>() / n,
    };
    Some(Computed {
        means,
        total_violations: reports.iter().map(|r| r.violation_count).sum(),
        weighted: policy.weighted(&means),
    })
}

/// Critiques of cases worth summarizing: low planning or critical.
pub fn collect_critiques(reports: &[ScenarioReport], policy: &ScoringPolicy) -> Vec<String> {
    reports
        .iter()
        .filter(|r| r.scores.planning < policy.near_perfect || r.critique.contains("CRITICAL"))
        .map(|r| r.critique.clone())
        .take(policy.max_critiques)
        .collect()
}

pub fn no_issues_analysis() -> QualitativeAnalysis {
    QualitativeAnalysis {
        strengths: vec![
            "Perfect adherence to safety rules.".to_string(),
            "High alignment with Ground Truth.".to_string(),
        ],
        weaknesses: vec!["None detected.".to_string()],
        recommendations: vec!["Ready for production deployment.".to_string()],
    }
}

pub fn fallback_analysis() -> QualitativeAnalysis {
    QualitativeAnalysis {
        strengths: vec!["System operational.".to_string()],
        weaknesses: vec![
            "Repeated prompt template copying observed.".to_string(),
            "Failure to follow JSON schema.".to_string(),
        ],
        recommendations: vec!["Improve White Agent prompt adherence.".to_string()],
    }
}

pub fn analysis_prompt(agent_name: &str, critiques: &[String], total_violations: usize) -> String {
    let failures = critiques
        .iter()
        .map(|c| format!("- {}", c))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "You are a Lead Engineer. Analyze these failure logs for '{agent_name}'.\n\
         FAILURES:\n{failures}\n\
         TOTAL VIOLATIONS: {total_violations}\n\n\
         TASK: Summarize the primary failure mode.\n\
         Return strict JSON: {{ \"strengths\": [str], \"weaknesses\": [str], \"recommendations\": [str] }}"
    )
}

fn clean_list(value: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .iter()
        .map(|item| match item {
            Value::String(s) => s.clone(),
            Value::Object(map) => map
                .get("description")
                .or_else(|| map.get("issue"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| item.to_string()),
            other => other.to_string(),
        })
        .collect()
}

/// Parse the analysis reply; `None` without a JSON object in it.
pub fn parse_analysis(raw: &str) -> Option<QualitativeAnalysis> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    let value: Value = serde_json::from_str(&raw[start..=end]).ok()?;
    value.as_object()?;
    Some(QualitativeAnalysis {
        strengths: clean_list(value.get("strengths")),
        weaknesses: clean_list(value.get("weaknesses")),
        recommendations: clean_list(value.get("recommendations")),
    })
}

/// Reduces reports into a [`RunSummary`].
#[derive(Clone)]
pub struct Aggregator {
    judge: Arc<dyn LanguageModel>,
    policy: ScoringPolicy,
}

impl Aggregator {
    pub fn new(judge: Arc<dyn LanguageModel>, policy: ScoringPolicy) -> Self {
        Self { judge, policy }
    }

    /// Summarize one run. Never fails; an empty run is a FAIL with zeros.
    pub async fn aggregate(&self, agent_name: &str, reports: &[ScenarioReport]) -> RunSummary {
        let Some(computed) = compute_metrics(reports, &self.policy) else {
            warn!(agent_name = %agent_name, "no scenario reports to aggregate");
            return RunSummary {
                metrics: RunMetrics::default(),
                overall_score_percent: 0.0,
                overall_grade: Grade::Fail,
                scenario_count: 0,
                analysis: QualitativeAnalysis::default(),
            };
        };

        let critiques = collect_critiques(reports, &self.policy);
        let analysis = self
            .analyze(agent_name, critiques, computed.total_violations)
            .await;

        RunSummary {
            metrics: RunMetrics {
                perception: round_to(computed.means.perception, 2),
                prediction: round_to(computed.means.prediction, 2),
                planning: round_to(computed.means.planning, 2),
                total_violations: computed.total_violations,
            },
            overall_score_percent: round_to(computed.weighted * 100.0, 1),
            overall_grade: self.policy.grade(computed.weighted, computed.total_violations),
            scenario_count: reports.len(),
            analysis,
        }
    }

    async fn analyze(
        &self,
        agent_name: &str,
        mut critiques: Vec<String>,
        total_violations: usize,
    ) -> QualitativeAnalysis {
        if critiques.is_empty() {
            if total_violations == 0 {
                return no_issues_analysis();
            }
            critiques.push(SILENT_FAILURE.to_string());
        }

        let prompt = analysis_prompt(agent_name, &critiques, total_violations);
        match self
            .judge
            .complete(CompletionRequest::deterministic(prompt).with_json_output())
            .await
        {
            Ok(raw) => parse_analysis(&raw).unwrap_or_else(|| {
                warn!(agent_name = %agent_name, "analysis reply unparseable, using fallback");
                fallback_analysis()
            }),
            Err(e) => {
                warn!(agent_name = %agent_name, error = %e, "analysis unavailable, using fallback");
                fallback_analysis()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::GeneratedResponses;
    use drivebench_llm::ScriptedModel;

    fn report(p: f64, r: f64, l: f64, violations: usize, critique: &str) -> ScenarioReport {
        ScenarioReport {
            id: "x".to_string(),
            image_reference: "x.jpg".to_string(),
            scores: FieldScores {
                perception: p,
                prediction: r,
                planning: l,
            },
            violations: vec!["v".to_string(); violations],
            violation_count: violations,
            penalty: violations as f64,
            critical_failure: false,
            critique: critique.to_string(),
            latency: 1.0,
            generated_responses: GeneratedResponses::default(),
        }
    }

    fn aggregator(judge: ScriptedModel) -> Aggregator {
        Aggregator::new(Arc::new(judge), ScoringPolicy::default())
    }

    #[tokio::test]
    async fn test_weighted_formula() {
        let judge = ScriptedModel::new()
            .with_fallback(r#"{"strengths": ["Fast"], "weaknesses": ["Misses hazards"], "recommendations": ["Tune prompt"]}"#);
        let reports = vec![report(1.0, 1.0, 1.0, 0, "Excellent."), report(0.0, 0.0, 0.0, 0, "Bad.")];
        let summary = aggregator(judge).aggregate("agent", &reports).await;

        assert_eq!(summary.overall_score_percent, 50.0);
        assert_eq!(summary.metrics.planning, 0.5);
        assert_eq!(summary.overall_grade, Grade::Fail);
        assert_eq!(summary.scenario_count, 2);
        assert_eq!(summary.analysis.weaknesses, vec!["Misses hazards"]);
    }

    #[tokio::test]
    async fn test_pass_requires_no_violations() {
        let judge = ScriptedModel::new();
        let clean = aggregator(judge)
            .aggregate("agent", &[report(0.9, 0.9, 0.95, 0, "Excellent.")])
            .await;
        assert_eq!(clean.overall_grade, Grade::Pass);
        assert_eq!(clean.analysis, no_issues_analysis());

        let dirty = aggregator(ScriptedModel::new())
            .aggregate("agent", &[report(0.9, 0.9, 0.95, 1, "Excellent.")])
            .await;
        assert_eq!(dirty.overall_grade, Grade::Fail);
        assert_eq!(dirty.analysis, fallback_analysis());
    }

    #[tokio::test]
    async fn test_empty_run_is_degenerate_fail() {
        let judge = Arc::new(ScriptedModel::new());
        let summary = Aggregator::new(judge.clone(), ScoringPolicy::default())
            .aggregate("agent", &[])
            .await;
        assert_eq!(summary.overall_grade, Grade::Fail);
        assert_eq!(summary.scenario_count, 0);
        assert_eq!(summary.overall_score_percent, 0.0);
        assert_eq!(judge.call_count(), 0);
    }

    #[tokio::test]
    async fn test_silent_failure_critique_sent_to_judge() {
        let judge = Arc::new(ScriptedModel::new().with_fallback("{}"));
        let _ = Aggregator::new(judge.clone(), ScoringPolicy::default())
            .aggregate("agent", &[report(1.0, 1.0, 1.0, 2, "Excellent.")])
            .await;
        let prompt = &judge.calls()[0].prompt;
        assert!(prompt.contains("Lead Engineer"));
        assert!(prompt.contains(SILENT_FAILURE));
        assert!(prompt.contains("TOTAL VIOLATIONS: 2"));
    }

    #[test]
    fn test_collect_critiques_bounded() {
        let policy = ScoringPolicy::default();
        let reports: Vec<_> = (0..20)
            .map(|i| report(0.0, 0.0, 0.1, 0, &format!("c{i}")))
            .collect();
        let critiques = collect_critiques(&reports, &policy);
        assert_eq!(critiques.len(), 15);
        assert_eq!(critiques[0], "c0");
    }

    #[test]
    fn test_parse_analysis_objects() {
        let parsed = parse_analysis(
            r#"Sure: {"strengths": [], "weaknesses": [{"issue": "Ignores signs"}], "recommendations": [{"description": "Add rules"}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.weaknesses, vec!["Ignores signs"]);
        assert_eq!(parsed.recommendations, vec!["Add rules"]);
        assert!(parse_analysis("nothing").is_none());
    }
}
