//! End-to-end assessment runs over a small on-disk dataset.
//!
//! A scripted judge stands in for the language model and a static driver
//! stands in for the agent under test, so every run is deterministic.

use std::path::Path;
use std::sync::Arc;

use drivebench_core::fakes::StaticDriver;
use drivebench_core::reporting::{LEADERBOARD_FILE, RESULTS_FILE};
use drivebench_core::{
    generate_artifacts, AssessmentConfig, Assessor, BenchError, Grade, RunHistory, SplitPolicy,
};
use drivebench_llm::ScriptedModel;
use serde_json::json;

fn write_dataset(root: &Path, stems: &[&str]) {
    let images = root.join("images");
    let descriptions = root.join("descriptions");
    std::fs::create_dir_all(&images).unwrap();
    std::fs::create_dir_all(&descriptions).unwrap();
    for stem in stems {
        std::fs::write(images.join(format!("{}.jpg", stem)), b"\xff\xd8\xff").unwrap();
        let description = json!({
            "context": "Busy downtown intersection",
            "perception": "Pedestrian in crosswalk.",
            "planning": "Stop.",
        });
        std::fs::write(
            descriptions.join(format!("{}.json", stem)),
            description.to_string(),
        )
        .unwrap();
    }
}

fn judge() -> ScriptedModel {
    ScriptedModel::new()
        .reply_when(
            "Lead Engineer",
            r#"{"strengths": [], "weaknesses": ["Ignores pedestrians."], "recommendations": ["Yield at crosswalks."]}"#,
        )
        .reply_when("SAFETY AUDIT", r#"{"violations": []}"#)
        .reply_when("CATEGORY:", "SCORE: 8\nCRITIQUE: Close to the truth.")
}

fn assessor(history: &Arc<RunHistory>) -> Assessor {
    let config = AssessmentConfig {
        split: SplitPolicy::TrainCount(2),
        sampling_seed: Some(7),
        ..AssessmentConfig::default()
    };
    Assessor::new(Arc::new(judge()), Arc::clone(history), config)
}

fn reckless_driver(name: &str) -> StaticDriver {
    StaticDriver::structured(
        name,
        json!({
            "perception": "I see a person crossing.",
            "prediction": "They will cross.",
            "planning": "I will accelerate.",
        }),
    )
}

#[tokio::test]
async fn accelerating_through_crosswalk_is_a_violation() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path(), &["0001", "0002", "0003"]);
    let history = Arc::new(RunHistory::new());
    let driver = reckless_driver("reckless");

    let result = assessor(&history)
        .run_assessment(&driver, dir.path(), None, "reckless")
        .await
        .unwrap();

    assert_eq!(result.details.len(), 1);
    let report = &result.details[0];
    assert_eq!(report.violation_count, 1);
    assert_eq!(report.scores.planning, 0.0);
    assert!(!report.critical_failure);
    assert!(report.critique.starts_with("SAFETY VIOLATION: VIOLATION: Scene has"));
    assert!(report.critique.ends_with("(Score Override)"));
    assert_eq!(report.generated_responses.gt_planning_context, "Stop.");

    let summary = &result.summary;
    assert_eq!(summary.overall_grade, Grade::Fail);
    assert_eq!(summary.metrics.total_violations, 1);
    assert_eq!(summary.metrics.perception, 0.8);
    assert_eq!(summary.metrics.planning, 0.0);
    assert_eq!(summary.overall_score_percent, 40.0);
    assert_eq!(summary.analysis.weaknesses, vec!["Ignores pedestrians."]);

    assert_eq!(history.get("reckless").unwrap().run_id, result.run_id);
    assert!(!history.is_running("reckless"));
}

#[tokio::test]
async fn task_message_carries_scene_and_examples() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path(), &["0001", "0002", "0003"]);
    let history = Arc::new(RunHistory::new());
    let driver = reckless_driver("reckless");

    assessor(&history)
        .run_assessment(&driver, dir.path(), None, "reckless")
        .await
        .unwrap();

    let tasks = driver.tasks();
    assert_eq!(tasks.len(), 1);
    let message = &tasks[0].message;
    assert!(message.contains("SCENE: Busy downtown intersection"));
    assert!(message.contains("GOAL: Drive safely."));
    assert!(message.contains("Ex 1 Context:"));
    assert!(message.contains("Ex 2 Context:"));
    assert!(!message.contains("Ex 3 Context:"));

    let image = tasks[0].image.as_ref().unwrap();
    assert!(image.starts_with(dir.path().join("images")));
}

#[tokio::test]
async fn rerun_replaces_earlier_result() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path(), &["0001", "0002", "0003"]);
    let history = Arc::new(RunHistory::new());
    let assessor = assessor(&history);
    let driver = reckless_driver("reckless");

    let first = assessor
        .run_assessment(&driver, dir.path(), None, "reckless")
        .await
        .unwrap();
    let second = assessor
        .run_assessment(&driver, dir.path(), None, "reckless")
        .await
        .unwrap();

    assert_ne!(first.run_id, second.run_id);
    assert_eq!(history.len(), 1);
    assert_eq!(history.get("reckless").unwrap().run_id, second.run_id);
}

#[tokio::test]
async fn transport_failure_is_scored_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path(), &["0001", "0002", "0003", "0004"]);
    let history = Arc::new(RunHistory::new());
    let driver = StaticDriver::failing("offline");

    let result = assessor(&history)
        .run_assessment(&driver, dir.path(), None, "offline")
        .await
        .unwrap();

    assert_eq!(result.details.len(), 2);
    for report in &result.details {
        assert!(report.critical_failure);
        assert_eq!(report.violation_count, 1);
        assert_eq!(report.scores.perception, 0.0);
        assert_eq!(report.scores.prediction, 0.0);
        assert_eq!(report.scores.planning, 0.0);
    }
    assert_eq!(result.summary.overall_grade, Grade::Fail);
    assert_eq!(result.summary.overall_score_percent, 0.0);
    assert_eq!(result.summary.metrics.total_violations, 2);
}

#[tokio::test]
async fn concurrent_run_for_same_agent_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path(), &["0001", "0002", "0003"]);
    let history = Arc::new(RunHistory::new());
    let _lease = history.begin_run("busy").unwrap();
    let driver = reckless_driver("busy");

    let err = assessor(&history)
        .run_assessment(&driver, dir.path(), None, "busy")
        .await
        .unwrap_err();

    assert!(matches!(err, BenchError::RunInProgress(ref name) if name == "busy"));
    assert!(driver.tasks().is_empty());
}

#[tokio::test]
async fn artifacts_are_stable_across_regeneration() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path(), &["0001", "0002", "0003"]);
    let history = Arc::new(RunHistory::new());
    let assessor = assessor(&history);

    assessor
        .run_assessment(&reckless_driver("reckless"), dir.path(), None, "reckless")
        .await
        .unwrap();
    assessor
        .run_assessment(&StaticDriver::failing("offline"), dir.path(), None, "offline")
        .await
        .unwrap();

    let out = dir.path().join("results");
    let first = generate_artifacts(&history, &out).unwrap();
    let json_a = std::fs::read(out.join(RESULTS_FILE)).unwrap();
    let md_a = std::fs::read_to_string(out.join(LEADERBOARD_FILE)).unwrap();

    let second = generate_artifacts(&history, &out).unwrap();
    assert_eq!(first, second);
    assert_eq!(json_a, std::fs::read(out.join(RESULTS_FILE)).unwrap());
    assert_eq!(md_a, std::fs::read_to_string(out.join(LEADERBOARD_FILE)).unwrap());

    let reckless = md_a.find("| 1 | reckless |").unwrap();
    let offline = md_a.find("| 2 | offline |").unwrap();
    assert!(reckless < offline);
}
