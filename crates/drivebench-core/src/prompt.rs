//! Task message sent to the driver for one scenario.

use crate::domain::{FewShotExample, Scenario};

/// Characters of few-shot context kept per example.
pub const EXAMPLE_CONTEXT_CHARS: usize = 150;

/// Instructional placeholders in the required JSON format. A driver that
/// echoes one back copied the schema instead of answering.
pub const SCHEMA_PLACEHOLDERS: [&str; 3] = [
    "(DESCRIBE WHAT YOU SEE)",
    "(PREDICT MOVEMENT)",
    "(STATE YOUR ACTION)",
];

const RULE: &str = "--------------------------------------------------";

/// Build the full task message for `scenario`.
pub fn build_task_message(scenario: &Scenario, examples: &[FewShotExample]) -> String {
    let mut message = String::from("SYSTEM TASK: Autonomous Driving Decision\n");

    if !examples.is_empty() {
        message.push_str("\n--- REFERENCE EXAMPLES (Learn from these) ---\n");
        for (i, example) in examples.iter().enumerate() {
            let context: String = example.context.chars().take(EXAMPLE_CONTEXT_CHARS).collect();
            let response = serde_json::to_string(&example.response).unwrap_or_default();
            message.push_str(&format!("Ex {} Context: {}...\n", i + 1, context));
            message.push_str(&format!("Ex {} Output: {}\n\n", i + 1, response));
        }
        message.push_str("----------------------------------------------\n");
    }

    message.push_str(RULE);
    message.push('\n');
    message.push_str(&format!("SCENE: {}\n", scenario.context));
    message.push_str(&format!("GOAL: {}\n", scenario.goal));
    message.push_str(RULE);
    message.push('\n');
    message.push_str("INSTRUCTIONS:\n1. Analyze the scene.\n2. Output strict JSON.\n\n");
    message.push_str("REQUIRED JSON FORMAT:\n{\n");
    message.push_str(&format!("  \"perception\": \"{}\",\n", SCHEMA_PLACEHOLDERS[0]));
    message.push_str(&format!("  \"prediction\": \"{}\",\n", SCHEMA_PLACEHOLDERS[1]));
    message.push_str(&format!("  \"planning\": \"{}\"\n", SCHEMA_PLACEHOLDERS[2]));
    message.push_str("}\n");
    message
}
