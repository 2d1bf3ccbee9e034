//! Planning Context
//!
//! Renders what the reasoning service sees each round: the original
//! request plus one entry per completed step. Structured fields (ids,
//! addresses, timestamps, flags, scores) are passed through verbatim;
//! free-text fields are cut to the preview budget and marked.

use serde_json::Value;

use mailpilot_core::truncate_chars;
use mailpilot_tools::OperationResult;

use super::session::{OrchestrationSession, Step};

/// Appended to every cut free-text value.
pub const TRUNCATION_MARKER: &str = "…[truncated]";

/// Keys whose string values are free text.
const FREE_TEXT_KEYS: &[&str] = &["body", "preview", "summary", "snippet", "text", "key_sentences"];

pub const PLANNING_INSTRUCTIONS: &str = "You plan email tasks for the user. \
Choose the operations needed to satisfy the request, using ids from earlier \
step results when an operation needs a record. Request several operations at \
once only when they do not depend on each other's results. When the request \
is satisfied, or cannot be satisfied, request no operations and answer briefly.";

/// Cut `text` to `max_chars` characters, appending the marker when cut.
pub fn truncate_with_marker(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        format!("{}{}", truncate_chars(text, max_chars), TRUNCATION_MARKER)
    }
}

/// Copy of `value` with free-text fields bounded.
pub fn bound_free_text(value: &Value, max_chars: usize) -> Value {
    bound_value(value, max_chars, false)
}

fn bound_value(value: &Value, max_chars: usize, free_text: bool) -> Value {
    match value {
        Value::String(s) if free_text => Value::String(truncate_with_marker(s, max_chars)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|v| bound_value(v, max_chars, free_text))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    let is_free = FREE_TEXT_KEYS.contains(&k.as_str());
                    (k.clone(), bound_value(v, max_chars, is_free))
                })
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Bounded one-line rendering of an operation result.
pub fn summarize_result(result: &OperationResult, max_chars: usize) -> String {
    if result.success {
        match &result.payload {
            Some(Value::String(s)) => truncate_with_marker(s, max_chars),
            Some(payload) => bound_free_text(payload, max_chars).to_string(),
            None => String::new(),
        }
    } else {
        result.to_content()
    }
}

fn format_entry(
    index: usize,
    iteration: u32,
    operation_name: &str,
    succeeded: bool,
    summary: &str,
) -> String {
    let outcome = if succeeded { "succeeded" } else { "failed" };
    format!(
        "Step {} [{}] (iteration {}) {}: {}",
        index, operation_name, iteration, outcome, summary
    )
}

/// Context entry for a recorded step; `result_summary` is already bounded.
pub fn entry_for_step(step: &Step) -> String {
    format_entry(
        step.index,
        step.iteration,
        &step.operation_name,
        step.succeeded(),
        &step.result_summary,
    )
}

/// Full planning context for the next round.
pub fn render_context(session: &OrchestrationSession, max_iterations: u32) -> String {
    let mut out = String::new();
    out.push_str("User request:\n");
    out.push_str(&session.original_request);
    out.push_str("\n\nCompleted steps:\n");
    if session.accumulated_context.is_empty() {
        out.push_str("(none yet)\n");
    } else {
        for entry in &session.accumulated_context {
            out.push_str(entry);
            out.push('\n');
        }
    }
    out.push_str(&format!(
        "\nPlanning round {} of {}.",
        session.iteration_count, max_iterations
    ));
    out
}
