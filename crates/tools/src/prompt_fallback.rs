//! Prompt-Based Operation Calling Fallback
//!
//! For reasoning services that answer in plain text instead of native
//! function calls, this module describes the operation catalog in the
//! instructions and parses call blocks back out of the response text.

use serde_json::Value;
use tracing::debug;

use mailpilot_core::operation_trait::OperationDescriptor;
use mailpilot_llm::types::OperationCall;

const FENCE: &str = "```operation_call";

/// Build the text-format calling instructions appended to the planner prompt.
pub fn build_operation_call_instructions(catalog: &[OperationDescriptor]) -> String {
    let mut descriptions = String::new();

    for op in catalog {
        descriptions.push_str(&format!("### {}\n{}\n", op.name, op.description));

        if let Some(properties) = op.input_schema.properties.as_ref() {
            if !properties.is_empty() {
                descriptions.push_str("Parameters:\n");
                let required = op.input_schema.required_names();
                for (name, schema) in properties {
                    let req_marker = if required.contains(name) {
                        " (required)"
                    } else {
                        " (optional)"
                    };
                    let mut line = format!(
                        "  - `{}` ({}{}): {}",
                        name,
                        schema.schema_type,
                        req_marker,
                        schema.description.as_deref().unwrap_or("")
                    );
                    if let Some(values) = &schema.enum_values {
                        line.push_str(&format!(" One of: {}.", values.join(", ")));
                    }
                    descriptions.push_str(&line);
                    descriptions.push('\n');
                }
            }
        }
        descriptions.push('\n');
    }

    format!(
        r#"## Operation Calling

To run an operation, output a block in this EXACT format:

```operation_call
{{"operation": "operation_name", "arguments": {{"param": "value"}}}}
```

Rules:
- The block MUST start with ```operation_call and end with ```
- The JSON MUST be valid
- You may request several operations in one response; they run in order
- Never invent operation results; wait for the real results
- When the request is fully handled, answer without any operation_call block

## Available Operations

{descriptions}"#,
        descriptions = descriptions,
    )
}

/// Parse operation calls from a text response.
///
/// - Pass 1: `` ```operation_call ... ``` `` fenced blocks
/// - Pass 2: bare JSON lines `{"operation": "name", "arguments": {...}}`,
///   only when pass 1 found nothing
///
/// Each parsed call gets a generated id.
pub fn parse_operation_calls(text: &str) -> Vec<OperationCall> {
    let mut calls = Vec::new();

    let mut remaining = text;
    while let Some(start) = remaining.find(FENCE) {
        let after_marker = &remaining[start + FENCE.len()..];
        let Some(end) = after_marker.find("```") else {
            break;
        };
        let block = after_marker[..end].trim();
        match parse_single_call(block) {
            Some(call) => calls.push(call),
            None => debug!(block = %block, "prompt fallback: unparsable operation_call block"),
        }
        remaining = &after_marker[end + 3..];
    }

    if calls.is_empty() && !has_unclosed_fence(text) {
        calls.extend(parse_bare_json_calls(text));
    }

    calls
}

fn parse_bare_json_calls(text: &str) -> Vec<OperationCall> {
    let lines: Vec<&str> = text.lines().collect();
    let mut calls = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let first = lines[i].trim();
        if !(first.starts_with('{') && first.contains("\"operation\"")) {
            i += 1;
            continue;
        }

        let mut json_str = first.to_string();
        let mut depth = brace_delta(first);
        let mut j = i + 1;
        while depth > 0 && j < lines.len() {
            let next = lines[j].trim();
            json_str.push('\n');
            json_str.push_str(next);
            depth += brace_delta(next);
            j += 1;
        }

        if let Some(call) = parse_single_call(&json_str) {
            calls.push(call);
        }
        i = j;
    }

    calls
}

fn brace_delta(line: &str) -> i32 {
    line.matches('{').count() as i32 - line.matches('}').count() as i32
}

fn has_unclosed_fence(text: &str) -> bool {
    let mut remaining = text;
    while let Some(start) = remaining.find(FENCE) {
        let after_marker = &remaining[start + FENCE.len()..];
        match after_marker.find("```") {
            Some(end) => remaining = &after_marker[end + 3..],
            None => return true,
        }
    }
    false
}

/// Parse a single `{"operation": ..., "arguments": ...}` object.
fn parse_single_call(content: &str) -> Option<OperationCall> {
    let json: Value = serde_json::from_str(content).ok()?;
    let name = json.get("operation")?.as_str()?.trim().to_string();
    if name.is_empty() {
        return None;
    }
    let arguments = json
        .get("arguments")
        .cloned()
        .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
    Some(OperationCall {
        id: format!("text-{}", uuid::Uuid::new_v4()),
        name,
        arguments,
    })
}

/// Remove operation call blocks, leaving the service's prose.
pub fn extract_text_without_operation_calls(text: &str) -> String {
    let mut result = String::new();
    let mut remaining = text;

    while let Some(start) = remaining.find(FENCE) {
        result.push_str(&remaining[..start]);
        let after_marker = &remaining[start + FENCE.len()..];
        match after_marker.find("```") {
            Some(end) => remaining = &after_marker[end + 3..],
            None => {
                remaining = "";
                break;
            }
        }
    }
    result.push_str(remaining);

    let mut cleaned = result
        .lines()
        .filter(|line| {
            let trimmed = line.trim();
            !(trimmed.starts_with('{') && trimmed.contains("\"operation\""))
        })
        .collect::<Vec<_>>()
        .join("\n");

    while cleaned.contains("\n\n\n") {
        cleaned = cleaned.replace("\n\n\n", "\n\n");
    }

    cleaned.trim().to_string()
}
