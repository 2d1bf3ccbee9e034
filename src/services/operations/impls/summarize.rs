//! summarize_email Operation
//!
//! Deterministic extractive digest: participants, subject, and the leading
//! sentences of the message's own text. Quoted lines (`>`) and everything
//! after a signature delimiter or a reply header are ignored.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use mailpilot_core::context::OperationContext;
use mailpilot_core::data_provider::DataProvider;
use mailpilot_core::mail::EmailRecord;
use mailpilot_core::operation_trait::{OperationDefinition, OperationExecutable, RECORD_ID_PARAM};
use mailpilot_core::schema::ParameterSchema;
use mailpilot_core::{truncate_chars, CoreResult};

use super::{optional_usize, required_str};

const DEFAULT_SENTENCES: usize = 3;
const MAX_SENTENCES: usize = 10;
const MAX_SENTENCE_CHARS: usize = 300;

pub struct SummarizeEmailOperation {
    provider: Arc<dyn DataProvider>,
}

impl SummarizeEmailOperation {
    pub fn new(provider: Arc<dyn DataProvider>) -> Self {
        Self { provider }
    }
}

/// Body text written by the sender.
fn own_text(body: &str) -> String {
    let mut lines = Vec::new();
    for line in body.lines() {
        let trimmed = line.trim();
        if trimmed == "--" {
            break;
        }
        if trimmed.starts_with("On ") && trimmed.ends_with("wrote:") {
            break;
        }
        if trimmed.starts_with('>') || trimmed.is_empty() {
            continue;
        }
        lines.push(trimmed);
    }
    lines.join(" ")
}

/// Split on `.`, `!` or `?` followed by whitespace or end of text.
fn sentences(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        current.push(c);
        let boundary = matches!(c, '.' | '!' | '?')
            && chars.peek().map(|n| n.is_whitespace()).unwrap_or(true);
        if boundary {
            let s = current.trim();
            if !s.is_empty() {
                out.push(s.to_string());
            }
            current.clear();
        }
    }
    let rest = current.trim();
    if !rest.is_empty() {
        out.push(rest.to_string());
    }
    out
}

/// Sender first, then recipients; duplicates removed.
fn participants(record: &EmailRecord) -> Vec<String> {
    let mut seen = Vec::new();
    for p in std::iter::once(&record.sender).chain(record.recipients.iter()) {
        if !seen.iter().any(|s: &String| s.eq_ignore_ascii_case(p)) {
            seen.push(p.clone());
        }
    }
    seen
}

pub(crate) fn summarize(record: &EmailRecord, max_sentences: usize) -> Value {
    let key_sentences: Vec<String> = sentences(&own_text(&record.body))
        .into_iter()
        .take(max_sentences)
        .map(|s| truncate_chars(&s, MAX_SENTENCE_CHARS))
        .collect();
    let subject = if record.subject.trim().is_empty() {
        "(no subject)"
    } else {
        record.subject.as_str()
    };
    let summary = if key_sentences.is_empty() {
        format!("\"{}\" from {} has no body text.", subject, record.sender)
    } else {
        format!("\"{}\" from {}: {}", subject, record.sender, key_sentences.join(" "))
    };

    json!({
        "record_id": record.id,
        "subject": record.subject,
        "participants": participants(record),
        "key_sentences": key_sentences,
        "summary": summary,
    })
}

impl OperationDefinition for SummarizeEmailOperation {
    fn name(&self) -> &str {
        "summarize_email"
    }

    fn description(&self) -> &str {
        "Summarize one email: participants, subject and its key sentences (quoted replies and signatures are skipped)."
    }

    fn parameters_schema(&self) -> ParameterSchema {
        let mut properties = BTreeMap::new();
        properties.insert(
            RECORD_ID_PARAM.to_string(),
            ParameterSchema::string(Some("Id of the email to summarize")),
        );
        properties.insert(
            "max_sentences".to_string(),
            ParameterSchema::integer(Some("Number of sentences to keep (default 3, at most 10)")),
        );
        ParameterSchema::object(None, properties, vec![RECORD_ID_PARAM.to_string()])
    }

    fn requires_record(&self) -> bool {
        true
    }

    fn produces_artifact(&self) -> bool {
        true
    }
}

#[async_trait]
impl OperationExecutable for SummarizeEmailOperation {
    async fn execute(&self, ctx: &OperationContext, args: Value) -> CoreResult<Value> {
        let record_id = required_str(&args, RECORD_ID_PARAM)?;
        let max_sentences = optional_usize(&args, "max_sentences")?
            .unwrap_or(DEFAULT_SENTENCES)
            .clamp(1, MAX_SENTENCES);
        let record = self.provider.get_record(record_id, ctx.identity()).await?;
        Ok(summarize(&record, max_sentences))
    }
}
