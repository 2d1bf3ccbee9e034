//! classify_email Operation
//!
//! Rule-based categorization. Each rule is a case-insensitive regex over
//! one field of the message; the category with the highest precedence
//! among the matching rules wins:
//! urgent > action_required > newsletter > informational.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use mailpilot_core::context::OperationContext;
use mailpilot_core::data_provider::DataProvider;
use mailpilot_core::mail::EmailRecord;
use mailpilot_core::operation_trait::{OperationDefinition, OperationExecutable, RECORD_ID_PARAM};
use mailpilot_core::schema::ParameterSchema;
use mailpilot_core::CoreResult;

use super::required_str;

/// Categories in descending precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailCategory {
    Urgent,
    ActionRequired,
    Newsletter,
    Informational,
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Subject,
    Body,
    Sender,
}

struct CompiledRule {
    name: &'static str,
    category: EmailCategory,
    field: Field,
    regex: Regex,
}

fn rules() -> &'static Vec<CompiledRule> {
    static RULES: OnceLock<Vec<CompiledRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        let raw: [(&'static str, EmailCategory, Field, &str); 8] = [
            (
                "urgent_subject",
                EmailCategory::Urgent,
                Field::Subject,
                r"(?i)\b(urgent|asap|emergency|critical|immediately)\b",
            ),
            (
                "urgent_body",
                EmailCategory::Urgent,
                Field::Body,
                r"(?i)\b(as soon as possible|right away|time[- ]sensitive|outage)\b",
            ),
            (
                "deadline",
                EmailCategory::ActionRequired,
                Field::Body,
                r"(?i)\b(by (monday|tuesday|wednesday|thursday|friday|saturday|sunday|tomorrow|today|eod|end of (the )?day)|deadline|due (date|by|on))\b",
            ),
            (
                "request",
                EmailCategory::ActionRequired,
                Field::Body,
                r"(?i)\b(please (review|confirm|approve|respond|reply|sign|send)|can you|could you|action required|rsvp)\b",
            ),
            (
                "action_subject",
                EmailCategory::ActionRequired,
                Field::Subject,
                r"(?i)\b(action required|approval needed|please review|reminder)\b",
            ),
            (
                "bulk_sender",
                EmailCategory::Newsletter,
                Field::Sender,
                r"(?i)(no-?reply|newsletter|digest|updates|marketing)@",
            ),
            (
                "unsubscribe",
                EmailCategory::Newsletter,
                Field::Body,
                r"(?i)\b(unsubscribe|view (this email )?in (your )?browser|manage (your )?preferences)\b",
            ),
            (
                "digest_subject",
                EmailCategory::Newsletter,
                Field::Subject,
                r"(?i)\b(newsletter|weekly digest|monthly update|this week in)\b",
            ),
        ];
        raw.into_iter()
            .filter_map(|(name, category, field, pattern)| {
                Regex::new(pattern).ok().map(|regex| CompiledRule {
                    name,
                    category,
                    field,
                    regex,
                })
            })
            .collect()
    })
}

/// Category and the names of the rules that matched.
pub fn classify(record: &EmailRecord) -> (EmailCategory, Vec<&'static str>) {
    let matched: Vec<&CompiledRule> = rules()
        .iter()
        .filter(|rule| {
            let text = match rule.field {
                Field::Subject => record.subject.as_str(),
                Field::Body => record.body.as_str(),
                Field::Sender => record.sender.as_str(),
            };
            rule.regex.is_match(text)
        })
        .collect();
    let category = matched
        .iter()
        .map(|r| r.category)
        .min()
        .unwrap_or(EmailCategory::Informational);
    (category, matched.iter().map(|r| r.name).collect())
}

pub struct ClassifyEmailOperation {
    provider: Arc<dyn DataProvider>,
}

impl ClassifyEmailOperation {
    pub fn new(provider: Arc<dyn DataProvider>) -> Self {
        Self { provider }
    }
}

impl OperationDefinition for ClassifyEmailOperation {
    fn name(&self) -> &str {
        "classify_email"
    }

    fn description(&self) -> &str {
        "Classify one email as urgent, action_required, newsletter or informational, with the signals that matched."
    }

    fn parameters_schema(&self) -> ParameterSchema {
        let mut properties = BTreeMap::new();
        properties.insert(
            RECORD_ID_PARAM.to_string(),
            ParameterSchema::string(Some("Id of the email to classify")),
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
impl OperationExecutable for ClassifyEmailOperation {
    async fn execute(&self, ctx: &OperationContext, args: Value) -> CoreResult<Value> {
        let record_id = required_str(&args, RECORD_ID_PARAM)?;
        let record = self.provider.get_record(record_id, ctx.identity()).await?;
        let (category, signals) = classify(&record);
        Ok(json!({
            "record_id": record.id,
            "subject": record.subject,
            "category": category,
            "signals": signals,
        }))
    }
}
