//! draft_reply Operation
//!
//! Creates a draft reply to a record: `Re:` subject, addressed to the
//! original sender, same thread and mailbox. The draft is written through
//! `DataProvider::create_draft`, which also links it into the mailbox.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use mailpilot_core::context::OperationContext;
use mailpilot_core::data_provider::DataProvider;
use mailpilot_core::mail::DraftPayload;
use mailpilot_core::operation_trait::{OperationDefinition, OperationExecutable, RECORD_ID_PARAM};
use mailpilot_core::schema::ParameterSchema;
use mailpilot_core::CoreResult;

use super::required_str;

/// Prefix `Re: ` unless the subject already carries it.
pub(crate) fn reply_subject(subject: &str) -> String {
    let trimmed = subject.trim();
    let already = trimmed
        .get(..3)
        .map(|p| p.eq_ignore_ascii_case("re:"))
        .unwrap_or(false);
    if already {
        trimmed.to_string()
    } else {
        format!("Re: {}", trimmed)
    }
}

pub struct DraftReplyOperation {
    provider: Arc<dyn DataProvider>,
}

impl DraftReplyOperation {
    pub fn new(provider: Arc<dyn DataProvider>) -> Self {
        Self { provider }
    }
}

impl OperationDefinition for DraftReplyOperation {
    fn name(&self) -> &str {
        "draft_reply"
    }

    fn description(&self) -> &str {
        "Create a draft reply to an email. The draft is saved, not sent. Provide the reply text in 'body'."
    }

    fn parameters_schema(&self) -> ParameterSchema {
        let mut properties = BTreeMap::new();
        properties.insert(
            RECORD_ID_PARAM.to_string(),
            ParameterSchema::string(Some("Id of the email being answered")),
        );
        properties.insert(
            "body".to_string(),
            ParameterSchema::string(Some("Reply text")),
        );
        ParameterSchema::object(
            None,
            properties,
            vec![RECORD_ID_PARAM.to_string(), "body".to_string()],
        )
    }

    fn requires_record(&self) -> bool {
        true
    }

    fn produces_artifact(&self) -> bool {
        true
    }
}

#[async_trait]
impl OperationExecutable for DraftReplyOperation {
    async fn execute(&self, ctx: &OperationContext, args: Value) -> CoreResult<Value> {
        let record_id = required_str(&args, RECORD_ID_PARAM)?;
        let body = required_str(&args, "body")?;
        let original = self.provider.get_record(record_id, ctx.identity()).await?;

        let payload = DraftPayload {
            mailbox_id: Some(original.mailbox_id.clone()),
            thread_id: original.thread_id.clone(),
            in_reply_to: Some(original.id.clone()),
            recipients: vec![original.sender.clone()],
            subject: reply_subject(&original.subject),
            body: body.to_string(),
        };
        let subject = payload.subject.clone();
        let recipients = payload.recipients.clone();
        let draft_id = self.provider.create_draft(ctx.identity(), payload).await?;

        info!(
            user = %ctx.user_id(),
            original = %original.id,
            draft = %draft_id,
            "draft_reply: draft created"
        );

        Ok(json!({
            "draft_id": draft_id,
            "in_reply_to": original.id,
            "mailbox_id": original.mailbox_id,
            "thread_id": original.thread_id,
            "recipients": recipients,
            "subject": subject,
            "body": body,
        }))
    }
}
