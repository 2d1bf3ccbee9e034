//! list_thread Operation

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use mailpilot_core::context::OperationContext;
use mailpilot_core::data_provider::DataProvider;
use mailpilot_core::operation_trait::{OperationDefinition, OperationExecutable};
use mailpilot_core::schema::ParameterSchema;
use mailpilot_core::CoreResult;

use super::required_str;

const MESSAGE_PREVIEW_CHARS: usize = 200;

pub struct ListThreadOperation {
    provider: Arc<dyn DataProvider>,
}

impl ListThreadOperation {
    pub fn new(provider: Arc<dyn DataProvider>) -> Self {
        Self { provider }
    }
}

impl OperationDefinition for ListThreadOperation {
    fn name(&self) -> &str {
        "list_thread"
    }

    fn description(&self) -> &str {
        "List the messages of a conversation thread, oldest first, with short previews."
    }

    fn parameters_schema(&self) -> ParameterSchema {
        let mut properties = BTreeMap::new();
        properties.insert(
            "thread_id".to_string(),
            ParameterSchema::string(Some("Thread id, as returned by get_email")),
        );
        ParameterSchema::object(None, properties, vec!["thread_id".to_string()])
    }
}

#[async_trait]
impl OperationExecutable for ListThreadOperation {
    async fn execute(&self, ctx: &OperationContext, args: Value) -> CoreResult<Value> {
        let thread_id = required_str(&args, "thread_id")?;
        let messages = self
            .provider
            .list_thread_messages(thread_id, ctx.identity())
            .await?;

        let items: Vec<Value> = messages
            .iter()
            .map(|m| {
                json!({
                    "record_id": m.id,
                    "sender": m.sender,
                    "subject": m.subject,
                    "sent_at": m.sent_at.to_rfc3339(),
                    "draft": m.flags.draft,
                    "preview": m.preview(MESSAGE_PREVIEW_CHARS),
                })
            })
            .collect();

        Ok(json!({
            "thread_id": thread_id,
            "count": items.len(),
            "messages": items,
        }))
    }
}
