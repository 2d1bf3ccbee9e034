//! get_email Operation
//!
//! Fetches one record the caller can see: metadata plus a bounded body preview.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use mailpilot_core::context::OperationContext;
use mailpilot_core::data_provider::DataProvider;
use mailpilot_core::operation_trait::{OperationDefinition, OperationExecutable, RECORD_ID_PARAM};
use mailpilot_core::schema::ParameterSchema;
use mailpilot_core::CoreResult;

use super::{record_metadata, required_str};

/// Body characters returned in the preview.
const PREVIEW_CHARS: usize = 2000;

pub struct GetEmailOperation {
    provider: Arc<dyn DataProvider>,
}

impl GetEmailOperation {
    pub fn new(provider: Arc<dyn DataProvider>) -> Self {
        Self { provider }
    }
}

impl OperationDefinition for GetEmailOperation {
    fn name(&self) -> &str {
        "get_email"
    }

    fn description(&self) -> &str {
        "Fetch a single email by id. Returns sender, recipients, subject, timestamps, flags and a preview of the body."
    }

    fn parameters_schema(&self) -> ParameterSchema {
        let mut properties = BTreeMap::new();
        properties.insert(
            RECORD_ID_PARAM.to_string(),
            ParameterSchema::string(Some("Id of the email to fetch")),
        );
        ParameterSchema::object(None, properties, vec![RECORD_ID_PARAM.to_string()])
    }

    fn requires_record(&self) -> bool {
        true
    }
}

#[async_trait]
impl OperationExecutable for GetEmailOperation {
    async fn execute(&self, ctx: &OperationContext, args: Value) -> CoreResult<Value> {
        let record_id = required_str(&args, RECORD_ID_PARAM)?;
        let record = self.provider.get_record(record_id, ctx.identity()).await?;

        let mut payload = record_metadata(&record);
        payload["preview"] = Value::String(record.preview(PREVIEW_CHARS));
        payload["body_chars"] = Value::from(record.body.chars().count());
        Ok(payload)
    }
}
