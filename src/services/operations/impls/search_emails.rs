//! search_emails Operation
//!
//! Index-backed search followed by the relevance filter.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use mailpilot_core::context::OperationContext;
use mailpilot_core::operation_trait::{OperationDefinition, OperationExecutable};
use mailpilot_core::schema::ParameterSchema;
use mailpilot_core::CoreResult;

use super::{optional_usize, required_str};
use crate::services::search::SearchService;

pub struct SearchEmailsOperation {
    search: Arc<SearchService>,
}

impl SearchEmailsOperation {
    pub fn new(search: Arc<SearchService>) -> Self {
        Self { search }
    }
}

impl OperationDefinition for SearchEmailsOperation {
    fn name(&self) -> &str {
        "search_emails"
    }

    fn description(&self) -> &str {
        "Search the user's email with natural-language or keyword text. Returns the most relevant messages with ids, scores and snippets."
    }

    fn parameters_schema(&self) -> ParameterSchema {
        let mut properties = BTreeMap::new();
        properties.insert(
            "query".to_string(),
            ParameterSchema::string(Some("What to look for")),
        );
        properties.insert(
            "limit".to_string(),
            ParameterSchema::integer(Some("Maximum number of results before relevance filtering")),
        );
        ParameterSchema::object(None, properties, vec!["query".to_string()])
    }

    fn produces_artifact(&self) -> bool {
        true
    }
}

#[async_trait]
impl OperationExecutable for SearchEmailsOperation {
    async fn execute(&self, ctx: &OperationContext, args: Value) -> CoreResult<Value> {
        let query = required_str(&args, "query")?;
        let limit = optional_usize(&args, "limit")?;
        let response = self.search.search(ctx.identity(), query, limit).await?;

        Ok(json!({
            "query": query,
            "source": response.source,
            "results": response.results,
            "report": response.report,
        }))
    }
}
