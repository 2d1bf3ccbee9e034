//! Built-in Registry
//!
//! The static declaration of every operation offered to the reasoning
//! service. Validated once when the assistant is built.

use std::sync::Arc;

use mailpilot_core::data_provider::DataProvider;
use mailpilot_core::operation_trait::{EmailOperation, OperationRegistry};
use mailpilot_core::CoreResult;

use super::impls::{
    ClassifyEmailOperation, DraftReplyOperation, GetEmailOperation, ListThreadOperation,
    SearchEmailsOperation, SummarizeEmailOperation,
};
use crate::services::search::SearchService;

/// Dependencies shared by the built-in operations.
#[derive(Clone)]
pub struct OperationDeps {
    pub provider: Arc<dyn DataProvider>,
    pub search: Arc<SearchService>,
}

/// Declaration order is the catalog order.
pub fn builtin_operations(deps: &OperationDeps) -> Vec<Arc<dyn EmailOperation>> {
    vec![
        Arc::new(SearchEmailsOperation::new(deps.search.clone())),
        Arc::new(GetEmailOperation::new(deps.provider.clone())),
        Arc::new(ListThreadOperation::new(deps.provider.clone())),
        Arc::new(SummarizeEmailOperation::new(deps.provider.clone())),
        Arc::new(ClassifyEmailOperation::new(deps.provider.clone())),
        Arc::new(DraftReplyOperation::new(deps.provider.clone())),
    ]
}

pub fn builtin_registry(deps: &OperationDeps) -> CoreResult<OperationRegistry> {
    OperationRegistry::from_operations(builtin_operations(deps))
}
