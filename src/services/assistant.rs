//! Mail Assistant
//!
//! Wires the mail store, index cache, search and operation layers to the
//! orchestration loop. This is the single entry point embedders use.

use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use mailpilot_core::data_provider::DataProvider;
use mailpilot_core::mail::Identity;
use mailpilot_core::operation_trait::OperationDescriptor;
use mailpilot_core::{CoreError, CoreResult};
use mailpilot_llm::{LlmProvider, OpenAIProvider};
use mailpilot_tools::OperationResult;

use crate::models::settings::AppConfig;
use crate::services::index::{CollectionStore, IndexCacheManager, IndexOutcome};
use crate::services::mail_store::SqliteMailStore;
use crate::services::operations::{builtin_registry, OperationDeps, OperationExecutor};
use crate::services::orchestrator::{FinalResult, OrchestratorService};
use crate::services::search::{
    HttpSearchBackend, SearchBackend, SearchIndexAdapter, SearchResponse, SearchService,
};
use crate::storage::database::Database;
use crate::utils::error::{AppError, AppResult};

pub struct MailAssistant {
    provider: Arc<dyn DataProvider>,
    cache: Arc<IndexCacheManager>,
    search: Arc<SearchService>,
    executor: Arc<OperationExecutor>,
    orchestrator: OrchestratorService,
}

impl MailAssistant {
    /// Assemble the assistant from explicit collaborators.
    ///
    /// `backend` is the external search index; `None` serves every query
    /// from the mail store fallback. Fails when the configuration or the
    /// operation registry is invalid.
    pub fn new(
        config: &AppConfig,
        db: &Database,
        provider: Arc<dyn DataProvider>,
        backend: Option<Arc<dyn SearchBackend>>,
        reasoning: Arc<dyn LlmProvider>,
    ) -> AppResult<Self> {
        config.validate().map_err(AppError::validation)?;

        let adapter = Arc::new(SearchIndexAdapter::new(
            backend,
            provider.clone(),
            config.search.clone(),
        ));
        let cache = Arc::new(IndexCacheManager::new(
            CollectionStore::new(db.pool().clone()),
            adapter.clone(),
            config.index.clone(),
        ));
        let search = Arc::new(SearchService::new(
            provider.clone(),
            cache.clone(),
            adapter.clone(),
            config.search.clone(),
        ));

        let registry = builtin_registry(&OperationDeps {
            provider: provider.clone(),
            search: search.clone(),
        })?;
        let executor = Arc::new(OperationExecutor::new(
            Arc::new(registry),
            config.orchestration.operation_timeout(),
        ));
        let orchestrator = OrchestratorService::new(
            reasoning.clone(),
            executor.clone(),
            config.orchestration.clone(),
        );

        info!(
            operations = executor.registry().len(),
            search_backend = adapter.has_backend(),
            reasoning = reasoning.name(),
            model = reasoning.model(),
            "assistant: ready"
        );

        Ok(Self {
            provider,
            cache,
            search,
            executor,
            orchestrator,
        })
    }

    /// Production wiring: SQLite mail store, HTTP search backend when a
    /// base URL is configured, OpenAI-compatible reasoning service.
    pub fn from_config(config: &AppConfig, db: &Database) -> AppResult<Self> {
        let provider: Arc<dyn DataProvider> = Arc::new(SqliteMailStore::new(db.pool().clone()));
        let backend = HttpSearchBackend::from_policy(&config.search)?
            .map(|b| Arc::new(b) as Arc<dyn SearchBackend>);
        let reasoning = OpenAIProvider::new(config.reasoning.clone()).map_err(CoreError::from)?;
        Self::new(config, db, provider, backend, Arc::new(reasoning))
    }

    /// Operations offered to the reasoning service, in catalog order.
    pub fn catalog(&self) -> Vec<OperationDescriptor> {
        self.executor.registry().catalog()
    }

    /// Relevance-filtered search over the caller's mail.
    pub async fn search(
        &self,
        identity: Option<&Identity>,
        text: &str,
        limit: Option<usize>,
    ) -> CoreResult<SearchResponse> {
        let identity = identity.ok_or(CoreError::AuthenticationRequired)?;
        self.search.search(identity, text, limit).await
    }

    /// Bring the caller's collection up to date without querying it.
    pub async fn refresh_index(&self, identity: Option<&Identity>) -> CoreResult<IndexOutcome> {
        let identity = identity.ok_or(CoreError::AuthenticationRequired)?;
        let corpus = self.provider.list_indexable_records(identity).await?;
        self.cache.ensure_fresh(identity, &corpus).await
    }

    /// Forget the caller's index state; the next search rebuilds it.
    pub async fn reset_index(&self, identity: Option<&Identity>) -> CoreResult<bool> {
        let identity = identity.ok_or(CoreError::AuthenticationRequired)?;
        self.cache.reset_collection(&identity.user_id).await
    }

    /// Run a single operation directly.
    pub async fn execute(
        &self,
        operation_name: &str,
        arguments: Value,
        identity: Option<&Identity>,
    ) -> OperationResult {
        self.executor
            .execute(operation_name, arguments, identity)
            .await
    }

    /// Whether the reasoning service answers within its deadline.
    pub async fn check_reasoning_service(&self) -> CoreResult<()> {
        let result = self.orchestrator.check_reasoning_service().await;
        if let Err(e) = &result {
            warn!(error = %e, "assistant: reasoning service health check failed");
        }
        result
    }

    /// Handle a natural-language request end to end.
    pub async fn run(&self, identity: Option<&Identity>, request: &str) -> CoreResult<FinalResult> {
        self.run_with_cancel(identity, request, CancellationToken::new())
            .await
    }

    /// As [`run`](Self::run), stopping before the next planning round once
    /// `cancel` fires.
    pub async fn run_with_cancel(
        &self,
        identity: Option<&Identity>,
        request: &str,
        cancel: CancellationToken,
    ) -> CoreResult<FinalResult> {
        self.orchestrator.run(identity, request, cancel).await
    }
}
