//! Shared fixtures: a seeded mail store, an in-memory search backend and a
//! scripted reasoning service.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};

use mailpilot::models::settings::AppConfig;
use mailpilot::services::search::{SearchBackend, SearchDocument, SearchResult};
use mailpilot::services::{MailAssistant, SqliteMailStore};
use mailpilot::storage::Database;
use mailpilot_core::data_provider::DataProvider;
use mailpilot_core::mail::{EmailRecord, Identity, MailFlags, Mailbox};
use mailpilot_core::{CoreError, CoreResult};
use mailpilot_llm::{
    LlmProvider, LlmResult, OperationCall, ProviderConfig, ReasoningRequest, ReasoningResponse,
};

// ============================================================================
// Search backend
// ============================================================================

/// Search backend that keeps documents in memory and counts calls.
///
/// Scores are term overlap unless pinned with [`MemoryBackend::pin_score`].
#[derive(Default)]
pub struct MemoryBackend {
    collections: Mutex<HashMap<String, HashMap<String, SearchDocument>>>,
    pinned: Mutex<HashMap<String, f32>>,
    pub upsert_calls: AtomicUsize,
    pub query_calls: AtomicUsize,
    pub unavailable: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn pin_score(&self, record_id: &str, score: f32) {
        self.pinned
            .lock()
            .unwrap()
            .insert(record_id.to_string(), score);
    }

    pub fn upserts(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }

    pub fn document_count(&self, collection_id: &str) -> usize {
        self.collections
            .lock()
            .unwrap()
            .get(collection_id)
            .map(|c| c.len())
            .unwrap_or(0)
    }

    pub fn set_unavailable(&self, down: bool) {
        self.unavailable.store(down, Ordering::SeqCst);
    }

    fn check_up(&self) -> CoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(CoreError::unavailable("search index", "connection refused"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SearchBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn upsert(&self, collection_id: &str, documents: &[SearchDocument]) -> CoreResult<()> {
        self.check_up()?;
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        let mut collections = self.collections.lock().unwrap();
        let collection = collections.entry(collection_id.to_string()).or_default();
        for doc in documents {
            collection.insert(doc.id.clone(), doc.clone());
        }
        Ok(())
    }

    async fn query(
        &self,
        collection_id: &str,
        text: &str,
        limit: usize,
    ) -> CoreResult<Vec<SearchResult>> {
        self.check_up()?;
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        let terms: Vec<String> = text.split_whitespace().map(|t| t.to_lowercase()).collect();
        let pinned = self.pinned.lock().unwrap();
        let collections = self.collections.lock().unwrap();
        let mut results: Vec<SearchResult> = collections
            .get(collection_id)
            .into_iter()
            .flat_map(|c| c.values())
            .filter_map(|doc| {
                let score = match pinned.get(&doc.id) {
                    Some(score) => *score,
                    None => {
                        let haystack = format!("{} {}", doc.title, doc.body).to_lowercase();
                        let hits = terms.iter().filter(|t| haystack.contains(t.as_str())).count();
                        hits as f32 / terms.len().max(1) as f32
                    }
                };
                (score > 0.0).then(|| SearchResult {
                    record_id: doc.id.clone(),
                    relevance_score: score,
                    snippet: doc.title.clone(),
                })
            })
            .collect();
        results.sort_by(|a, b| {
            b.relevance_score
                .total_cmp(&a.relevance_score)
                .then_with(|| a.record_id.cmp(&b.record_id))
        });
        results.truncate(limit);
        Ok(results)
    }
}

// ============================================================================
// Reasoning service
// ============================================================================

/// Replays a fixed script of planning responses, then answers with text.
pub struct ScriptedReasoner {
    script: Mutex<VecDeque<LlmResult<ReasoningResponse>>>,
    repeat: Option<ReasoningResponse>,
    pub requests: Mutex<Vec<ReasoningRequest>>,
    native: bool,
    config: ProviderConfig,
}

impl ScriptedReasoner {
    pub fn new(script: Vec<LlmResult<ReasoningResponse>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            repeat: None,
            requests: Mutex::new(Vec::new()),
            native: true,
            config: ProviderConfig::default(),
        })
    }

    /// Returns `response` for every round.
    pub fn repeating(response: ReasoningResponse) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            repeat: Some(response),
            requests: Mutex::new(Vec::new()),
            native: true,
            config: ProviderConfig::default(),
        })
    }

    /// A service that only answers in text; calls arrive as fenced blocks.
    pub fn text_only(script: Vec<LlmResult<ReasoningResponse>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            repeat: None,
            requests: Mutex::new(Vec::new()),
            native: false,
            config: ProviderConfig::default(),
        })
    }

    pub fn rounds(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmProvider for ScriptedReasoner {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-1"
    }

    fn supports_native_calls(&self) -> bool {
        self.native
    }

    async fn plan(&self, request: ReasoningRequest) -> LlmResult<ReasoningResponse> {
        self.requests.lock().unwrap().push(request);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(response) => response,
            None => Ok(self
                .repeat
                .clone()
                .unwrap_or_else(|| ReasoningResponse::text("All done.", "scripted-1"))),
        }
    }

    async fn health_check(&self) -> LlmResult<()> {
        Ok(())
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

pub fn calls(calls: Vec<(&str, serde_json::Value)>) -> ReasoningResponse {
    let calls = calls
        .into_iter()
        .enumerate()
        .map(|(i, (name, arguments))| OperationCall {
            id: format!("call-{}", i + 1),
            name: name.to_string(),
            arguments,
        })
        .collect();
    ReasoningResponse::with_calls(calls, "scripted-1")
}

// ============================================================================
// Mail fixture
// ============================================================================

pub struct Fixture {
    pub db: Database,
    pub store: Arc<SqliteMailStore>,
    pub alice: Identity,
    pub inbox: Mailbox,
    seeded: usize,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_database(Database::new_in_memory().unwrap())
    }

    pub fn with_database(db: Database) -> Self {
        let store = Arc::new(SqliteMailStore::new(db.pool().clone()));
        let inbox = store.create_mailbox("alice", "Inbox").unwrap();
        Self {
            db,
            store,
            alice: Identity::new("alice", "alice@example.com"),
            inbox,
            seeded: 0,
        }
    }

    /// Config tuned for tests: no pause between batches.
    pub fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.index.batch_size = 2;
        config.index.batch_delay_ms = 0;
        config
    }

    pub fn provider(&self) -> Arc<dyn DataProvider> {
        self.store.clone()
    }

    pub fn add(&mut self, id: &str, sender: &str, subject: &str, body: &str) -> EmailRecord {
        let inbox = self.inbox.id.clone();
        self.add_to(&inbox, id, sender, subject, body)
    }

    pub fn add_to(
        &mut self,
        mailbox_id: &str,
        id: &str,
        sender: &str,
        subject: &str,
        body: &str,
    ) -> EmailRecord {
        self.seeded += 1;
        let sent = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
            + Duration::minutes(self.seeded as i64);
        let record = EmailRecord {
            id: id.to_string(),
            mailbox_id: mailbox_id.to_string(),
            thread_id: Some(format!("thread-{}", id)),
            sender: sender.to_string(),
            recipients: vec!["alice@example.com".to_string()],
            subject: subject.to_string(),
            body: body.to_string(),
            sent_at: sent,
            received_at: sent,
            flags: MailFlags::default(),
        };
        self.store.insert_record(&record).unwrap();
        record
    }

    pub fn assistant(
        &self,
        config: &AppConfig,
        backend: Option<Arc<MemoryBackend>>,
        reasoner: Arc<ScriptedReasoner>,
    ) -> MailAssistant {
        let backend = backend.map(|b| b as Arc<dyn SearchBackend>);
        MailAssistant::new(config, &self.db, self.provider(), backend, reasoner).unwrap()
    }
}
