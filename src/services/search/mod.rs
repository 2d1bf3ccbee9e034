//! Search
//!
//! Index-backed search with a Data Provider fallback, followed by the
//! score-relative relevance filter.

pub mod adapter;
pub mod http_backend;
pub mod relevance;
pub mod service;

pub use adapter::{
    SearchBackend, SearchDocument, SearchIndexAdapter, SearchOutcome, SearchResult, SearchSource,
};
pub use http_backend::HttpSearchBackend;
pub use relevance::{FilterOutcome, FilterReport};
pub use service::{SearchResponse, SearchService};
