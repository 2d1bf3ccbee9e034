//! Index Cache
//!
//! Per-user search collection lifecycle:
//! - `fingerprint` - order-independent digest of a corpus
//! - `collection_store` - durable SQLite state
//! - `cache_manager` - staleness decisions and batched reindexing

pub mod cache_manager;
pub mod collection_store;
pub mod fingerprint;

pub use cache_manager::{IndexCacheManager, IndexOutcome, ReindexReason};
pub use collection_store::{CollectionStore, IndexCollection};
pub use fingerprint::fingerprint;
