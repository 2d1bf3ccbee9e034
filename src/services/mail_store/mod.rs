//! Mail Store
//!
//! SQLite implementation of the `DataProvider` contract.

pub mod sqlite_provider;

pub use sqlite_provider::SqliteMailStore;
