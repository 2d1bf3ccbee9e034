//! Email Operations
//!
//! - `impls` - the built-in operations
//! - `registry` - static declaration of the catalog
//! - `executor` - authenticated, validated, timed execution

pub mod executor;
pub mod impls;
pub mod registry;

pub use executor::OperationExecutor;
pub use registry::{builtin_operations, builtin_registry, OperationDeps};
