//! Mailpilot Tools
//!
//! Portable pieces of the operation executor:
//! - `OperationResult` / `OperationFailure` - the uniform call result
//! - prompt-fallback call formatting and parsing for text-only reasoning services
//!
//! Operation implementations and the executor itself live in the main
//! crate's `services::operations` module.

pub mod executor;
pub mod prompt_fallback;

// Re-export core types
pub use executor::{OperationFailure, OperationResult};
pub use prompt_fallback::{
    build_operation_call_instructions, extract_text_without_operation_calls, parse_operation_calls,
};
