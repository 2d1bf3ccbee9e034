//! Operation Traits and Registry
//!
//! Split definition/execution traits for email operations:
//!
//! - `OperationDefinition` - identity, parameter schema, retrieval and artifact flags
//! - `OperationExecutable` - execution capability
//! - `EmailOperation` - combined trait (blanket impl)
//! - `OperationRegistry` - statically declared catalog, validated at startup
//!
//! The split lets the reasoning-service catalog be generated from
//! definitions alone, and lets tests pair a real definition with a mock body.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::OperationContext;
use crate::error::{CoreError, CoreResult};
use crate::schema::ParameterSchema;

/// Name of the argument every record-retrieving operation must declare.
pub const RECORD_ID_PARAM: &str = "record_id";

// ============================================================================
// Trait Definitions
// ============================================================================

/// Operation definition metadata.
pub trait OperationDefinition: Send + Sync {
    /// Unique name (e.g. "search_emails", "draft_reply").
    fn name(&self) -> &str;

    /// Human-readable description sent to the reasoning service.
    fn description(&self) -> &str;

    /// Declared parameters. Must be an object schema.
    fn parameters_schema(&self) -> ParameterSchema;

    /// Whether the operation retrieves a specific record (by `record_id`)
    /// before doing its work.
    fn requires_record(&self) -> bool {
        false
    }

    /// Whether the payload is a user-facing artifact (a search result
    /// list, a summary, a created draft) rather than intermediate data.
    fn produces_artifact(&self) -> bool {
        false
    }

    /// Catalog entry for this operation.
    fn descriptor(&self) -> OperationDescriptor {
        OperationDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.parameters_schema(),
            requires_record: self.requires_record(),
            produces_artifact: self.produces_artifact(),
        }
    }
}

/// Operation execution.
#[async_trait]
pub trait OperationExecutable: Send + Sync {
    /// Run the operation body.
    ///
    /// Arguments have already been validated against `parameters_schema()`
    /// and the identity in `ctx` is authenticated.
    async fn execute(&self, ctx: &OperationContext, args: Value) -> CoreResult<Value>;
}

/// Combined trait implemented by every registered operation.
pub trait EmailOperation: OperationDefinition + OperationExecutable {}

impl<T: OperationDefinition + OperationExecutable> EmailOperation for T {}

/// Serializable catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: ParameterSchema,
    pub requires_record: bool,
    pub produces_artifact: bool,
}

// ============================================================================
// OperationRegistry
// ============================================================================

/// Registry of email operations.
///
/// O(1) lookup by name, deterministic iteration in declaration order.
/// Duplicate names are rejected rather than replaced.
#[derive(Default)]
pub struct OperationRegistry {
    operations: HashMap<String, Arc<dyn EmailOperation>>,
    order: Vec<String>,
}

impl std::fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationRegistry")
            .field("operations", &self.order)
            .finish()
    }
}

impl OperationRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a static declaration list and validate it.
    pub fn from_operations(operations: Vec<Arc<dyn EmailOperation>>) -> CoreResult<Self> {
        let mut registry = Self::new();
        for op in operations {
            registry.register(op)?;
        }
        registry.validate()?;
        Ok(registry)
    }

    /// Register an operation. Fails if the name is already taken.
    pub fn register(&mut self, op: Arc<dyn EmailOperation>) -> CoreResult<()> {
        let name = op.name().to_string();
        if self.operations.contains_key(&name) {
            return Err(CoreError::validation(format!(
                "operation '{}' is declared twice",
                name
            )));
        }
        self.order.push(name.clone());
        self.operations.insert(name, op);
        Ok(())
    }

    /// Check every declaration.
    ///
    /// - names are non-empty identifiers (`[a-z0-9_]`)
    /// - schemas are object-typed and well formed
    /// - record-retrieving operations require a string `record_id`
    pub fn validate(&self) -> CoreResult<()> {
        for name in &self.order {
            let Some(op) = self.operations.get(name) else {
                return Err(CoreError::internal(format!(
                    "registry order references missing operation '{}'",
                    name
                )));
            };
            if name.is_empty()
                || !name
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
            {
                return Err(CoreError::validation(format!(
                    "invalid operation name '{}'",
                    name
                )));
            }
            if op.description().trim().is_empty() {
                return Err(CoreError::validation(format!(
                    "operation '{}' has no description",
                    name
                )));
            }
            let schema = op.parameters_schema();
            if schema.schema_type != "object" {
                return Err(CoreError::validation(format!(
                    "operation '{}' parameters must be an object schema",
                    name
                )));
            }
            schema
                .validate_declaration()
                .map_err(|e| CoreError::validation(format!("operation '{}': {}", name, e)))?;
            if op.requires_record() {
                let declares_record_id = schema
                    .properties
                    .as_ref()
                    .and_then(|p| p.get(RECORD_ID_PARAM))
                    .map(|p| p.schema_type == "string")
                    .unwrap_or(false);
                let requires_record_id =
                    schema.required_names().iter().any(|r| r == RECORD_ID_PARAM);
                if !declares_record_id || !requires_record_id {
                    return Err(CoreError::validation(format!(
                        "operation '{}' retrieves a record but does not require a string '{}'",
                        name, RECORD_ID_PARAM
                    )));
                }
            }
        }
        Ok(())
    }

    /// Look up an operation by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn EmailOperation>> {
        self.operations.get(name).cloned()
    }

    /// Check if an operation is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.operations.contains_key(name)
    }

    /// All operation names in declaration order.
    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Number of registered operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Catalog in declaration order, suitable for the reasoning service.
    pub fn catalog(&self) -> Vec<OperationDescriptor> {
        self.order
            .iter()
            .filter_map(|name| self.operations.get(name))
            .map(|op| op.descriptor())
            .collect()
    }

    /// Whether the named operation produces a user-facing artifact.
    pub fn produces_artifact(&self, name: &str) -> bool {
        self.operations
            .get(name)
            .map(|op| op.produces_artifact())
            .unwrap_or(false)
    }
}

// ============================================================================
// Tests
// ============================================================================
