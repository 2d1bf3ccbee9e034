//! Execution Context
//!
//! Context handed to an operation body. It is only constructed by the
//! executor after the identity check, so an operation can never observe
//! an unauthenticated request.

use crate::mail::Identity;

/// Context for one operation invocation.
#[derive(Debug, Clone)]
pub struct OperationContext {
    identity: Identity,
    session_id: Option<String>,
    call_id: String,
}

impl OperationContext {
    /// Create a new context for an authenticated identity.
    pub fn new(identity: Identity, call_id: impl Into<String>) -> Self {
        Self {
            identity,
            session_id: None,
            call_id: call_id.into(),
        }
    }

    /// Attach the orchestration session this call belongs to.
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn user_id(&self) -> &str {
        &self.identity.user_id
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Identifier of this call (reasoning-service call id or generated).
    pub fn call_id(&self) -> &str {
        &self.call_id
    }
}
