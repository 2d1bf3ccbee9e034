//! Operation Executor
//!
//! Runs registered operations with a uniform result shape. Rejections
//! happen before the body runs, in this order: missing identity, unknown
//! operation, invalid arguments. The body runs under a wall-clock timeout;
//! any error it returns is normalized into `{kind, message}`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, warn};

use mailpilot_core::context::OperationContext;
use mailpilot_core::error::{CoreError, CoreResult};
use mailpilot_core::mail::Identity;
use mailpilot_core::operation_trait::{EmailOperation, OperationRegistry};
use mailpilot_tools::OperationResult;

pub struct OperationExecutor {
    registry: Arc<OperationRegistry>,
    timeout: Duration,
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

impl OperationExecutor {
    pub fn new(registry: Arc<OperationRegistry>, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    pub fn registry(&self) -> &Arc<OperationRegistry> {
        &self.registry
    }

    /// Execute one operation call outside any orchestration session.
    pub async fn execute(
        &self,
        operation_name: &str,
        arguments: Value,
        identity: Option<&Identity>,
    ) -> OperationResult {
        let call_id = format!("call-{}", uuid::Uuid::new_v4());
        self.run(operation_name, arguments, identity, None, &call_id)
            .await
    }

    /// Execute one call on behalf of an orchestration session.
    pub async fn execute_in_session(
        &self,
        operation_name: &str,
        arguments: Value,
        identity: Option<&Identity>,
        session_id: &str,
        call_id: &str,
    ) -> OperationResult {
        self.run(operation_name, arguments, identity, Some(session_id), call_id)
            .await
    }

    /// Resolve and validate a call without running it.
    fn prepare(
        &self,
        operation_name: &str,
        arguments: &Value,
        identity: Option<&Identity>,
    ) -> CoreResult<(Arc<dyn EmailOperation>, Identity)> {
        let identity = identity.ok_or(CoreError::AuthenticationRequired)?;
        let op = self.registry.get(operation_name).ok_or_else(|| {
            CoreError::validation(format!("unknown operation '{}'", operation_name))
        })?;
        op.parameters_schema()
            .validate_arguments(arguments)
            .map_err(|e| CoreError::validation(format!("{}: {}", operation_name, e)))?;
        Ok((op, identity.clone()))
    }

    async fn run(
        &self,
        operation_name: &str,
        arguments: Value,
        identity: Option<&Identity>,
        session_id: Option<&str>,
        call_id: &str,
    ) -> OperationResult {
        let start = Instant::now();

        let (op, identity) = match self.prepare(operation_name, &arguments, identity) {
            Ok(prepared) => prepared,
            Err(e) => {
                warn!(
                    operation = %operation_name,
                    kind = %e.kind(),
                    error = %e,
                    "executor: call rejected"
                );
                return OperationResult::from_error(&e, elapsed_ms(start));
            }
        };

        let mut ctx = OperationContext::new(identity, call_id);
        if let Some(session_id) = session_id {
            ctx = ctx.with_session(session_id);
        }

        let outcome = tokio::time::timeout(self.timeout, op.execute(&ctx, arguments)).await;
        let duration_ms = elapsed_ms(start);
        let result = match outcome {
            Ok(Ok(payload)) => OperationResult::ok(payload, duration_ms),
            Ok(Err(e)) => OperationResult::from_error(&e, duration_ms),
            Err(_) => OperationResult::from_error(
                &CoreError::unavailable(
                    format!("operation '{}'", operation_name),
                    format!("timed out after {}s", self.timeout.as_secs()),
                ),
                duration_ms,
            ),
        };

        match &result.error {
            None => debug!(
                operation = %operation_name,
                user = %ctx.user_id(),
                duration_ms,
                "executor: call succeeded"
            ),
            Some(failure) => warn!(
                operation = %operation_name,
                user = %ctx.user_id(),
                duration_ms,
                kind = %failure.kind,
                error = %failure.message,
                "executor: call failed"
            ),
        }
        result
    }
}
