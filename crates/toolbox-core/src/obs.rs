//! Structured tracing hooks for the execution lifecycle.
//!
//! The runner calls these at each state transition. An invocation emits
//! `execution.policy_violation` or `execution.started`, then always
//! `execution.finished`, all inside one `toolbox.execution` span.

use tracing::{info, warn};
use uuid::Uuid;

use crate::sandbox::ExecutionResult;

/// Span tagged with the execution id and command.
pub fn execution_span(execution_id: &Uuid, command: &str) -> tracing::Span {
    tracing::info_span!("toolbox.execution", execution_id = %execution_id, command = %command)
}

/// Emit event: an invocation passed policy and is about to spawn.
pub fn emit_execution_started(command: &str, arg_count: usize, timeout_ms: u64) {
    info!(
        event = "execution.started",
        command = %command,
        arg_count = arg_count,
        timeout_ms = timeout_ms,
    );
}

/// Emit event: policy refused an invocation (warn level).
pub fn emit_policy_violation(command: &str, violations: &[String]) {
    warn!(
        event = "execution.policy_violation",
        command = %command,
        count = violations.len(),
        violations = ?violations,
    );
}

/// Emit event: an invocation reached a terminal outcome.
pub fn emit_execution_finished(result: &ExecutionResult) {
    if result.killed() {
        warn!(
            event = "execution.finished",
            outcome = result.outcome.kind(),
            duration_ms = result.duration_ms(),
        );
    } else {
        info!(
            event = "execution.finished",
            outcome = result.outcome.kind(),
            exit_code = result.exit_code(),
            duration_ms = result.duration_ms(),
        );
    }
}
