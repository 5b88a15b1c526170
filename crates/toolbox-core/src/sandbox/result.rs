//! Execution outcomes.

use std::time::Duration;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use uuid::Uuid;

use super::policy::Violation;

/// Exit code reported for anything that did not run to a normal exit.
pub const ABNORMAL_EXIT_CODE: i32 = -1;

/// Error text attached to deadline kills.
pub const TIMEOUT_ERROR: &str = "timeout exceeded";

/// How an invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// The process ran to a reported exit status, zero or not.
    Completed {
        exit_code: i32,
        stdout: String,
        stderr: String,
    },
    /// Policy refused the invocation; nothing was spawned.
    PolicyViolation { violations: Vec<Violation> },
    /// The deadline fired and the process was killed.
    Timeout { stdout: String, stderr: String },
    /// The process could not be launched or waited on.
    ExecutionFailure {
        error: String,
        stdout: String,
        stderr: String,
    },
}

impl ExecutionOutcome {
    /// Stable tag used in logs and serialized output.
    pub fn kind(&self) -> &'static str {
        match self {
            ExecutionOutcome::Completed { .. } => "completed",
            ExecutionOutcome::PolicyViolation { .. } => "policy_violation",
            ExecutionOutcome::Timeout { .. } => "timeout",
            ExecutionOutcome::ExecutionFailure { .. } => "execution_failure",
        }
    }
}

/// Result of one `Runner::execute` call. Never mutated after it is returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Correlates the tracing span and audit events of this invocation.
    pub execution_id: Uuid,
    pub outcome: ExecutionOutcome,
    /// Wall-clock span from call start to classification.
    pub duration: Duration,
}

impl ExecutionResult {
    pub fn exit_code(&self) -> i32 {
        match &self.outcome {
            ExecutionOutcome::Completed { exit_code, .. } => *exit_code,
            _ => ABNORMAL_EXIT_CODE,
        }
    }

    pub fn stdout(&self) -> &str {
        match &self.outcome {
            ExecutionOutcome::Completed { stdout, .. }
            | ExecutionOutcome::Timeout { stdout, .. }
            | ExecutionOutcome::ExecutionFailure { stdout, .. } => stdout,
            ExecutionOutcome::PolicyViolation { .. } => "",
        }
    }

    pub fn stderr(&self) -> &str {
        match &self.outcome {
            ExecutionOutcome::Completed { stderr, .. }
            | ExecutionOutcome::Timeout { stderr, .. }
            | ExecutionOutcome::ExecutionFailure { stderr, .. } => stderr,
            ExecutionOutcome::PolicyViolation { .. } => "",
        }
    }

    /// Whether the deadline killed the process.
    pub fn killed(&self) -> bool {
        matches!(self.outcome, ExecutionOutcome::Timeout { .. })
    }

    pub fn violations(&self) -> &[Violation] {
        match &self.outcome {
            ExecutionOutcome::PolicyViolation { violations } => violations,
            _ => &[],
        }
    }

    /// Error text; empty for a completed run.
    pub fn error(&self) -> String {
        match &self.outcome {
            ExecutionOutcome::Completed { .. } => String::new(),
            ExecutionOutcome::PolicyViolation { violations } => {
                let joined = violations
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ");
                format!("policy violation: {joined}")
            }
            ExecutionOutcome::Timeout { .. } => TIMEOUT_ERROR.to_string(),
            ExecutionOutcome::ExecutionFailure { error, .. } => error.clone(),
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration.as_millis() as u64
    }

    /// True only for a completed run with exit code zero.
    pub fn succeeded(&self) -> bool {
        matches!(
            self.outcome,
            ExecutionOutcome::Completed { exit_code: 0, .. }
        )
    }
}

// Flattened view: the outcome tag plus every field a consumer of the plain
// record expects. Empty error and violations are omitted.
impl Serialize for ExecutionResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ExecutionResult", 9)?;
        state.serialize_field("execution_id", &self.execution_id)?;
        state.serialize_field("outcome", self.outcome.kind())?;
        state.serialize_field("exit_code", &self.exit_code())?;
        state.serialize_field("stdout", self.stdout())?;
        state.serialize_field("stderr", self.stderr())?;
        state.serialize_field("duration_ms", &self.duration_ms())?;
        state.serialize_field("killed", &self.killed())?;
        let error = self.error();
        if error.is_empty() {
            state.skip_field("error")?;
        } else {
            state.serialize_field("error", &error)?;
        }
        if self.violations().is_empty() {
            state.skip_field("violations")?;
        } else {
            state.serialize_field("violations", self.violations())?;
        }
        state.end()
    }
}
