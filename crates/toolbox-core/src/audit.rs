//! Audit events for sandbox executions.
//!
//! [`AuditLogger`] turns runner results into [`AuditEvent`]s and hands them
//! to an [`AuditSink`]. Sinks serialize appends behind a single lock so that
//! events from concurrent executions never interleave.

use std::io::Write;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, ToolboxError};
use crate::sandbox::{ExecutionOutcome, ExecutionResult};

/// Classification of an audit event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EventType {
    #[serde(rename = "sandbox.execution.start")]
    ExecutionStart,
    #[serde(rename = "sandbox.execution.complete")]
    ExecutionComplete,
    #[serde(rename = "sandbox.policy.violation")]
    PolicyViolation,
    #[serde(rename = "sandbox.execution.timeout")]
    Timeout,
}

/// A single audit record, emitted as one JSON line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<Uuid>,
    pub tool_name: String,
    pub command: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub profile: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl AuditEvent {
    fn new(event_type: EventType, tool_name: &str, command: &str, profile: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type,
            execution_id: None,
            tool_name: tool_name.to_string(),
            command: command.to_string(),
            profile: profile.to_string(),
            exit_code: None,
            duration_ms: None,
            violations: Vec::new(),
            error: String::new(),
        }
    }
}

/// Destination for audit events. Implementations must be safe to share
/// across concurrently running executions.
pub trait AuditSink: Send + Sync {
    fn append(&self, event: &AuditEvent) -> Result<()>;
}

/// Writes newline-delimited JSON to any `Write` behind one mutex.
pub struct JsonlAuditSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonlAuditSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Recover the underlying writer.
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|_| ToolboxError::AuditPoisoned)
    }
}

impl<W: Write + Send> AuditSink for JsonlAuditSink<W> {
    fn append(&self, event: &AuditEvent) -> Result<()> {
        // Encode before locking so the critical section is just the write.
        let mut line = serde_json::to_vec(event).map_err(ToolboxError::AuditEncode)?;
        line.push(b'\n');

        let mut writer = self
            .writer
            .lock()
            .map_err(|_| ToolboxError::AuditPoisoned)?;
        writer.write_all(&line)?;
        writer.flush()?;
        Ok(())
    }
}

/// Keeps events in memory; intended for tests and embedding callers that
/// inspect the trail directly.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every event appended so far, in append order.
    pub fn events(&self) -> Vec<AuditEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl AuditSink for MemoryAuditSink {
    fn append(&self, event: &AuditEvent) -> Result<()> {
        self.events
            .lock()
            .map_err(|_| ToolboxError::AuditPoisoned)?
            .push(event.clone());
        Ok(())
    }
}

/// Records execution start and result events to a shared sink.
#[derive(Clone)]
pub struct AuditLogger {
    sink: Arc<dyn AuditSink>,
}

impl AuditLogger {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    /// Record that an execution is starting. Pass the same id to
    /// `Runner::execute_with_id` so the result event correlates with this one.
    pub fn log_start(
        &self,
        execution_id: Uuid,
        tool_name: &str,
        command: &str,
        profile: &str,
    ) -> Result<()> {
        let mut event = AuditEvent::new(EventType::ExecutionStart, tool_name, command, profile);
        event.execution_id = Some(execution_id);
        self.sink.append(&event)
    }

    /// Record the terminal outcome of an execution. Exactly one event is
    /// emitted, classified by the outcome.
    pub fn log_result(
        &self,
        tool_name: &str,
        command: &str,
        profile: &str,
        result: &ExecutionResult,
    ) -> Result<()> {
        let event_type = match result.outcome {
            ExecutionOutcome::Timeout { .. } => EventType::Timeout,
            ExecutionOutcome::PolicyViolation { .. } => EventType::PolicyViolation,
            ExecutionOutcome::Completed { .. } | ExecutionOutcome::ExecutionFailure { .. } => {
                EventType::ExecutionComplete
            }
        };

        let mut event = AuditEvent::new(event_type, tool_name, command, profile);
        event.execution_id = Some(result.execution_id);
        event.exit_code = Some(result.exit_code());
        event.duration_ms = Some(result.duration_ms());
        event.violations = result.violations().iter().map(ToString::to_string).collect();
        event.error = result.error();
        self.sink.append(&event)
    }
}
