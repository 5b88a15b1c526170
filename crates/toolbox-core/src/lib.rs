//! Toolbox Core Library
//!
//! Policy-driven sandbox for agent tool calls: profile selection, the
//! execution runner, and the audit trail.

pub mod audit;
pub mod error;
pub mod obs;
pub mod profile;
pub mod sandbox;
pub mod telemetry;

pub use audit::{AuditEvent, AuditLogger, AuditSink, EventType, JsonlAuditSink, MemoryAuditSink};
pub use error::{Result, ToolboxError};
pub use obs::{
    emit_execution_finished, emit_execution_started, emit_policy_violation, execution_span,
};
pub use profile::{Profile, ProfileConfig, ProfileSet, Resolution};
pub use sandbox::{
    AccessError, ExecutionOutcome, ExecutionResult, Runner, SandboxConfig, Violation,
};
pub use telemetry::init_tracing;

/// Toolbox version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
