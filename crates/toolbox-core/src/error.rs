//! Crate-level error taxonomy.

use std::path::PathBuf;

/// Errors raised outside the runner: loading profiles and writing audit
/// events. Runner outcomes are never errors; see `ExecutionOutcome`.
#[derive(Debug, thiserror::Error)]
pub enum ToolboxError {
    #[error("read profiles {path}: {source}")]
    ProfileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse profiles: {0}")]
    ProfileParse(#[source] serde_json::Error),

    #[error("audit write failed: {0}")]
    AuditIo(#[from] std::io::Error),

    #[error("audit encode failed: {0}")]
    AuditEncode(#[source] serde_json::Error),

    #[error("audit sink lock poisoned")]
    AuditPoisoned,
}

/// Result type for toolbox operations.
pub type Result<T> = std::result::Result<T, ToolboxError>;
