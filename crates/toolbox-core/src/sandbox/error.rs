//! Error types for advisory path and host validation.

/// Why a path or host was refused by `Runner::validate_path` / `validate_host`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error("path '{path}' is denied (matches {prefix})")]
    DeniedPath { path: String, prefix: String },

    #[error("path '{path}' contains traversal")]
    PathTraversal { path: String },

    #[error("path '{path}' not in allowed list")]
    PathNotAllowed { path: String },

    #[error("network access disabled")]
    NetworkDisabled,

    #[error("host '{host}' not in allowed list")]
    HostNotAllowed { host: String },
}

/// Result type for access validation.
pub type AccessResult<T> = std::result::Result<T, AccessError>;
