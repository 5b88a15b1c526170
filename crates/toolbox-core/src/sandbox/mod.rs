//! Sandbox: policy-checked execution of agent tool commands.
//!
//! A [`Runner`] is bound to one immutable [`SandboxConfig`]. Each call to
//! [`Runner::execute`] evaluates every policy rule, and only when none is
//! violated spawns the command under a deadline and classifies how it ended.
//!
//! # Modules
//!
//! - [`config`]  - `SandboxConfig` and its restrictive default
//! - [`policy`]  - `Violation`, `check_policy()` (all checks, no short-circuit)
//! - [`runner`]  - `Runner::execute()`, `validate_path()`, `validate_host()`
//! - [`result`]  - `ExecutionOutcome` / `ExecutionResult`
//! - [`error`]   - `AccessError` / `AccessResult`

pub mod config;
pub mod error;
pub mod policy;
pub mod result;
pub mod runner;

pub use config::{SandboxConfig, DEFAULT_TIMEOUT};
pub use error::{AccessError, AccessResult};
pub use policy::{check_policy, Violation, DANGEROUS_PATTERNS, NETWORK_COMMANDS};
pub use result::{ExecutionOutcome, ExecutionResult, ABNORMAL_EXIT_CODE, TIMEOUT_ERROR};
pub use runner::Runner;
