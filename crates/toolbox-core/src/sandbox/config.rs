//! Sandbox constraints for a single tool invocation.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timeout applied when a configuration leaves it at zero.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Filesystem, network, resource, and execution constraints.
///
/// Memory, CPU, read-only, and denied-port settings are carried as data only;
/// the runner does not enforce them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SandboxConfig {
    // Filesystem
    /// Path prefixes the tool may touch.
    pub allowed_paths: Vec<String>,
    /// Path prefixes that are always rejected.
    pub denied_paths: Vec<String>,
    pub read_only: bool,

    // Network
    pub allow_network: bool,
    /// Host allowlist; subdomains of an entry also match.
    pub allowed_hosts: Vec<String>,
    pub denied_ports: Vec<u16>,

    // Resources
    pub max_memory_mb: u64,
    pub max_cpu_seconds: f64,
    #[serde(with = "duration_ms")]
    pub timeout: Duration,

    // Execution
    pub work_dir: Option<PathBuf>,
    /// Complete child environment as `KEY=VALUE` entries. Nothing is inherited.
    pub env: Vec<String>,
}

impl Default for SandboxConfig {
    /// The restrictive baseline: no network, system directories denied,
    /// everything confined to `/tmp/sandbox`.
    fn default() -> Self {
        Self {
            allowed_paths: vec!["/tmp/sandbox".to_string()],
            denied_paths: ["/etc", "/var", "/root", "/home"]
                .iter()
                .map(|p| (*p).to_string())
                .collect(),
            read_only: false,
            allow_network: false,
            allowed_hosts: Vec::new(),
            denied_ports: Vec::new(),
            max_memory_mb: 256,
            max_cpu_seconds: 30.0,
            timeout: DEFAULT_TIMEOUT,
            work_dir: Some(PathBuf::from("/tmp/sandbox")),
            env: Vec::new(),
        }
    }
}

impl SandboxConfig {
    /// Timeout the runner actually arms: the configured one, or
    /// [`DEFAULT_TIMEOUT`] when it is zero.
    pub fn effective_timeout(&self) -> Duration {
        if self.timeout.is_zero() {
            DEFAULT_TIMEOUT
        } else {
            self.timeout
        }
    }

    pub fn with_allowed_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_denied_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.denied_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_network(mut self, allow: bool) -> Self {
        self.allow_network = allow;
        self
    }

    pub fn with_allowed_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_hosts = hosts.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set or clear the working directory.
    pub fn with_work_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.work_dir = dir;
        self
    }

    pub fn with_env<I, S>(mut self, env: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.env = env.into_iter().map(Into::into).collect();
        self
    }
}

/// Serializes a `Duration` as whole milliseconds.
pub(crate) mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_restrictive() {
        let cfg = SandboxConfig::default();
        assert!(!cfg.allow_network);
        assert_eq!(cfg.max_memory_mb, 256);
        assert_eq!(cfg.timeout, Duration::from_secs(30));
        assert_eq!(cfg.allowed_paths, vec!["/tmp/sandbox"]);
        assert_eq!(cfg.denied_paths, vec!["/etc", "/var", "/root", "/home"]);
        assert_eq!(cfg.work_dir, Some(PathBuf::from("/tmp/sandbox")));
        assert!(cfg.env.is_empty());
    }

    #[test]
    fn test_effective_timeout_falls_back_when_zero() {
        let cfg = SandboxConfig::default().with_timeout(Duration::ZERO);
        assert_eq!(cfg.effective_timeout(), DEFAULT_TIMEOUT);

        let cfg = SandboxConfig::default().with_timeout(Duration::from_millis(100));
        assert_eq!(cfg.effective_timeout(), Duration::from_millis(100));
    }

    #[test]
    fn test_builders_replace_fields() {
        let cfg = SandboxConfig::default()
            .with_allowed_paths(["/"])
            .with_denied_paths(Vec::<String>::new())
            .with_work_dir(None)
            .with_network(true)
            .with_allowed_hosts(["example.com"])
            .with_env(["PATH=/usr/bin"]);
        assert_eq!(cfg.allowed_paths, vec!["/"]);
        assert!(cfg.denied_paths.is_empty());
        assert!(cfg.work_dir.is_none());
        assert!(cfg.allow_network);
        assert_eq!(cfg.allowed_hosts, vec!["example.com"]);
        assert_eq!(cfg.env, vec!["PATH=/usr/bin"]);
    }

    #[test]
    fn test_timeout_serializes_as_millis() {
        let cfg = SandboxConfig::default().with_timeout(Duration::from_millis(1500));
        let json = serde_json::to_value(&cfg).unwrap();
        assert_eq!(json["timeout"], 1500);
    }
}
