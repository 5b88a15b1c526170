//! Sandbox profiles: named configurations selected by tool name.
//!
//! A profile document is loaded once and read-only afterwards. Selection is
//! exact pattern, then the `*` wildcard, then the declared default profile.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, ToolboxError};
use crate::sandbox::SandboxConfig;

/// Pattern that matches any tool name.
pub const WILDCARD_PATTERN: &str = "*";

/// Profile name reported when nothing in the set matched.
pub const FALLBACK_PROFILE_NAME: &str = "default";

/// Partial sandbox configuration carried by a profile.
///
/// Every field except `allow_network` is an explicit override: absent means
/// "keep the baseline". A present empty list or a zero or negative number is
/// also treated as absent, so zero cannot express "unlimited".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProfileConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_paths: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denied_paths: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
    /// Always applied verbatim; a document that omits it denies network.
    #[serde(default)]
    pub allow_network: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_hosts: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denied_ports: Option<Vec<u16>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_memory_mb: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_cpu_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<Vec<String>>,
}

impl ProfileConfig {
    /// Merge onto [`SandboxConfig::default`] with sparse-override semantics.
    pub fn to_sandbox_config(&self) -> SandboxConfig {
        let mut cfg = SandboxConfig::default();

        if let Some(paths) = non_empty("allowed_paths", &self.allowed_paths) {
            cfg.allowed_paths = paths;
        }
        if let Some(paths) = non_empty("denied_paths", &self.denied_paths) {
            cfg.denied_paths = paths;
        }
        if let Some(read_only) = self.read_only {
            cfg.read_only = read_only;
        }
        cfg.allow_network = self.allow_network;
        if let Some(hosts) = non_empty("allowed_hosts", &self.allowed_hosts) {
            cfg.allowed_hosts = hosts;
        }
        if let Some(ports) = non_empty("denied_ports", &self.denied_ports) {
            cfg.denied_ports = ports;
        }
        if let Some(mb) = positive("max_memory_mb", self.max_memory_mb, |v| v <= 0) {
            cfg.max_memory_mb = mb.unsigned_abs();
        }
        if let Some(secs) = positive("max_cpu_seconds", self.max_cpu_seconds, |v| v <= 0.0) {
            cfg.max_cpu_seconds = secs;
        }
        if let Some(secs) = positive("timeout_seconds", self.timeout_seconds, |v| v <= 0) {
            cfg.timeout = Duration::from_secs(secs.unsigned_abs());
        }
        match &self.work_dir {
            Some(dir) if dir.as_os_str().is_empty() => {
                warn!(field = "work_dir", "ignoring empty override, keeping default");
            }
            Some(dir) => cfg.work_dir = Some(dir.clone()),
            None => {}
        }
        if let Some(env) = non_empty("env", &self.env) {
            cfg.env = env;
        }

        cfg
    }
}

fn non_empty<T: Clone>(field: &'static str, value: &Option<Vec<T>>) -> Option<Vec<T>> {
    match value {
        Some(list) if list.is_empty() => {
            warn!(field, "ignoring empty override, keeping default");
            None
        }
        other => other.clone(),
    }
}

fn positive<T: Copy>(
    field: &'static str,
    value: Option<T>,
    is_unset: impl Fn(T) -> bool,
) -> Option<T> {
    match value {
        Some(v) if is_unset(v) => {
            warn!(field, "ignoring non-positive override, keeping default");
            None
        }
        other => other,
    }
}

/// A named sandbox configuration for a tool or category of tools.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Exact tool names, or [`WILDCARD_PATTERN`].
    #[serde(default)]
    pub tool_patterns: Vec<String>,
    #[serde(default)]
    pub config: ProfileConfig,
}

impl Profile {
    fn matches_exactly(&self, tool_name: &str) -> bool {
        self.tool_patterns.iter().any(|p| p == tool_name)
    }

    fn is_wildcard(&self) -> bool {
        self.tool_patterns.iter().any(|p| p == WILDCARD_PATTERN)
    }
}

/// An ordered collection of profiles plus an optional default profile name.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProfileSet {
    #[serde(default)]
    pub profiles: Vec<Profile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

/// The profile chosen for a tool and the configuration derived from it.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub profile_name: String,
    pub config: SandboxConfig,
}

impl Resolution {
    /// Used when no profile document is given or nothing matched.
    pub fn fallback() -> Self {
        Self {
            profile_name: FALLBACK_PROFILE_NAME.to_string(),
            config: SandboxConfig::default(),
        }
    }
}

impl ProfileSet {
    /// Load a profile document from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|source| ToolboxError::ProfileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let set = Self::parse(&data)?;
        debug!(path = %path.display(), profiles = set.profiles.len(), "loaded profile set");
        Ok(set)
    }

    /// Parse a profile document from JSON text.
    pub fn parse(data: &str) -> Result<Self> {
        let set: Self = serde_json::from_str(data).map_err(ToolboxError::ProfileParse)?;
        if let Some(name) = set.default_name() {
            if !set.profiles.iter().any(|p| p.name == name) {
                warn!(default = %name, "default profile does not name any profile");
            }
        }
        Ok(set)
    }

    fn default_name(&self) -> Option<&str> {
        self.default.as_deref().filter(|name| !name.is_empty())
    }

    /// Best profile for `tool_name`: an exact pattern anywhere in the list,
    /// else the first wildcard profile, else the declared default.
    pub fn find_profile(&self, tool_name: &str) -> Option<&Profile> {
        self.profiles
            .iter()
            .find(|p| p.matches_exactly(tool_name))
            .or_else(|| self.profiles.iter().find(|p| p.is_wildcard()))
            .or_else(|| {
                let name = self.default_name()?;
                self.profiles.iter().find(|p| p.name == name)
            })
    }

    /// Resolve `tool_name` to a profile name and merged configuration,
    /// falling back to the baseline when nothing matches.
    pub fn resolve(&self, tool_name: &str) -> Resolution {
        match self.find_profile(tool_name) {
            Some(profile) => {
                debug!(tool = %tool_name, profile = %profile.name, "matched profile");
                Resolution {
                    profile_name: profile.name.clone(),
                    config: profile.config.to_sandbox_config(),
                }
            }
            None => {
                debug!(tool = %tool_name, "no profile matched, using baseline");
                Resolution::fallback()
            }
        }
    }
}
