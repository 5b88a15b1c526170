//! Pre-execution policy checks.
//!
//! Matching is plain substring/suffix comparison on the raw strings. Paths are
//! not canonicalized, so symlinks and encoded paths are not resolved.

use serde::{Serialize, Serializer};

use super::config::SandboxConfig;

/// Utilities refused outright when network access is disabled.
pub const NETWORK_COMMANDS: &[&str] = &["curl", "wget", "nc", "ncat", "ssh", "scp", "rsync"];

/// Literal patterns refused anywhere in the full command line.
pub const DANGEROUS_PATTERNS: &[&str] = &["rm -rf /", "mkfs", "dd if=/dev/zero", ":(){ :|:& };:"];

/// A single pre-execution rule failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// The joined arguments mention a denied path prefix.
    DeniedPathArgument { path: String },
    /// The command itself mentions a denied path prefix.
    DeniedPathCommand { path: String },
    PathTraversal,
    NetworkCommand { command: String },
    DangerousPattern { pattern: String },
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Violation::DeniedPathArgument { path } => write!(f, "access to denied path: {path}"),
            Violation::DeniedPathCommand { path } => write!(f, "command in denied path: {path}"),
            Violation::PathTraversal => write!(f, "path traversal detected"),
            Violation::NetworkCommand { command } => {
                write!(f, "network command '{command}' not allowed")
            }
            Violation::DangerousPattern { pattern } => {
                write!(f, "dangerous command pattern: {pattern}")
            }
        }
    }
}

// Violations travel as their human-readable description.
impl Serialize for Violation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Evaluate `command` and `args` against `config`.
///
/// Every check runs; all violations are returned in check order. An empty
/// vector means the invocation may be spawned.
pub fn check_policy(config: &SandboxConfig, command: &str, args: &[String]) -> Vec<Violation> {
    let mut violations = Vec::new();
    let joined = args.join(" ");

    for denied in &config.denied_paths {
        if joined.contains(denied.as_str()) {
            violations.push(Violation::DeniedPathArgument {
                path: denied.clone(),
            });
        }
        if command.contains(denied.as_str()) {
            violations.push(Violation::DeniedPathCommand {
                path: denied.clone(),
            });
        }
    }

    if joined.contains("..") {
        violations.push(Violation::PathTraversal);
    }

    if !config.allow_network {
        for name in NETWORK_COMMANDS {
            if is_invocation_of(command, name) {
                violations.push(Violation::NetworkCommand {
                    command: (*name).to_string(),
                });
            }
        }
    }

    let full_command = format!("{command} {joined}");
    for pattern in DANGEROUS_PATTERNS {
        if full_command.contains(pattern) {
            violations.push(Violation::DangerousPattern {
                pattern: (*pattern).to_string(),
            });
        }
    }

    violations
}

/// `command` is `name` itself or a path ending in `/name`.
fn is_invocation_of(command: &str, name: &str) -> bool {
    command == name
        || command
            .strip_suffix(name)
            .is_some_and(|prefix| prefix.ends_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|a| (*a).to_string()).collect()
    }

    #[test]
    fn test_clean_invocation_has_no_violations() {
        let cfg = SandboxConfig::default();
        assert!(check_policy(&cfg, "echo", &args(&["hello"])).is_empty());
    }

    #[test]
    fn test_denied_path_in_args_and_command() {
        let cfg = SandboxConfig::default();
        let v = check_policy(&cfg, "/etc/init.d/thing", &args(&["/etc/passwd"]));
        assert_eq!(
            v,
            vec![
                Violation::DeniedPathArgument {
                    path: "/etc".into()
                },
                Violation::DeniedPathCommand {
                    path: "/etc".into()
                },
            ]
        );
    }

    #[test]
    fn test_traversal_detected_anywhere_in_args() {
        let cfg = SandboxConfig::default().with_denied_paths(Vec::<String>::new());
        let v = check_policy(&cfg, "cat", &args(&["notes", "a..b"]));
        assert_eq!(v, vec![Violation::PathTraversal]);
    }

    #[test]
    fn test_network_command_bare_and_path_suffixed() {
        let cfg = SandboxConfig::default();
        for cmd in ["curl", "/usr/bin/curl", "nc", "/bin/nc", "ncat"] {
            let v = check_policy(&cfg, cmd, &[]);
            assert!(
                v.iter()
                    .any(|v| matches!(v, Violation::NetworkCommand { .. })),
                "expected network violation for {cmd}"
            );
        }
    }

    #[test]
    fn test_network_check_does_not_match_substrings() {
        let cfg = SandboxConfig::default();
        // "/usr/bin/sync" ends with "sync", not "/rsync"
        assert!(check_policy(&cfg, "/usr/bin/sync", &[]).is_empty());
        assert!(check_policy(&cfg, "mycurl", &[]).is_empty());
    }

    #[test]
    fn test_network_commands_allowed_when_network_enabled() {
        let cfg = SandboxConfig::default().with_network(true);
        assert!(check_policy(&cfg, "curl", &args(&["https://example.com"])).is_empty());
    }

    #[test]
    fn test_dangerous_patterns_span_command_and_args() {
        let cfg = SandboxConfig::default().with_denied_paths(Vec::<String>::new());
        let v = check_policy(&cfg, "rm", &args(&["-rf", "/"]));
        assert_eq!(
            v,
            vec![Violation::DangerousPattern {
                pattern: "rm -rf /".into()
            }]
        );

        let v = check_policy(&cfg, "mkfs.ext4", &args(&["/dev/sda1"]));
        assert!(v.contains(&Violation::DangerousPattern {
            pattern: "mkfs".into()
        }));
    }

    #[test]
    fn test_all_checks_accumulate() {
        let cfg = SandboxConfig::default();
        let v = check_policy(&cfg, "curl", &args(&["../etc/shadow"]));
        assert_eq!(v.len(), 3);
        assert_eq!(v[0].to_string(), "access to denied path: /etc");
        assert_eq!(v[1].to_string(), "path traversal detected");
        assert_eq!(v[2].to_string(), "network command 'curl' not allowed");
    }

    #[test]
    fn test_violation_serializes_as_description() {
        let json = serde_json::to_string(&Violation::PathTraversal).unwrap();
        assert_eq!(json, "\"path traversal detected\"");
    }
}
