//! Policy-checked process execution under a deadline.

use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, warn, Instrument};
use uuid::Uuid;

use crate::obs;

use super::config::SandboxConfig;
use super::error::{AccessError, AccessResult};
use super::policy::{check_policy, Violation};
use super::result::{ExecutionOutcome, ExecutionResult, ABNORMAL_EXIT_CODE};

const READ_CHUNK: usize = 8 * 1024;

/// Executes tool commands within the constraints of one [`SandboxConfig`].
///
/// A runner holds no per-call state, so a single instance (behind an `Arc`)
/// can serve any number of concurrent [`Runner::execute`] calls.
#[derive(Debug, Clone)]
pub struct Runner {
    config: SandboxConfig,
}

impl Runner {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Run every policy check against `command` and `args`.
    pub fn check_policy(&self, command: &str, args: &[String]) -> Vec<Violation> {
        check_policy(&self.config, command, args)
    }

    /// Check policy, then spawn `command` and wait for it or the deadline.
    ///
    /// Never fails: every failure mode is reported through the returned
    /// [`ExecutionOutcome`]. Dropping the future kills the child.
    pub async fn execute(&self, command: &str, args: &[String]) -> ExecutionResult {
        self.execute_with_id(Uuid::new_v4(), command, args).await
    }

    /// Like [`Runner::execute`], but under a caller-allocated execution id so
    /// events recorded before the call can share it.
    pub async fn execute_with_id(
        &self,
        execution_id: Uuid,
        command: &str,
        args: &[String],
    ) -> ExecutionResult {
        let span = obs::execution_span(&execution_id, command);
        self.execute_inner(execution_id, command, args)
            .instrument(span)
            .await
    }

    async fn execute_inner(
        &self,
        execution_id: Uuid,
        command: &str,
        args: &[String],
    ) -> ExecutionResult {
        let start = Instant::now();

        let violations = self.check_policy(command, args);
        if !violations.is_empty() {
            let descriptions: Vec<String> = violations.iter().map(ToString::to_string).collect();
            obs::emit_policy_violation(command, &descriptions);
            return finish(
                execution_id,
                ExecutionOutcome::PolicyViolation { violations },
                start,
            );
        }

        let timeout = self.config.effective_timeout();
        obs::emit_execution_started(command, args.len(), timeout.as_millis() as u64);

        let outcome = self.supervise(command, args, timeout).await;
        finish(execution_id, outcome, start)
    }

    async fn supervise(
        &self,
        command: &str,
        args: &[String],
        timeout: Duration,
    ) -> ExecutionOutcome {
        let mut child = match self.build_command(command, args).spawn() {
            Ok(child) => child,
            Err(e) => {
                return ExecutionOutcome::ExecutionFailure {
                    error: e.to_string(),
                    stdout: String::new(),
                    stderr: String::new(),
                }
            }
        };
        debug!(pid = ?child.id(), "spawned child");

        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        // The buffers outlive the supervised future, so whatever was read
        // before the deadline survives the cancellation.
        let supervised = async {
            let (status, out_read, err_read) = tokio::join!(
                child.wait(),
                drain(stdout_pipe, &mut stdout),
                drain(stderr_pipe, &mut stderr),
            );
            for (stream, read) in [("stdout", out_read), ("stderr", err_read)] {
                if let Err(e) = read {
                    warn!(stream, error = %e, "failed to capture child output");
                }
            }
            status
        };
        // Saturates when the deadline is too far out to represent.
        let waited = tokio::time::timeout(timeout, supervised).await;

        let stdout = String::from_utf8_lossy(&stdout).into_owned();
        let stderr = String::from_utf8_lossy(&stderr).into_owned();

        match waited {
            Err(_elapsed) => {
                if let Err(e) = child.kill().await {
                    debug!(error = %e, "kill after deadline failed");
                }
                ExecutionOutcome::Timeout { stdout, stderr }
            }
            Ok(Ok(status)) => ExecutionOutcome::Completed {
                exit_code: status.code().unwrap_or(ABNORMAL_EXIT_CODE),
                stdout,
                stderr,
            },
            Ok(Err(e)) => {
                if let Err(kill_err) = child.start_kill() {
                    debug!(error = %kill_err, "kill after wait failure failed");
                }
                ExecutionOutcome::ExecutionFailure {
                    error: e.to_string(),
                    stdout,
                    stderr,
                }
            }
        }
    }

    fn build_command(&self, command: &str, args: &[String]) -> Command {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .env_clear()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &self.config.work_dir {
            cmd.current_dir(dir);
        }

        for entry in &self.config.env {
            match entry.split_once('=') {
                Some((key, value)) if !key.is_empty() => {
                    cmd.env(key, value);
                }
                _ => warn!(entry = %entry, "skipping malformed env entry"),
            }
        }

        cmd
    }

    /// Advisory check of a single path. Denial and traversal are checked
    /// before the allow list; the first failure wins.
    pub fn validate_path(&self, path: &str) -> AccessResult<()> {
        if let Some(prefix) = self
            .config
            .denied_paths
            .iter()
            .find(|denied| path.starts_with(denied.as_str()))
        {
            return Err(AccessError::DeniedPath {
                path: path.to_string(),
                prefix: prefix.clone(),
            });
        }

        if path.contains("..") {
            return Err(AccessError::PathTraversal {
                path: path.to_string(),
            });
        }

        if !self.config.allowed_paths.is_empty()
            && !self
                .config
                .allowed_paths
                .iter()
                .any(|allowed| path.starts_with(allowed.as_str()))
        {
            return Err(AccessError::PathNotAllowed {
                path: path.to_string(),
            });
        }

        Ok(())
    }

    /// Advisory check of a network host. An empty allow list admits any host
    /// once network access is enabled.
    pub fn validate_host(&self, host: &str) -> AccessResult<()> {
        if !self.config.allow_network {
            return Err(AccessError::NetworkDisabled);
        }
        if self.config.allowed_hosts.is_empty() {
            return Ok(());
        }

        let allowed = self.config.allowed_hosts.iter().any(|entry| {
            host == entry
                || host
                    .strip_suffix(entry.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        });
        if allowed {
            Ok(())
        } else {
            Err(AccessError::HostNotAllowed {
                host: host.to_string(),
            })
        }
    }
}

fn finish(execution_id: Uuid, outcome: ExecutionOutcome, start: Instant) -> ExecutionResult {
    let result = ExecutionResult {
        execution_id,
        outcome,
        duration: start.elapsed(),
    };
    obs::emit_execution_finished(&result);
    result
}

/// Append everything readable from `pipe` to `buf`, chunk by chunk.
async fn drain<R>(pipe: Option<R>, buf: &mut Vec<u8>) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let Some(mut pipe) = pipe else {
        return Ok(());
    };
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        let n = pipe.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_config() -> SandboxConfig {
        SandboxConfig::default()
            .with_allowed_paths(["/"])
            .with_denied_paths(Vec::<String>::new())
            .with_work_dir(None)
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|a| (*a).to_string()).collect()
    }

    #[tokio::test]
    async fn test_execute_echo() {
        let runner = Runner::new(open_config());
        let result = runner.execute("echo", &args(&["hello"])).await;
        assert_eq!(
            result.outcome,
            ExecutionOutcome::Completed {
                exit_code: 0,
                stdout: "hello\n".into(),
                stderr: String::new(),
            }
        );
        assert!(result.violations().is_empty());
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_not_an_error() {
        let runner = Runner::new(open_config());
        let result = runner.execute("sh", &args(&["-c", "exit 3"])).await;
        assert!(matches!(
            result.outcome,
            ExecutionOutcome::Completed { exit_code: 3, .. }
        ));
        assert!(result.error().is_empty());
    }

    #[tokio::test]
    async fn test_missing_binary_is_execution_failure() {
        let runner = Runner::new(open_config());
        let result = runner.execute("definitely-not-a-real-binary-xyz", &[]).await;
        match &result.outcome {
            ExecutionOutcome::ExecutionFailure { error, .. } => assert!(!error.is_empty()),
            other => panic!("expected ExecutionFailure, got {:?}", other),
        }
        assert_eq!(result.exit_code(), -1);
        assert!(!result.killed());
    }

    #[tokio::test]
    async fn test_environment_is_exactly_the_configured_list() {
        let runner = Runner::new(open_config().with_env(["FOO=bar", "malformed"]));
        let result = runner.execute("env", &[]).await;
        assert_eq!(result.exit_code(), 0, "error: {}", result.error());
        assert_eq!(result.stdout(), "FOO=bar\n");
    }

    #[tokio::test]
    async fn test_work_dir_is_applied() {
        let dir = tempfile::tempdir().unwrap();
        let canonical = dir.path().canonicalize().unwrap();
        let runner = Runner::new(open_config().with_work_dir(Some(canonical.clone())));
        let result = runner.execute("pwd", &[]).await;
        assert_eq!(result.exit_code(), 0, "error: {}", result.error());
        assert_eq!(result.stdout().trim_end(), canonical.to_str().unwrap());
    }

    #[tokio::test]
    async fn test_execute_with_id_keeps_caller_id() {
        let runner = Runner::new(open_config());
        let id = Uuid::new_v4();
        let result = runner.execute_with_id(id, "true", &[]).await;
        assert_eq!(result.execution_id, id);
        assert!(result.succeeded());
    }

    #[tokio::test]
    async fn test_timeout_keeps_partial_output() {
        let runner = Runner::new(open_config().with_timeout(Duration::from_millis(500)));
        let result = runner
            .execute("sh", &args(&["-c", "echo partial; sleep 5"]))
            .await;
        assert!(result.killed());
        assert_eq!(result.stdout(), "partial\n");
        assert!(result.duration < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_violation_short_circuits_before_spawn() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("spawned");
        let runner = Runner::new(open_config());
        let script = format!("touch {} ..", marker.display());
        let result = runner.execute("sh", &args(&["-c", &script])).await;
        assert!(matches!(
            result.outcome,
            ExecutionOutcome::PolicyViolation { .. }
        ));
        assert!(!marker.exists());
    }

    #[test]
    fn test_validate_path_order() {
        let runner = Runner::new(SandboxConfig::default());
        assert!(matches!(
            runner.validate_path("/etc/passwd"),
            Err(AccessError::DeniedPath { .. })
        ));
        assert!(matches!(
            runner.validate_path("/tmp/sandbox/../etc"),
            Err(AccessError::PathTraversal { .. })
        ));
        assert!(runner.validate_path("/tmp/sandbox/file.txt").is_ok());
        assert!(matches!(
            runner.validate_path("/opt/data/file.txt"),
            Err(AccessError::PathNotAllowed { .. })
        ));
    }

    #[test]
    fn test_validate_path_without_allow_list() {
        let runner = Runner::new(SandboxConfig::default().with_allowed_paths(Vec::<String>::new()));
        assert!(runner.validate_path("/opt/data/file.txt").is_ok());
        assert!(runner.validate_path("/etc/hosts").is_err());
    }

    #[test]
    fn test_validate_path_error_messages() {
        let runner = Runner::new(SandboxConfig::default());
        assert_eq!(
            runner.validate_path("/etc/passwd").unwrap_err().to_string(),
            "path '/etc/passwd' is denied (matches /etc)"
        );
        assert_eq!(
            runner.validate_path("/opt/x").unwrap_err().to_string(),
            "path '/opt/x' not in allowed list"
        );
    }

    #[test]
    fn test_validate_host() {
        let runner = Runner::new(
            SandboxConfig::default()
                .with_network(true)
                .with_allowed_hosts(["api.openai.com", "anthropic.com"]),
        );
        assert!(runner.validate_host("api.openai.com").is_ok());
        assert!(runner.validate_host("api.anthropic.com").is_ok());
        assert!(runner.validate_host("evilanthropic.com").is_err());
        assert_eq!(
            runner.validate_host("evil.com"),
            Err(AccessError::HostNotAllowed {
                host: "evil.com".into()
            })
        );
    }

    #[test]
    fn test_validate_host_network_disabled_or_open() {
        let closed = Runner::new(SandboxConfig::default());
        assert_eq!(
            closed.validate_host("anything"),
            Err(AccessError::NetworkDisabled)
        );

        let open = Runner::new(SandboxConfig::default().with_network(true));
        assert!(open.validate_host("anything.example").is_ok());
    }
}
