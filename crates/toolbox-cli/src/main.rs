//! Toolbox - run agent tool calls through the policy-driven sandbox.
//!
//! ```text
//! toolbox [--profiles <FILE>] [--tool <NAME>] [--format text|json] <COMMAND> [ARGS]...
//! ```
//!
//! The command's exit code becomes toolbox's own exit status. Audit events
//! are written as JSON lines to stderr unless `--audit-log` names a file.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{warn, Level};
use uuid::Uuid;

use toolbox_core::{
    AuditLogger, AuditSink, ExecutionResult, JsonlAuditSink, ProfileSet, Resolution, Runner,
};

#[derive(Parser)]
#[command(name = "toolbox")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run agent tool commands inside a policy-driven sandbox", long_about = None)]
struct Cli {
    /// Path to sandbox profiles JSON
    #[arg(long, env = "TOOLBOX_PROFILES")]
    profiles: Option<PathBuf>,

    /// Tool name used for profile matching (defaults to the command)
    #[arg(long)]
    tool: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Append audit events to this file instead of stderr
    #[arg(long)]
    audit_log: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    log_json: bool,

    /// Command to run, followed by its arguments
    #[arg(
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true,
        value_name = "COMMAND"
    )]
    command: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    toolbox_core::init_tracing(cli.log_json, level);

    let exit_code = cmd_run(&cli).await?;
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}

/// Resolve the profile, execute, audit, and print. Returns the exit code to
/// propagate.
async fn cmd_run(cli: &Cli) -> Result<i32> {
    let (command, args) = cli
        .command
        .split_first()
        .context("no command given")?;
    let command = command.as_str();
    let tool_name = cli.tool.as_deref().unwrap_or(command);

    let resolution = match &cli.profiles {
        Some(path) => ProfileSet::load(path)
            .context("Error loading profiles")?
            .resolve(tool_name),
        None => Resolution::fallback(),
    };

    let auditor = AuditLogger::new(open_audit_sink(cli.audit_log.as_deref())?);
    let execution_id = Uuid::new_v4();
    if let Err(e) = auditor.log_start(execution_id, tool_name, command, &resolution.profile_name) {
        warn!(error = %e, "failed to record execution start");
    }

    let runner = Runner::new(resolution.config);
    let result = runner.execute_with_id(execution_id, command, args).await;

    if let Err(e) = auditor.log_result(tool_name, command, &resolution.profile_name, &result) {
        warn!(error = %e, "failed to record execution result");
    }

    match cli.format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Text => print_text(&result)?,
    }

    Ok(result.exit_code())
}

fn open_audit_sink(path: Option<&Path>) -> Result<Arc<dyn AuditSink>> {
    match path {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open audit log {}", path.display()))?;
            Ok(Arc::new(JsonlAuditSink::new(file)))
        }
        None => Ok(Arc::new(JsonlAuditSink::new(std::io::stderr()))),
    }
}

fn print_json(result: &ExecutionResult) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer(&mut stdout, result).context("Failed to encode result")?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}

fn print_text(result: &ExecutionResult) -> Result<()> {
    let error = result.error();
    if !error.is_empty() {
        eprintln!("Error: {error}");
    }
    if !result.violations().is_empty() {
        eprintln!("Policy violations:");
        for violation in result.violations() {
            eprintln!("  - {violation}");
        }
    }
    if !result.stderr().is_empty() {
        eprint!("{}", result.stderr());
    }

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(result.stdout().as_bytes())?;
    stdout.flush()?;
    Ok(())
}
