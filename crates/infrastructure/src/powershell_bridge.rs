//! Remote shell bridge running scripts through a local PowerShell process.

use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;
use tracing::{debug, warn};

use deskbot_application::{ShellBridge, ShellOutcome, ShellScript};
use deskbot_core::redaction::MASK;
use deskbot_core::{AppError, AppResult, mask_secrets};

/// Stderr lines matching these patterns do not fail a command.
pub const DEFAULT_WARNING_PATTERNS: &[&str] = &[r"^\s*WARNING:", r"^\s*VERBOSE:"];

/// Interpreter arguments placed before the script text.
pub const POWERSHELL_ARGS: &[&str] = &["-NoLogo", "-NoProfile", "-NonInteractive", "-Command"];

static CREDENTIAL_FRAGMENTS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"(?i)(-AccessToken\s+)('[^']*'|"[^"]*"|\S+)"#,
        r"(?i)(Bearer\s+)([A-Za-z0-9\-_~+/.=]+)",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// Masks registered secrets and credential-looking fragments.
#[must_use]
pub fn redact(text: &str, sensitive: &[String]) -> String {
    let mut masked = mask_secrets(text, sensitive);
    for pattern in CREDENTIAL_FRAGMENTS.iter() {
        masked = pattern
            .replace_all(masked.as_str(), format!("${{1}}{MASK}").as_str())
            .into_owned();
    }

    masked
}

/// Process settings for the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellConfig {
    /// Interpreter executable.
    pub program: String,
    /// Arguments placed before the script text.
    pub args: Vec<String>,
    /// Regexes for non-fatal stderr lines.
    pub warning_patterns: Vec<String>,
    /// Timeout applied when the caller passes none.
    pub default_timeout: Option<Duration>,
}

impl ShellConfig {
    /// PowerShell settings for `program`.
    #[must_use]
    pub fn powershell(program: impl Into<String>, default_timeout: Option<Duration>) -> Self {
        Self {
            program: program.into(),
            args: POWERSHELL_ARGS.iter().map(|arg| (*arg).to_owned()).collect(),
            warning_patterns: DEFAULT_WARNING_PATTERNS
                .iter()
                .map(|pattern| (*pattern).to_owned())
                .collect(),
            default_timeout,
        }
    }
}

/// [`ShellBridge`] backed by a child process per command.
#[derive(Debug, Clone)]
pub struct PowerShellBridge {
    program: String,
    args: Vec<String>,
    warning_patterns: Vec<Regex>,
    default_timeout: Option<Duration>,
}

impl PowerShellBridge {
    /// Creates a bridge, compiling the warning patterns.
    pub fn new(config: ShellConfig) -> AppResult<Self> {
        let warning_patterns = config
            .warning_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|error| {
                    AppError::Validation(format!("invalid warning pattern '{pattern}': {error}"))
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok(Self {
            program: config.program,
            args: config.args,
            warning_patterns,
            default_timeout: config.default_timeout,
        })
    }

    fn is_warning(&self, line: &str) -> bool {
        self.warning_patterns
            .iter()
            .any(|pattern| pattern.is_match(line))
    }

    fn has_fatal_stderr(&self, stderr: &str) -> bool {
        stderr
            .lines()
            .filter(|line| !line.trim().is_empty())
            .any(|line| !self.is_warning(line))
    }
}

#[async_trait]
impl ShellBridge for PowerShellBridge {
    async fn run_command(&self, script: &ShellScript, timeout: Option<Duration>) -> ShellOutcome {
        let sensitive = script.sensitive();
        debug!(
            program = %self.program,
            script = %redact(script.text(), sensitive),
            "running shell command"
        );

        let mut command = Command::new(&self.program);
        command.kill_on_drop(true);
        command.args(&self.args);
        command.arg(script.text());
        command.stdin(Stdio::null());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());

        let child = match command.spawn() {
            Ok(child) => child,
            Err(error) => {
                warn!(program = %self.program, error = %error, "failed to start shell");
                return ShellOutcome::failure(format!(
                    "failed to start '{}': {error}",
                    self.program
                ));
            }
        };

        let output = match timeout.or(self.default_timeout) {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(output) => output,
                Err(_) => {
                    warn!(
                        timeout_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                        "shell command timed out"
                    );
                    return ShellOutcome {
                        timed_out: true,
                        ..ShellOutcome::failure(format!(
                            "shell command timed out after {}ms and was terminated",
                            limit.as_millis()
                        ))
                    };
                }
            },
            None => child.wait_with_output().await,
        };

        let output = match output {
            Ok(output) => output,
            Err(error) => {
                return ShellOutcome::failure(format!("shell process failed: {error}"));
            }
        };

        let stdout = redact(String::from_utf8_lossy(&output.stdout).as_ref(), sensitive);
        let stderr = redact(String::from_utf8_lossy(&output.stderr).as_ref(), sensitive);
        let success = output.status.success() && !self.has_fatal_stderr(stderr.as_str());

        if !success {
            warn!(
                exit_code = ?output.status.code(),
                stderr = %stderr.trim(),
                "shell command failed"
            );
        }

        ShellOutcome {
            success,
            exit_code: output.status.code(),
            stdout,
            stderr,
            timed_out: false,
        }
    }
}

#[cfg(all(test, unix))]
mod tests;
