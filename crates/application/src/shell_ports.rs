use std::time::Duration;

use async_trait::async_trait;

use deskbot_core::mask_secrets;

/// Script sent to the remote shell, with the values that must never be logged.
#[derive(Clone, PartialEq, Eq)]
pub struct ShellScript {
    text: String,
    sensitive: Vec<String>,
}

impl ShellScript {
    /// Creates a script with no registered sensitive values.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sensitive: Vec::new(),
        }
    }

    /// Registers a value masked in every rendering of this script.
    #[must_use]
    pub fn with_sensitive(mut self, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.trim().is_empty() {
            self.sensitive.push(value);
        }
        self
    }

    /// Returns the script text to execute.
    #[must_use]
    pub fn text(&self) -> &str {
        self.text.as_str()
    }

    /// Returns the registered sensitive values.
    #[must_use]
    pub fn sensitive(&self) -> &[String] {
        self.sensitive.as_slice()
    }

    /// Returns the script with registered values masked.
    #[must_use]
    pub fn masked(&self) -> String {
        mask_secrets(self.text.as_str(), self.sensitive.as_slice())
    }
}

impl std::fmt::Debug for ShellScript {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ShellScript")
            .field("text", &self.masked())
            .finish()
    }
}

/// Result of one shell invocation. Output is already masked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellOutcome {
    /// Exit code 0 and no fatal stderr line.
    pub success: bool,
    /// Process exit code, absent when killed or never started.
    pub exit_code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error, or a diagnostic when the process did not run.
    pub stderr: String,
    /// Whether the invocation hit its timeout.
    pub timed_out: bool,
}

impl ShellOutcome {
    /// Builds a failed outcome for a process that could not be run to completion.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            stderr: message.into(),
            ..Self::default()
        }
    }

    /// Parses the status lines printed on standard output.
    #[must_use]
    pub fn lines(&self) -> Vec<ShellLine> {
        self.stdout
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(ShellLine::parse)
            .collect()
    }

    /// Returns stderr, or stdout when stderr is empty.
    #[must_use]
    pub fn diagnostic(&self) -> &str {
        if self.stderr.trim().is_empty() {
            self.stdout.trim()
        } else {
            self.stderr.trim()
        }
    }
}

/// One line of the `status : detail` mini-protocol scripts print.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellLine {
    /// `success : ...`
    Success(String),
    /// `failed : ...`
    Failed(String),
    /// `skipped : ...`
    Skipped(String),
    /// Any other output.
    Other(String),
}

impl ShellLine {
    /// Parses one output line. The status keyword is case-insensitive.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        let Some((status, detail)) = trimmed.split_once(':') else {
            return Self::Other(trimmed.to_owned());
        };
        let detail = detail.trim().to_owned();

        match status.trim().to_ascii_lowercase().as_str() {
            "success" => Self::Success(detail),
            "failed" => Self::Failed(detail),
            "skipped" => Self::Skipped(detail),
            _ => Self::Other(trimmed.to_owned()),
        }
    }
}

/// Opaque synchronous channel to a remote management shell.
#[async_trait]
pub trait ShellBridge: Send + Sync {
    /// Runs `script`, killing it after `timeout` when one is given.
    ///
    /// Never fails: spawn errors and timeouts are reported through the outcome.
    async fn run_command(&self, script: &ShellScript, timeout: Option<Duration>) -> ShellOutcome;
}
