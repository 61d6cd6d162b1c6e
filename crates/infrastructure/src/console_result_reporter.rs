//! Result reporter that logs a summary and prints the report as JSON on stdout.

use async_trait::async_trait;
use tracing::{info, warn};

use deskbot_application::{ResultReporter, RunReport, RunStatus};
use deskbot_core::{AppError, AppResult};

/// Reporter for runs started from a terminal or a scheduler capturing stdout.
#[derive(Clone, Default)]
pub struct ConsoleResultReporter {
    pretty: bool,
}

impl ConsoleResultReporter {
    /// Creates a reporter printing compact JSON.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Prints indented JSON instead.
    #[must_use]
    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }

    /// Serializes `report` the way it is printed.
    pub fn render(&self, report: &RunReport) -> AppResult<String> {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(report)
        } else {
            serde_json::to_string(report)
        };

        rendered
            .map_err(|error| AppError::Internal(format!("failed to serialize run report: {error}")))
    }
}

#[async_trait]
impl ResultReporter for ConsoleResultReporter {
    async fn report(&self, report: &RunReport) -> AppResult<()> {
        let summary = format!(
            "added={} removed={} skipped={} failed={}",
            report.items.added.len(),
            report.items.removed.len(),
            report.items.skipped.len(),
            report.items.failed.len()
        );

        match report.status {
            RunStatus::Succeeded => info!(
                ticket_id = report.ticket_id,
                operation = report.operation,
                summary = %summary,
                "run succeeded"
            ),
            RunStatus::PartiallyFailed | RunStatus::Failed => warn!(
                ticket_id = report.ticket_id,
                operation = report.operation,
                status = ?report.status,
                summary = %summary,
                errors = report.errors.len(),
                "run finished with failures"
            ),
        }

        println!("{}", self.render(report)?);
        Ok(())
    }
}
