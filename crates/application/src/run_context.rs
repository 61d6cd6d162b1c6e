use chrono::{DateTime, Utc};
use serde::Serialize;

use deskbot_domain::{BotOperation, MailboxRight, MembershipRole};

use crate::{EdgeOutcome, EdgeReport, FailureReason, ReconcileReport};

/// One bot invocation as requested by the helpdesk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotRequest {
    /// Ticket the run works on.
    pub ticket_id: u64,
    /// Operation to perform.
    pub operation: BotOperation,
    /// User the operation applies to.
    pub subject: String,
    /// Groups or mailboxes, as loose identifiers.
    pub targets: Vec<String>,
    /// Role used for group operations.
    pub role: MembershipRole,
    /// Right used for mailbox operations.
    pub mailbox_right: Option<MailboxRight>,
}

/// Overall result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every item succeeded or was skipped.
    Succeeded,
    /// Some items failed.
    PartiallyFailed,
    /// The run stopped before processing items, or every item failed.
    Failed,
}

/// Final, serializable record of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Ticket the run worked on.
    pub ticket_id: u64,
    /// Company resolved from the ticket.
    pub company: Option<String>,
    /// Transport name of the operation.
    pub operation: &'static str,
    /// Subject as requested.
    pub subject: String,
    /// Start of the run.
    pub started_at: DateTime<Utc>,
    /// End of the run.
    pub finished_at: DateTime<Utc>,
    /// Overall status.
    pub status: RunStatus,
    /// Per-item outcomes.
    pub items: ReconcileReport,
    /// Errors that stopped the run or could not be tied to an item.
    pub errors: Vec<String>,
}

/// State accumulated while one request is processed.
#[derive(Debug)]
pub struct RunContext {
    request: BotRequest,
    company: Option<String>,
    started_at: DateTime<Utc>,
    items: ReconcileReport,
    errors: Vec<String>,
}

impl RunContext {
    /// Starts a run for `request`.
    #[must_use]
    pub fn new(request: BotRequest) -> Self {
        Self {
            request,
            company: None,
            started_at: Utc::now(),
            items: ReconcileReport::default(),
            errors: Vec::new(),
        }
    }

    /// Returns the request being processed.
    #[must_use]
    pub fn request(&self) -> &BotRequest {
        &self.request
    }

    /// Returns the company once resolved.
    #[must_use]
    pub fn company(&self) -> Option<&str> {
        self.company.as_deref()
    }

    /// Records the company resolved from the ticket.
    pub fn set_company(&mut self, company: impl Into<String>) {
        self.company = Some(company.into());
    }

    /// Files one item outcome.
    pub fn record(&mut self, item: EdgeReport) {
        self.items.record(item);
    }

    /// Files a batch of item outcomes.
    pub fn merge(&mut self, items: ReconcileReport) {
        self.items.merge(items);
    }

    /// Records a target that could not be resolved to a single entity.
    pub fn record_unresolved(
        &mut self,
        identifier: &str,
        relation: &str,
        detail: impl Into<String>,
    ) {
        self.items.record(EdgeReport {
            target_id: identifier.to_owned(),
            target_name: identifier.to_owned(),
            relation: relation.to_owned(),
            outcome: EdgeOutcome::Failed(FailureReason::Unresolved(detail.into())),
        });
    }

    /// Records an error not tied to a single item.
    pub fn record_error(&mut self, error: impl ToString) {
        self.errors.push(error.to_string());
    }

    /// Closes the run and returns its report.
    #[must_use]
    pub fn finish(self) -> RunReport {
        let status = if !self.errors.is_empty() && self.items.total() == 0 {
            RunStatus::Failed
        } else if self.items.has_failures() || !self.errors.is_empty() {
            if self.items.failed.len() == self.items.total() {
                RunStatus::Failed
            } else {
                RunStatus::PartiallyFailed
            }
        } else {
            RunStatus::Succeeded
        };

        RunReport {
            ticket_id: self.request.ticket_id,
            company: self.company,
            operation: self.request.operation.as_str(),
            subject: self.request.subject,
            started_at: self.started_at,
            finished_at: Utc::now(),
            status,
            items: self.items,
            errors: self.errors,
        }
    }
}
