use serde::Serialize;

/// Why an edge was left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The edge already exists.
    AlreadyPresent,
    /// The edge is already gone.
    AlreadyAbsent,
    /// The group's membership is computed by a rule.
    DynamicMembership,
    /// The group is a mail-enabled distribution group.
    MailEnabledDistribution,
}

impl SkipReason {
    /// Returns a stable label for reports.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AlreadyPresent => "already_present",
            Self::AlreadyAbsent => "already_absent",
            Self::DynamicMembership => "dynamic",
            Self::MailEnabledDistribution => "mail_enabled",
        }
    }

    /// Returns a human-readable explanation for ticket notes.
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            Self::AlreadyPresent => "already present",
            Self::AlreadyAbsent => "already absent",
            Self::DynamicMembership => "dynamic group: cannot remove manually",
            Self::MailEnabledDistribution => {
                "mail-enabled distribution group: manage it from Exchange"
            }
        }
    }
}

/// Why a mutation on an edge failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    /// The remote system denied the change.
    PermissionDenied(String),
    /// The target could not be resolved to a single entity.
    Unresolved(String),
    /// Any other error.
    Unexpected(String),
}

impl FailureReason {
    /// Returns the diagnostic detail.
    #[must_use]
    pub fn detail(&self) -> &str {
        match self {
            Self::PermissionDenied(detail)
            | Self::Unresolved(detail)
            | Self::Unexpected(detail) => detail.as_str(),
        }
    }
}

/// Result of processing one edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum EdgeOutcome {
    /// The edge was created.
    Added,
    /// The edge was deleted.
    Removed,
    /// The edge was left untouched.
    Skipped(SkipReason),
    /// The mutation failed.
    Failed(FailureReason),
}

/// Per-item line of a reconciliation report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EdgeReport {
    /// Target id (group id or mailbox identity).
    pub target_id: String,
    /// Target display name.
    pub target_name: String,
    /// Role or right the edge carries.
    pub relation: String,
    /// What happened.
    pub outcome: EdgeOutcome,
}

/// Per-item breakdown of a batch of edge operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Edges created.
    pub added: Vec<EdgeReport>,
    /// Edges deleted.
    pub removed: Vec<EdgeReport>,
    /// Edges left untouched.
    pub skipped: Vec<EdgeReport>,
    /// Edges whose mutation failed.
    pub failed: Vec<EdgeReport>,
}

impl ReconcileReport {
    /// Files one item into the bucket matching its outcome.
    pub fn record(&mut self, report: EdgeReport) {
        match report.outcome {
            EdgeOutcome::Added => self.added.push(report),
            EdgeOutcome::Removed => self.removed.push(report),
            EdgeOutcome::Skipped(_) => self.skipped.push(report),
            EdgeOutcome::Failed(_) => self.failed.push(report),
        }
    }

    /// Moves every item of `other` into this report.
    pub fn merge(&mut self, other: Self) {
        self.added.extend(other.added);
        self.removed.extend(other.removed);
        self.skipped.extend(other.skipped);
        self.failed.extend(other.failed);
    }

    /// Returns the number of items processed.
    #[must_use]
    pub fn total(&self) -> usize {
        self.added.len() + self.removed.len() + self.skipped.len() + self.failed.len()
    }

    /// Returns whether any item failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}
