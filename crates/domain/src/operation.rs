use std::str::FromStr;

use deskbot_core::AppError;
use serde::{Deserialize, Serialize};

/// Operations a bot run can perform for a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BotOperation {
    /// Adds the subject to the target groups.
    AddToGroups,
    /// Removes the subject from the target groups.
    RemoveFromGroups,
    /// Makes the subject's memberships equal the target groups.
    ReconcileGroups,
    /// Removes the subject from every mutable group it belongs to or owns.
    RemoveFromAllGroups,
    /// Grants the subject a right on the target mailboxes.
    GrantMailboxPermissions,
    /// Revokes the subject's right on the target mailboxes.
    RevokeMailboxPermissions,
    /// Revokes every mailbox right the subject holds.
    RevokeAllMailboxPermissions,
}

impl BotOperation {
    /// Returns a stable transport value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AddToGroups => "groups.add",
            Self::RemoveFromGroups => "groups.remove",
            Self::ReconcileGroups => "groups.reconcile",
            Self::RemoveFromAllGroups => "groups.remove_all",
            Self::GrantMailboxPermissions => "mailbox_permissions.grant",
            Self::RevokeMailboxPermissions => "mailbox_permissions.revoke",
            Self::RevokeAllMailboxPermissions => "mailbox_permissions.revoke_all",
        }
    }

    /// Returns every operation.
    #[must_use]
    pub fn all() -> &'static [Self] {
        &[
            Self::AddToGroups,
            Self::RemoveFromGroups,
            Self::ReconcileGroups,
            Self::RemoveFromAllGroups,
            Self::GrantMailboxPermissions,
            Self::RevokeMailboxPermissions,
            Self::RevokeAllMailboxPermissions,
        ]
    }

    /// Returns whether the operation works on mailboxes rather than groups.
    #[must_use]
    pub fn targets_mailboxes(&self) -> bool {
        matches!(
            self,
            Self::GrantMailboxPermissions
                | Self::RevokeMailboxPermissions
                | Self::RevokeAllMailboxPermissions
        )
    }

    /// Returns whether the operation needs an explicit target list.
    #[must_use]
    pub fn requires_targets(&self) -> bool {
        !matches!(
            self,
            Self::RemoveFromAllGroups | Self::RevokeAllMailboxPermissions
        )
    }

    /// Parses either a transport value or a ticket form label.
    pub fn from_transport(value: &str) -> Result<Self, AppError> {
        Self::from_str(value)
    }
}

const TICKET_FORM_LABELS: &[(&str, BotOperation)] = &[
    ("add user to aad groups", BotOperation::AddToGroups),
    ("add user to groups", BotOperation::AddToGroups),
    ("remove user from aad groups", BotOperation::RemoveFromGroups),
    ("remove user from groups", BotOperation::RemoveFromGroups),
    ("sync user aad groups", BotOperation::ReconcileGroups),
    ("remove user from all groups", BotOperation::RemoveFromAllGroups),
    ("remove user from all aad groups", BotOperation::RemoveFromAllGroups),
    ("add mailbox permissions", BotOperation::GrantMailboxPermissions),
    ("grant mailbox access", BotOperation::GrantMailboxPermissions),
    ("remove mailbox permissions", BotOperation::RevokeMailboxPermissions),
    ("remove mailbox access", BotOperation::RevokeMailboxPermissions),
    ("remove all mailbox permissions", BotOperation::RevokeAllMailboxPermissions),
];

impl FromStr for BotOperation {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if let Some(operation) = Self::all()
            .iter()
            .find(|operation| operation.as_str() == trimmed)
        {
            return Ok(*operation);
        }

        let label = trimmed
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();

        TICKET_FORM_LABELS
            .iter()
            .find(|(known, _)| *known == label)
            .map(|(_, operation)| *operation)
            .ok_or_else(|| AppError::Validation(format!("unknown bot operation '{value}'")))
    }
}
