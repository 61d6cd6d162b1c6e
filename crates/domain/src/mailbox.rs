use std::str::FromStr;

use deskbot_core::AppError;
use serde::{Deserialize, Serialize};

/// Delegated right a principal can hold on a mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MailboxRight {
    /// Open and read the mailbox.
    FullAccess,
    /// Send mail as the mailbox owner.
    SendAs,
    /// Send mail on behalf of the mailbox owner.
    SendOnBehalfOf,
}

impl MailboxRight {
    /// Returns a stable transport value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FullAccess => "full_access",
            Self::SendAs => "send_as",
            Self::SendOnBehalfOf => "send_on_behalf_of",
        }
    }

    /// Returns every supported right.
    #[must_use]
    pub fn all() -> &'static [Self] {
        &[Self::FullAccess, Self::SendAs, Self::SendOnBehalfOf]
    }
}

impl FromStr for MailboxRight {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized: String = value
            .chars()
            .filter(|character| character.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "fullaccess" | "readandmanage" => Ok(Self::FullAccess),
            "sendas" => Ok(Self::SendAs),
            "sendonbehalf" | "sendonbehalfof" => Ok(Self::SendOnBehalfOf),
            _ => Err(AppError::Validation(format!(
                "unknown mailbox right '{value}'"
            ))),
        }
    }
}

/// A principal's right on a mailbox.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MailboxPermissionEdge {
    /// Principal (UPN or SMTP address) holding the right.
    pub subject_principal: String,
    /// Mailbox identity (UPN, SMTP address or alias).
    pub mailbox_identity: String,
    /// Right held.
    pub right: MailboxRight,
}

impl MailboxPermissionEdge {
    /// Returns whether two edges denote the same right, ignoring identity case.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        self.right == other.right
            && self
                .subject_principal
                .eq_ignore_ascii_case(other.subject_principal.as_str())
            && self
                .mailbox_identity
                .eq_ignore_ascii_case(other.mailbox_identity.as_str())
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::{MailboxPermissionEdge, MailboxRight};

    #[test]
    fn parses_exchange_spellings() {
        assert_eq!(
            MailboxRight::from_str("Send-As").unwrap_or(MailboxRight::FullAccess),
            MailboxRight::SendAs
        );
        assert_eq!(
            MailboxRight::from_str("SendOnBehalf").unwrap_or(MailboxRight::FullAccess),
            MailboxRight::SendOnBehalfOf
        );
        assert!(MailboxRight::from_str("owner").is_err());
    }

    #[test]
    fn edges_compare_case_insensitively() {
        let left = MailboxPermissionEdge {
            subject_principal: "Alice@Contoso.com".to_owned(),
            mailbox_identity: "shared@contoso.com".to_owned(),
            right: MailboxRight::FullAccess,
        };
        let right = MailboxPermissionEdge {
            subject_principal: "alice@contoso.com".to_owned(),
            mailbox_identity: "Shared@Contoso.com".to_owned(),
            right: MailboxRight::FullAccess,
        };
        assert!(left.same_as(&right));
    }
}
