//! Directory entities and the rules used to classify groups.

use std::fmt::{Display, Formatter};

use deskbot_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Group type marker for rule-based membership.
pub const DYNAMIC_MEMBERSHIP_GROUP_TYPE: &str = "DynamicMembership";

/// Group type marker for Microsoft 365 groups.
pub const UNIFIED_GROUP_TYPE: &str = "Unified";

/// Opaque identifier assigned by the remote directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(NonEmptyString);

impl EntityId {
    /// Wraps a directory-assigned identifier.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        NonEmptyString::new(value).map(Self).map_err(|_| {
            AppError::Validation("directory entity id must not be empty".to_owned())
        })
    }

    /// Returns the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns whether `value` has the canonical object id shape (a GUID).
    #[must_use]
    pub fn looks_canonical(value: &str) -> bool {
        Uuid::parse_str(value.trim()).is_ok()
    }
}

impl Display for EntityId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Concrete kind of a directory entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A user account.
    User,
    /// Security group without mail.
    SecurityGroup,
    /// Microsoft 365 group.
    UnifiedGroup,
    /// Group whose membership is computed by a rule engine.
    DynamicGroup,
    /// Mail-enabled group that is not a Microsoft 365 group.
    MailEnabledGroup,
}

impl EntityKind {
    /// Derives a group kind from directory group flags.
    ///
    /// Dynamic membership wins over every other flag, then unified, then mail.
    #[must_use]
    pub fn from_group_flags<S: AsRef<str>>(group_types: &[S], mail_enabled: bool) -> Self {
        let has_type = |expected: &str| {
            group_types
                .iter()
                .any(|group_type| group_type.as_ref().eq_ignore_ascii_case(expected))
        };

        if has_type(DYNAMIC_MEMBERSHIP_GROUP_TYPE) {
            Self::DynamicGroup
        } else if has_type(UNIFIED_GROUP_TYPE) {
            Self::UnifiedGroup
        } else if mail_enabled {
            Self::MailEnabledGroup
        } else {
            Self::SecurityGroup
        }
    }

    /// Returns the category used for lookups.
    #[must_use]
    pub fn category(self) -> EntityCategory {
        match self {
            Self::User => EntityCategory::User,
            Self::SecurityGroup
            | Self::UnifiedGroup
            | Self::DynamicGroup
            | Self::MailEnabledGroup => EntityCategory::Group,
        }
    }

    /// Returns a stable label for reports.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::SecurityGroup => "security_group",
            Self::UnifiedGroup => "unified_group",
            Self::DynamicGroup => "dynamic_group",
            Self::MailEnabledGroup => "mail_enabled_group",
        }
    }
}

/// Entity families the resolver can search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityCategory {
    /// User accounts.
    User,
    /// Groups of every kind.
    Group,
}

impl EntityCategory {
    /// Fields searched when the identifier is not a canonical id.
    #[must_use]
    pub fn candidate_fields(self) -> &'static [SearchField] {
        match self {
            Self::User => &[
                SearchField::DisplayName,
                SearchField::PrincipalName,
                SearchField::Mail,
            ],
            Self::Group => &[SearchField::DisplayName, SearchField::Mail],
        }
    }

    /// Returns a stable label for messages.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Group => "group",
        }
    }
}

/// Searchable directory attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchField {
    /// Display name.
    DisplayName,
    /// Sign-in name.
    PrincipalName,
    /// Primary SMTP address.
    Mail,
}

/// A user or group as returned by the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntity {
    /// Directory-assigned identifier.
    pub id: EntityId,
    /// Display name.
    pub display_name: String,
    /// Sign-in name for users, mail nickname or name for groups.
    pub principal_name: String,
    /// Primary SMTP address, when mail-enabled.
    pub mail: Option<String>,
    /// Entity kind.
    pub kind: EntityKind,
    /// Whether the entity is mastered on-premises.
    pub on_prem_synced: bool,
}

impl DirectoryEntity {
    /// Returns the mutability bucket for this entity when used as an edge target.
    #[must_use]
    pub fn group_class(&self) -> GroupClass {
        GroupClass::of(self.kind)
    }

    /// Returns whether `identifier` matches this entity on any candidate field.
    #[must_use]
    pub fn matches_field(&self, field: SearchField, identifier: &str) -> bool {
        let needle = identifier.trim().to_lowercase();
        let value = match field {
            SearchField::DisplayName => Some(self.display_name.as_str()),
            SearchField::PrincipalName => Some(self.principal_name.as_str()),
            SearchField::Mail => self.mail.as_deref(),
        };

        value.is_some_and(|value| value.to_lowercase().starts_with(needle.as_str()))
    }
}

/// Mutability bucket assigned to a group when it is fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupClass {
    /// Rule-based membership. Never mutated.
    Dynamic,
    /// Distribution-style group. Not mutable through the membership API.
    MailEnabledDistribution,
    /// Security, unified and every other group.
    Mutable,
}

impl GroupClass {
    /// Buckets an entity kind.
    #[must_use]
    pub fn of(kind: EntityKind) -> Self {
        match kind {
            EntityKind::DynamicGroup => Self::Dynamic,
            EntityKind::MailEnabledGroup => Self::MailEnabledDistribution,
            EntityKind::User | EntityKind::SecurityGroup | EntityKind::UnifiedGroup => {
                Self::Mutable
            }
        }
    }

    /// Returns whether membership edges on this group may be changed.
    #[must_use]
    pub fn is_mutable(self) -> bool {
        self == Self::Mutable
    }
}

#[cfg(test)]
mod tests {
    use super::{EntityId, EntityKind, GroupClass};

    #[test]
    fn dynamic_flag_wins_over_unified() {
        let kind = EntityKind::from_group_flags(&["Unified", "DynamicMembership"], true);
        assert_eq!(kind, EntityKind::DynamicGroup);
        assert_eq!(GroupClass::of(kind), GroupClass::Dynamic);
    }

    #[test]
    fn mail_enabled_non_unified_is_distribution() {
        let kind = EntityKind::from_group_flags::<&str>(&[], true);
        assert_eq!(GroupClass::of(kind), GroupClass::MailEnabledDistribution);
    }

    #[test]
    fn unified_and_security_groups_are_mutable() {
        let unified = EntityKind::from_group_flags(&["Unified"], true);
        let security = EntityKind::from_group_flags::<&str>(&[], false);
        assert!(GroupClass::of(unified).is_mutable());
        assert!(GroupClass::of(security).is_mutable());
    }

    #[test]
    fn canonical_ids_are_guids() {
        assert!(EntityId::looks_canonical("0b2e5c2e-7f0a-4c1b-9e52-3b1f9d0c6a11"));
        assert!(!EntityId::looks_canonical("alice@contoso.com"));
    }

    #[test]
    fn entity_ids_are_trimmed_and_never_blank() {
        let id = EntityId::new(" 0b2e5c2e-7f0a-4c1b-9e52-3b1f9d0c6a11\n");
        assert_eq!(
            id.map(|id| id.to_string()).unwrap_or_default(),
            "0b2e5c2e-7f0a-4c1b-9e52-3b1f9d0c6a11"
        );
        assert!(EntityId::new("  ").is_err());
    }
}
