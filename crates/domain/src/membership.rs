use std::collections::HashSet;
use std::str::FromStr;

use deskbot_core::AppError;
use serde::{Deserialize, Serialize};

use crate::{DirectoryEntity, EntityId};

/// Relationship a subject holds on a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipRole {
    /// Regular member.
    Member,
    /// Group owner.
    Owner,
}

impl MembershipRole {
    /// Returns a stable transport value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::Owner => "owner",
        }
    }

    /// Returns every role.
    #[must_use]
    pub fn all() -> &'static [Self] {
        &[Self::Member, Self::Owner]
    }
}

impl FromStr for MembershipRole {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "member" | "members" => Ok(Self::Member),
            "owner" | "owners" => Ok(Self::Owner),
            _ => Err(AppError::Validation(format!(
                "unknown membership role '{value}'"
            ))),
        }
    }
}

/// A subject's relationship to a target group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MembershipEdge {
    /// User holding the relationship.
    pub subject_id: EntityId,
    /// Group the relationship points at.
    pub target_id: EntityId,
    /// Relationship role.
    pub role: MembershipRole,
}

/// A membership edge together with the fetched target group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMembership {
    /// Target group as fetched from the directory.
    pub group: DirectoryEntity,
    /// Relationship role.
    pub role: MembershipRole,
}

impl GroupMembership {
    /// Builds the edge this membership represents for `subject_id`.
    #[must_use]
    pub fn edge_for(&self, subject_id: &EntityId) -> MembershipEdge {
        MembershipEdge {
            subject_id: subject_id.clone(),
            target_id: self.group.id.clone(),
            role: self.role,
        }
    }

    /// Returns the `(target, role)` identity used for set comparisons.
    #[must_use]
    pub fn key(&self) -> (EntityId, MembershipRole) {
        (self.group.id.clone(), self.role)
    }
}

/// Drops repeated `(target, role)` pairs, keeping first occurrences in order.
#[must_use]
pub fn dedupe_memberships(memberships: Vec<GroupMembership>) -> Vec<GroupMembership> {
    let mut seen = HashSet::new();
    memberships
        .into_iter()
        .filter(|membership| seen.insert(membership.key()))
        .collect()
}
