use async_trait::async_trait;

use deskbot_core::AppResult;
use deskbot_domain::{
    DirectoryEntity, EntityCategory, EntityId, GroupMembership, MembershipEdge, SearchField,
};

/// Search over candidate fields, combined with logical OR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectorySearch {
    /// Prefix or exact value to match.
    pub term: String,
    /// Fields the term is matched against.
    pub fields: Vec<SearchField>,
}

/// Remote directory holding users, groups and their memberships.
///
/// Mutations report state conflicts through error categories:
/// `Conflict` when an added edge already exists, `NotFound` when a removed
/// edge or its target is absent, and `Forbidden` when the directory denied
/// the change.
#[async_trait]
pub trait DirectoryGateway: Send + Sync {
    /// Fetches one entity by its directory id.
    async fn get_entity(
        &self,
        category: EntityCategory,
        id: &EntityId,
    ) -> AppResult<Option<DirectoryEntity>>;

    /// Returns every entity of `category` matching `search`.
    async fn search_entities(
        &self,
        category: EntityCategory,
        search: &DirectorySearch,
    ) -> AppResult<Vec<DirectoryEntity>>;

    /// Returns the groups a subject is a member or owner of.
    async fn list_memberships(&self, subject_id: &EntityId) -> AppResult<Vec<GroupMembership>>;

    /// Creates a membership edge.
    async fn add_membership(&self, edge: &MembershipEdge) -> AppResult<()>;

    /// Deletes a membership edge.
    async fn remove_membership(&self, edge: &MembershipEdge) -> AppResult<()>;
}
