use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::Mutex;

use deskbot_core::{AppError, AppResult};
use deskbot_domain::{
    DirectoryEntity, EntityCategory, EntityId, EntityKind, GroupMembership, MembershipEdge,
    MembershipRole,
};

use crate::{DirectoryGateway, DirectorySearch};

pub(crate) fn entity_id(value: &str) -> EntityId {
    EntityId::new(value).unwrap_or_else(|_| unreachable!())
}

pub(crate) fn user(id: &str, display_name: &str, principal_name: &str) -> DirectoryEntity {
    DirectoryEntity {
        id: entity_id(id),
        display_name: display_name.to_owned(),
        principal_name: principal_name.to_owned(),
        mail: Some(principal_name.to_owned()),
        kind: EntityKind::User,
        on_prem_synced: false,
    }
}

pub(crate) fn group(id: &str, display_name: &str, kind: EntityKind) -> DirectoryEntity {
    DirectoryEntity {
        id: entity_id(id),
        display_name: display_name.to_owned(),
        principal_name: display_name.to_lowercase().replace(' ', "-"),
        mail: None,
        kind,
        on_prem_synced: false,
    }
}

pub(crate) fn edge(subject: &str, target: &str, role: MembershipRole) -> MembershipEdge {
    MembershipEdge {
        subject_id: entity_id(subject),
        target_id: entity_id(target),
        role,
    }
}

/// In-memory directory recording every mutation attempt.
#[derive(Default)]
pub(crate) struct FakeDirectory {
    pub entities: Vec<DirectoryEntity>,
    pub edges: Mutex<Vec<MembershipEdge>>,
    pub denied_targets: HashSet<String>,
    pub failing_targets: HashSet<String>,
    pub mutations: Mutex<Vec<(&'static str, MembershipEdge)>>,
    pub searches: Mutex<Vec<DirectorySearch>>,
}

impl FakeDirectory {
    pub fn with_entities(entities: Vec<DirectoryEntity>) -> Self {
        Self {
            entities,
            ..Self::default()
        }
    }

    fn find(&self, id: &EntityId) -> Option<&DirectoryEntity> {
        self.entities.iter().find(|entity| &entity.id == id)
    }

    fn check_target(&self, edge: &MembershipEdge) -> AppResult<()> {
        if self.denied_targets.contains(edge.target_id.as_str()) {
            return Err(AppError::Forbidden(
                "Authorization_RequestDenied: Insufficient privileges".to_owned(),
            ));
        }
        if self.failing_targets.contains(edge.target_id.as_str()) {
            return Err(AppError::Transport("connection reset".to_owned()));
        }

        Ok(())
    }
}

#[async_trait]
impl DirectoryGateway for FakeDirectory {
    async fn get_entity(
        &self,
        category: EntityCategory,
        id: &EntityId,
    ) -> AppResult<Option<DirectoryEntity>> {
        Ok(self
            .find(id)
            .filter(|entity| entity.kind.category() == category)
            .cloned())
    }

    async fn search_entities(
        &self,
        category: EntityCategory,
        search: &DirectorySearch,
    ) -> AppResult<Vec<DirectoryEntity>> {
        self.searches.lock().await.push(search.clone());
        Ok(self
            .entities
            .iter()
            .filter(|entity| entity.kind.category() == category)
            .filter(|entity| {
                search
                    .fields
                    .iter()
                    .any(|field| entity.matches_field(*field, search.term.as_str()))
            })
            .cloned()
            .collect())
    }

    async fn list_memberships(&self, subject_id: &EntityId) -> AppResult<Vec<GroupMembership>> {
        let edges = self.edges.lock().await;
        Ok(edges
            .iter()
            .filter(|edge| &edge.subject_id == subject_id)
            .filter_map(|edge| {
                self.find(&edge.target_id).map(|group| GroupMembership {
                    group: group.clone(),
                    role: edge.role,
                })
            })
            .collect())
    }

    async fn add_membership(&self, edge: &MembershipEdge) -> AppResult<()> {
        self.mutations.lock().await.push(("add", edge.clone()));
        self.check_target(edge)?;

        let mut edges = self.edges.lock().await;
        if edges.contains(edge) {
            return Err(AppError::Conflict(
                "One or more added object references already exist".to_owned(),
            ));
        }
        edges.push(edge.clone());
        Ok(())
    }

    async fn remove_membership(&self, edge: &MembershipEdge) -> AppResult<()> {
        self.mutations.lock().await.push(("remove", edge.clone()));
        self.check_target(edge)?;

        let mut edges = self.edges.lock().await;
        let before = edges.len();
        edges.retain(|stored| stored != edge);
        if edges.len() == before {
            return Err(AppError::NotFound(format!(
                "edge to '{}' does not exist",
                edge.target_id
            )));
        }
        Ok(())
    }
}
