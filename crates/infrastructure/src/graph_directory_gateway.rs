//! Directory gateway over the Microsoft Graph REST API.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;
use url::Url;

use deskbot_application::{DirectoryGateway, DirectorySearch};
use deskbot_core::{AppError, AppResult};
use deskbot_domain::{
    AccessToken, DirectoryEntity, EntityCategory, EntityId, EntityKind, GroupMembership,
    MembershipEdge, MembershipRole, SearchField,
};

use crate::call_error::outcome_error;
use crate::{CallRequest, ResilientCallExecutor};

const USER_SELECT: &str = "id,displayName,userPrincipalName,mail,onPremisesSyncEnabled";
const GROUP_SELECT: &str =
    "id,displayName,mail,mailNickname,mailEnabled,securityEnabled,groupTypes,onPremisesSyncEnabled";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphUser {
    id: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    user_principal_name: Option<String>,
    #[serde(default)]
    mail: Option<String>,
    #[serde(default)]
    on_premises_sync_enabled: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphGroup {
    id: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    mail: Option<String>,
    #[serde(default)]
    mail_nickname: Option<String>,
    #[serde(default)]
    mail_enabled: Option<bool>,
    #[serde(default)]
    group_types: Vec<String>,
    #[serde(default)]
    on_premises_sync_enabled: Option<bool>,
}

impl GraphUser {
    fn into_entity(self) -> AppResult<DirectoryEntity> {
        let display_name = self.display_name.unwrap_or_default();
        Ok(DirectoryEntity {
            id: EntityId::new(self.id)?,
            principal_name: self
                .user_principal_name
                .unwrap_or_else(|| display_name.clone()),
            display_name,
            mail: self.mail,
            kind: EntityKind::User,
            on_prem_synced: self.on_premises_sync_enabled.unwrap_or(false),
        })
    }
}

impl GraphGroup {
    fn into_entity(self) -> AppResult<DirectoryEntity> {
        let kind = EntityKind::from_group_flags(
            self.group_types.as_slice(),
            self.mail_enabled.unwrap_or(false),
        );
        let display_name = self.display_name.unwrap_or_default();
        Ok(DirectoryEntity {
            id: EntityId::new(self.id)?,
            principal_name: self
                .mail_nickname
                .unwrap_or_else(|| display_name.clone()),
            display_name,
            mail: self.mail,
            kind,
            on_prem_synced: self.on_premises_sync_enabled.unwrap_or(false),
        })
    }
}

fn parse_entity(category: EntityCategory, value: Value) -> AppResult<DirectoryEntity> {
    let parsed = match category {
        EntityCategory::User => {
            serde_json::from_value::<GraphUser>(value).map(GraphUser::into_entity)
        }
        EntityCategory::Group => {
            serde_json::from_value::<GraphGroup>(value).map(GraphGroup::into_entity)
        }
    };

    parsed.map_err(|error| {
        AppError::Transport(format!(
            "unexpected {} payload from directory: {error}",
            category.as_str()
        ))
    })?
}

fn collection(category: EntityCategory) -> &'static str {
    match category {
        EntityCategory::User => "users",
        EntityCategory::Group => "groups",
    }
}

fn select(category: EntityCategory) -> &'static str {
    match category {
        EntityCategory::User => USER_SELECT,
        EntityCategory::Group => GROUP_SELECT,
    }
}

fn field_name(field: SearchField) -> &'static str {
    match field {
        SearchField::DisplayName => "displayName",
        SearchField::PrincipalName => "userPrincipalName",
        SearchField::Mail => "mail",
    }
}

fn relation_path(role: MembershipRole) -> &'static str {
    match role {
        MembershipRole::Member => "members",
        MembershipRole::Owner => "owners",
    }
}

/// Builds an OData filter matching `term` as prefix or exact value on every field.
pub(crate) fn search_filter(search: &DirectorySearch) -> String {
    let literal = search.term.trim().replace('\'', "''");
    search
        .fields
        .iter()
        .map(|field| {
            let name = field_name(*field);
            format!("startswith({name},'{literal}') or {name} eq '{literal}'")
        })
        .collect::<Vec<_>>()
        .join(" or ")
}

/// Graph-backed directory gateway bound to one bearer token.
#[derive(Clone)]
pub struct GraphDirectoryGateway {
    executor: ResilientCallExecutor,
    base_url: String,
    token: Arc<AccessToken>,
}

impl GraphDirectoryGateway {
    /// Creates a gateway for `base_url` (for example `https://graph.microsoft.com/v1.0`).
    #[must_use]
    pub fn new(
        executor: ResilientCallExecutor,
        base_url: impl Into<String>,
        token: Arc<AccessToken>,
    ) -> Self {
        Self {
            executor,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            token,
        }
    }

    fn url(&self, path: &str, query: &[(&str, &str)]) -> AppResult<String> {
        let mut url = Url::parse(format!("{}/{path}", self.base_url).as_str()).map_err(|error| {
            AppError::Validation(format!("invalid directory url for '{path}': {error}"))
        })?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query.iter().copied());
        }

        Ok(url.into())
    }

    fn request(&self, request: CallRequest) -> CallRequest {
        request.bearer(self.token.value())
    }

    async fn list_related(
        &self,
        path: &str,
        role: MembershipRole,
    ) -> AppResult<Vec<GroupMembership>> {
        let url = self.url(path, &[("$select", GROUP_SELECT)])?;
        let items = self
            .executor
            .execute_paged(&self.request(CallRequest::get(url)))
            .await
            .map_err(|outcome| outcome_error(format!("list {path}").as_str(), &outcome))?;

        items
            .into_iter()
            .map(|item| {
                Ok(GroupMembership {
                    group: parse_entity(EntityCategory::Group, item)?,
                    role,
                })
            })
            .collect()
    }
}

#[async_trait]
impl DirectoryGateway for GraphDirectoryGateway {
    async fn get_entity(
        &self,
        category: EntityCategory,
        id: &EntityId,
    ) -> AppResult<Option<DirectoryEntity>> {
        let url = self.url(
            format!("{}/{id}", collection(category)).as_str(),
            &[("$select", select(category))],
        )?;
        let outcome = self.executor.execute(&self.request(CallRequest::get(url))).await;

        if outcome.status == deskbot_domain::CallStatus::NotFound {
            return Ok(None);
        }
        if !outcome.is_success() {
            return Err(outcome_error(
                format!("get {} {id}", category.as_str()).as_str(),
                &outcome,
            ));
        }

        parse_entity(category, outcome.payload).map(Some)
    }

    async fn search_entities(
        &self,
        category: EntityCategory,
        search: &DirectorySearch,
    ) -> AppResult<Vec<DirectoryEntity>> {
        let filter = search_filter(search);
        let url = self.url(
            collection(category),
            &[("$filter", filter.as_str()), ("$select", select(category))],
        )?;
        let items = self
            .executor
            .execute_paged(&self.request(CallRequest::get(url)))
            .await
            .map_err(|outcome| {
                outcome_error(format!("search {}s", category.as_str()).as_str(), &outcome)
            })?;

        debug!(
            category = category.as_str(),
            term = %search.term,
            results = items.len(),
            "directory search returned"
        );

        items
            .into_iter()
            .map(|item| parse_entity(category, item))
            .collect()
    }

    async fn list_memberships(&self, subject_id: &EntityId) -> AppResult<Vec<GroupMembership>> {
        let mut memberships = self
            .list_related(
                format!("users/{subject_id}/memberOf/microsoft.graph.group").as_str(),
                MembershipRole::Member,
            )
            .await?;
        memberships.extend(
            self.list_related(
                format!("users/{subject_id}/ownedObjects/microsoft.graph.group").as_str(),
                MembershipRole::Owner,
            )
            .await?,
        );

        Ok(memberships)
    }

    async fn add_membership(&self, edge: &MembershipEdge) -> AppResult<()> {
        let url = self.url(
            format!(
                "groups/{}/{}/$ref",
                edge.target_id,
                relation_path(edge.role)
            )
            .as_str(),
            &[],
        )?;
        let body = json!({
            "@odata.id": format!("{}/directoryObjects/{}", self.base_url, edge.subject_id),
        });
        let outcome = self
            .executor
            .execute(&self.request(CallRequest::post(url).json(body)))
            .await;

        if outcome.is_success() {
            return Ok(());
        }
        Err(outcome_error(
            format!("add {} to group {}", edge.role.as_str(), edge.target_id).as_str(),
            &outcome,
        ))
    }

    async fn remove_membership(&self, edge: &MembershipEdge) -> AppResult<()> {
        let url = self.url(
            format!(
                "groups/{}/{}/{}/$ref",
                edge.target_id,
                relation_path(edge.role),
                edge.subject_id
            )
            .as_str(),
            &[],
        )?;
        let outcome = self
            .executor
            .execute(&self.request(CallRequest::delete(url)))
            .await;

        if outcome.is_success() {
            return Ok(());
        }
        Err(outcome_error(
            format!("remove {} from group {}", edge.role.as_str(), edge.target_id).as_str(),
            &outcome,
        ))
    }
}

#[cfg(test)]
mod tests;
