//! Group membership reconciliation.
//!
//! Every target group is bucketed by [`GroupClass`] before anything is sent to
//! the directory: dynamic and mail-enabled distribution groups are reported as
//! skipped and never reach a mutation call. Batch operations process every
//! edge independently and aggregate the per-item outcomes.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, warn};

use deskbot_core::{AppError, AppResult};
use deskbot_domain::{
    DirectoryEntity, GroupClass, GroupMembership, MembershipEdge, MembershipRole,
    dedupe_memberships,
};

use crate::{
    DirectoryGateway, EdgeOutcome, EdgeReport, FailureReason, ReconcileReport, SkipReason,
};

/// Application service computing and applying membership changes.
#[derive(Clone)]
pub struct MembershipService {
    gateway: Arc<dyn DirectoryGateway>,
}

impl MembershipService {
    /// Creates a membership service over a directory gateway.
    #[must_use]
    pub fn new(gateway: Arc<dyn DirectoryGateway>) -> Self {
        Self { gateway }
    }

    /// Adds `subject` to `group` with `role`, skipping edges that already exist.
    pub async fn add_edge(
        &self,
        subject: &DirectoryEntity,
        group: &DirectoryEntity,
        role: MembershipRole,
    ) -> EdgeReport {
        let membership = GroupMembership {
            group: group.clone(),
            role,
        };

        if let Some(reason) = immutable_reason(group) {
            return report(&membership, EdgeOutcome::Skipped(reason));
        }

        let outcome = match self.gateway.list_memberships(&subject.id).await {
            Ok(current) if current.iter().any(|held| held.key() == membership.key()) => {
                EdgeOutcome::Skipped(SkipReason::AlreadyPresent)
            }
            Ok(_) => self.apply_add(&membership.edge_for(&subject.id)).await,
            Err(error) => EdgeOutcome::Failed(FailureReason::Unexpected(format!(
                "failed to read current memberships: {error}"
            ))),
        };

        log_outcome(subject, &membership, &outcome);
        report(&membership, outcome)
    }

    /// Removes `subject` from `group` for `role`; an absent edge counts as skipped.
    pub async fn remove_edge(
        &self,
        subject: &DirectoryEntity,
        group: &DirectoryEntity,
        role: MembershipRole,
    ) -> EdgeReport {
        let membership = GroupMembership {
            group: group.clone(),
            role,
        };

        if let Some(reason) = immutable_reason(group) {
            return report(&membership, EdgeOutcome::Skipped(reason));
        }

        let outcome = self.apply_remove(&membership.edge_for(&subject.id)).await;
        log_outcome(subject, &membership, &outcome);
        report(&membership, outcome)
    }

    /// Removes every mutable membership and ownership `subject` holds.
    ///
    /// Fails only when the current memberships cannot be read; individual
    /// removal failures are reported per item.
    pub async fn remove_all_edges(&self, subject: &DirectoryEntity) -> AppResult<ReconcileReport> {
        let current = dedupe_memberships(self.gateway.list_memberships(&subject.id).await?);
        let mut result = ReconcileReport::default();

        for membership in &current {
            result.record(self.remove_held(subject, membership).await);
        }

        info!(
            subject = %subject.id,
            removed = result.removed.len(),
            skipped = result.skipped.len(),
            failed = result.failed.len(),
            "removed all group memberships"
        );

        Ok(result)
    }

    /// Applies the difference between `desired` and `current` memberships.
    ///
    /// Desired edges already held are reported as skipped; held edges not
    /// desired are removed.
    pub async fn reconcile(
        &self,
        subject: &DirectoryEntity,
        desired: Vec<GroupMembership>,
        current: Vec<GroupMembership>,
    ) -> ReconcileReport {
        let desired = dedupe_memberships(desired);
        let current = dedupe_memberships(current);
        let desired_keys: HashSet<_> = desired.iter().map(GroupMembership::key).collect();
        let current_keys: HashSet<_> = current.iter().map(GroupMembership::key).collect();
        let mut result = ReconcileReport::default();

        for membership in &desired {
            let outcome = if current_keys.contains(&membership.key()) {
                EdgeOutcome::Skipped(SkipReason::AlreadyPresent)
            } else if let Some(reason) = immutable_reason(&membership.group) {
                EdgeOutcome::Skipped(reason)
            } else {
                self.apply_add(&membership.edge_for(&subject.id)).await
            };
            log_outcome(subject, membership, &outcome);
            result.record(report(membership, outcome));
        }

        for membership in current
            .iter()
            .filter(|membership| !desired_keys.contains(&membership.key()))
        {
            result.record(self.remove_held(subject, membership).await);
        }

        result
    }

    async fn remove_held(
        &self,
        subject: &DirectoryEntity,
        membership: &GroupMembership,
    ) -> EdgeReport {
        let outcome = match immutable_reason(&membership.group) {
            Some(reason) => EdgeOutcome::Skipped(reason),
            None => self.apply_remove(&membership.edge_for(&subject.id)).await,
        };
        log_outcome(subject, membership, &outcome);
        report(membership, outcome)
    }

    async fn apply_add(&self, edge: &MembershipEdge) -> EdgeOutcome {
        match self.gateway.add_membership(edge).await {
            Ok(()) => EdgeOutcome::Added,
            Err(AppError::Conflict(_)) => EdgeOutcome::Skipped(SkipReason::AlreadyPresent),
            Err(error) => EdgeOutcome::Failed(classify_failure(error)),
        }
    }

    async fn apply_remove(&self, edge: &MembershipEdge) -> EdgeOutcome {
        match self.gateway.remove_membership(edge).await {
            Ok(()) => EdgeOutcome::Removed,
            Err(AppError::NotFound(_)) => EdgeOutcome::Skipped(SkipReason::AlreadyAbsent),
            Err(error) => EdgeOutcome::Failed(classify_failure(error)),
        }
    }
}

pub(crate) fn classify_failure(error: AppError) -> FailureReason {
    match error {
        AppError::Forbidden(detail) | AppError::Unauthorized(detail) => {
            FailureReason::PermissionDenied(detail)
        }
        other => FailureReason::Unexpected(other.to_string()),
    }
}

fn immutable_reason(group: &DirectoryEntity) -> Option<SkipReason> {
    match group.group_class() {
        GroupClass::Dynamic => Some(SkipReason::DynamicMembership),
        GroupClass::MailEnabledDistribution => Some(SkipReason::MailEnabledDistribution),
        GroupClass::Mutable => None,
    }
}

fn report(membership: &GroupMembership, outcome: EdgeOutcome) -> EdgeReport {
    EdgeReport {
        target_id: membership.group.id.to_string(),
        target_name: membership.group.display_name.clone(),
        relation: membership.role.as_str().to_owned(),
        outcome,
    }
}

fn log_outcome(subject: &DirectoryEntity, membership: &GroupMembership, outcome: &EdgeOutcome) {
    match outcome {
        EdgeOutcome::Failed(reason) => warn!(
            subject = %subject.id,
            group = %membership.group.id,
            role = membership.role.as_str(),
            error = reason.detail(),
            "membership change failed"
        ),
        other => info!(
            subject = %subject.id,
            group = %membership.group.id,
            role = membership.role.as_str(),
            outcome = ?other,
            "membership processed"
        ),
    }
}

#[cfg(test)]
mod tests;
