//! Mailbox delegation reconciliation.
//!
//! Same shape as group membership reconciliation; the right kind selects the
//! [`MailboxRightStrategy`] that knows how to check and mutate it.

use std::sync::Arc;

use tracing::{info, warn};

use deskbot_core::{AppError, AppResult};
use deskbot_domain::{MailboxPermissionEdge, MailboxRight};

use crate::membership_service::classify_failure;
use crate::{
    EdgeOutcome, EdgeReport, FailureReason, MailboxRightRegistry, MailboxRightStrategy,
    ReconcileReport, SkipReason,
};

/// Application service granting and revoking mailbox rights.
#[derive(Clone)]
pub struct MailboxPermissionService {
    registry: Arc<MailboxRightRegistry>,
}

impl MailboxPermissionService {
    /// Creates a service over a strategy registry.
    #[must_use]
    pub fn new(registry: Arc<MailboxRightRegistry>) -> Self {
        Self { registry }
    }

    /// Grants `edge`, skipping rights that are already held.
    pub async fn grant(&self, edge: &MailboxPermissionEdge) -> EdgeReport {
        let (edge, outcome) = match self.prepare(edge).await {
            Ok((strategy, edge)) => {
                let outcome = match strategy.holders(edge.mailbox_identity.as_str()).await {
                    Ok(holders) if holders.iter().any(|held| held.same_as(&edge)) => {
                        EdgeOutcome::Skipped(SkipReason::AlreadyPresent)
                    }
                    Ok(_) => apply_grant(strategy.as_ref(), &edge).await,
                    Err(error) => read_failure(error),
                };
                (edge, outcome)
            }
            Err(outcome) => (edge.clone(), outcome),
        };

        log_outcome(&edge, &outcome);
        report(&edge, outcome)
    }

    /// Revokes `edge` after checking that it is held.
    pub async fn revoke(&self, edge: &MailboxPermissionEdge) -> EdgeReport {
        let (edge, outcome) = match self.prepare(edge).await {
            Ok((strategy, edge)) => {
                let outcome = match strategy.holders(edge.mailbox_identity.as_str()).await {
                    Ok(holders) if holders.iter().any(|held| held.same_as(&edge)) => {
                        apply_revoke(strategy.as_ref(), &edge).await
                    }
                    Ok(_) => EdgeOutcome::Skipped(SkipReason::AlreadyAbsent),
                    Err(error) => read_failure(error),
                };
                (edge, outcome)
            }
            Err(outcome) => (edge.clone(), outcome),
        };

        log_outcome(&edge, &outcome);
        report(&edge, outcome)
    }

    /// Returns every right `principal` holds, across all registered kinds.
    pub async fn current_edges(&self, principal: &str) -> AppResult<Vec<MailboxPermissionEdge>> {
        let mut edges = Vec::new();
        for right in self.registry.rights() {
            let strategy = self.registry.get(right)?;
            edges.extend(strategy.mailboxes_held_by(principal).await?);
        }

        Ok(edges)
    }

    /// Revokes every right `principal` holds.
    ///
    /// A right kind whose holdings cannot be listed is reported as one failed
    /// item; the remaining kinds are still processed.
    pub async fn revoke_all(&self, principal: &str) -> ReconcileReport {
        let mut result = ReconcileReport::default();

        for right in self.registry.rights() {
            let held = match self.registry.get(right) {
                Ok(strategy) => strategy.mailboxes_held_by(principal).await,
                Err(error) => Err(error),
            };

            match held {
                Ok(edges) => {
                    for edge in dedupe(edges) {
                        result.record(self.revoke_held(&edge).await);
                    }
                }
                Err(error) => {
                    warn!(
                        principal,
                        right = right.as_str(),
                        error = %error,
                        "failed to list mailbox rights"
                    );
                    result.record(EdgeReport {
                        target_id: "*".to_owned(),
                        target_name: format!("all {} mailboxes", right.as_str()),
                        relation: right.as_str().to_owned(),
                        outcome: read_failure(error),
                    });
                }
            }
        }

        info!(
            principal,
            removed = result.removed.len(),
            skipped = result.skipped.len(),
            failed = result.failed.len(),
            "revoked all mailbox rights"
        );

        result
    }

    /// Grants missing `desired` rights and revokes held rights not desired.
    ///
    /// Both sides are rewritten to canonical identities first. When a desired
    /// edge cannot be resolved nothing is revoked, since a held right might be
    /// the unresolved one under another name.
    pub async fn reconcile(
        &self,
        desired: Vec<MailboxPermissionEdge>,
        current: Vec<MailboxPermissionEdge>,
    ) -> ReconcileReport {
        let mut result = ReconcileReport::default();
        let (desired, unresolved) = self.canonical_edges(dedupe(desired), &mut result).await;
        let (current, _) = self.canonical_edges(dedupe(current), &mut result).await;

        for edge in &desired {
            if current.iter().any(|held| held.same_as(edge)) {
                let outcome = EdgeOutcome::Skipped(SkipReason::AlreadyPresent);
                log_outcome(edge, &outcome);
                result.record(report(edge, outcome));
            } else {
                let outcome = match self.registry.get(edge.right) {
                    Ok(strategy) => apply_grant(strategy.as_ref(), edge).await,
                    Err(error) => EdgeOutcome::Failed(classify_failure(error)),
                };
                log_outcome(edge, &outcome);
                result.record(report(edge, outcome));
            }
        }

        let undesired = current
            .iter()
            .filter(|held| !desired.iter().any(|wanted| wanted.same_as(held)));
        if unresolved > 0 {
            warn!(unresolved, "skipping mailbox revocations after unresolved desired rights");
            for edge in undesired {
                let outcome = EdgeOutcome::Failed(FailureReason::Unresolved(
                    "not revoked: desired mailbox rights could not be resolved".to_owned(),
                ));
                log_outcome(edge, &outcome);
                result.record(report(edge, outcome));
            }
        } else {
            for edge in undesired {
                result.record(self.revoke_held(edge).await);
            }
        }

        result
    }

    /// Looks up the strategy for `edge` and rewrites it to canonical identities.
    async fn prepare(
        &self,
        edge: &MailboxPermissionEdge,
    ) -> Result<(Arc<dyn MailboxRightStrategy>, MailboxPermissionEdge), EdgeOutcome> {
        let strategy = self
            .registry
            .get(edge.right)
            .map_err(|error| EdgeOutcome::Failed(classify_failure(error)))?;
        let canonical = strategy.canonical_edge(edge).await.map_err(read_failure)?;

        Ok((strategy, canonical))
    }

    /// Canonicalizes `edges`, recording each one that cannot be resolved.
    ///
    /// Returns the resolved edges and the number that failed.
    async fn canonical_edges(
        &self,
        edges: Vec<MailboxPermissionEdge>,
        result: &mut ReconcileReport,
    ) -> (Vec<MailboxPermissionEdge>, usize) {
        let mut resolved = Vec::with_capacity(edges.len());
        let mut failed = 0;
        for edge in edges {
            match self.prepare(&edge).await {
                Ok((_, canonical)) => resolved.push(canonical),
                Err(outcome) => {
                    failed += 1;
                    log_outcome(&edge, &outcome);
                    result.record(report(&edge, outcome));
                }
            }
        }

        (dedupe(resolved), failed)
    }

    async fn revoke_held(&self, edge: &MailboxPermissionEdge) -> EdgeReport {
        let outcome = match self.registry.get(edge.right) {
            Ok(strategy) => apply_revoke(strategy.as_ref(), edge).await,
            Err(error) => EdgeOutcome::Failed(classify_failure(error)),
        };
        log_outcome(edge, &outcome);
        report(edge, outcome)
    }
}

async fn apply_grant(
    strategy: &dyn MailboxRightStrategy,
    edge: &MailboxPermissionEdge,
) -> EdgeOutcome {
    match strategy.grant(edge).await {
        Ok(()) => EdgeOutcome::Added,
        Err(AppError::Conflict(_)) => EdgeOutcome::Skipped(SkipReason::AlreadyPresent),
        Err(error) => EdgeOutcome::Failed(classify_failure(error)),
    }
}

async fn apply_revoke(
    strategy: &dyn MailboxRightStrategy,
    edge: &MailboxPermissionEdge,
) -> EdgeOutcome {
    match strategy.revoke(edge).await {
        Ok(()) => EdgeOutcome::Removed,
        Err(AppError::NotFound(_)) => EdgeOutcome::Skipped(SkipReason::AlreadyAbsent),
        Err(error) => EdgeOutcome::Failed(classify_failure(error)),
    }
}

fn read_failure(error: AppError) -> EdgeOutcome {
    match classify_failure(error) {
        FailureReason::Unexpected(detail) => EdgeOutcome::Failed(FailureReason::Unexpected(
            format!("failed to read mailbox rights: {detail}"),
        )),
        other => EdgeOutcome::Failed(other),
    }
}

fn dedupe(edges: Vec<MailboxPermissionEdge>) -> Vec<MailboxPermissionEdge> {
    let mut unique: Vec<MailboxPermissionEdge> = Vec::with_capacity(edges.len());
    for edge in edges {
        if !unique.iter().any(|kept| kept.same_as(&edge)) {
            unique.push(edge);
        }
    }
    unique
}

fn report(edge: &MailboxPermissionEdge, outcome: EdgeOutcome) -> EdgeReport {
    EdgeReport {
        target_id: edge.mailbox_identity.clone(),
        target_name: edge.mailbox_identity.clone(),
        relation: edge.right.as_str().to_owned(),
        outcome,
    }
}

fn log_outcome(edge: &MailboxPermissionEdge, outcome: &EdgeOutcome) {
    match outcome {
        EdgeOutcome::Failed(reason) => warn!(
            principal = %edge.subject_principal,
            mailbox = %edge.mailbox_identity,
            right = edge.right.as_str(),
            error = reason.detail(),
            "mailbox right change failed"
        ),
        other => info!(
            principal = %edge.subject_principal,
            mailbox = %edge.mailbox_identity,
            right = edge.right.as_str(),
            outcome = ?other,
            "mailbox right processed"
        ),
    }
}

/// Returns the edges `principal` would hold on each of `mailboxes` with `right`.
#[must_use]
pub fn desired_mailbox_edges(
    principal: &str,
    mailboxes: &[String],
    right: MailboxRight,
) -> Vec<MailboxPermissionEdge> {
    mailboxes
        .iter()
        .map(|mailbox| MailboxPermissionEdge {
            subject_principal: principal.to_owned(),
            mailbox_identity: mailbox.trim().to_owned(),
            right,
        })
        .collect()
}
