use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use deskbot_core::{AppError, AppResult};
use deskbot_domain::{MailboxPermissionEdge, MailboxRight};

/// Existence check and mutation verbs for one kind of mailbox right.
///
/// Mutations follow the directory gateway contract: `Conflict` when the
/// right is already granted, `NotFound` when it is already absent and
/// `Forbidden` when the change was denied.
#[async_trait]
pub trait MailboxRightStrategy: Send + Sync {
    /// Right kind handled by this strategy.
    fn right(&self) -> MailboxRight;

    /// Rewrites `edge` to the identities that listings report.
    ///
    /// Listings and requested edges are compared with
    /// [`MailboxPermissionEdge::same_as`], so both sides must name the
    /// mailbox and the principal in the same form.
    async fn canonical_edge(
        &self,
        edge: &MailboxPermissionEdge,
    ) -> AppResult<MailboxPermissionEdge> {
        Ok(edge.clone())
    }

    /// Returns every principal holding this right on `mailbox`, by canonical identity.
    async fn holders(&self, mailbox: &str) -> AppResult<Vec<MailboxPermissionEdge>>;

    /// Returns every mailbox on which `principal` holds this right.
    async fn mailboxes_held_by(&self, principal: &str) -> AppResult<Vec<MailboxPermissionEdge>>;

    /// Grants the right.
    async fn grant(&self, edge: &MailboxPermissionEdge) -> AppResult<()>;

    /// Revokes the right.
    async fn revoke(&self, edge: &MailboxPermissionEdge) -> AppResult<()>;
}

/// Strategies keyed by the right they handle.
#[derive(Clone, Default)]
pub struct MailboxRightRegistry {
    strategies: HashMap<MailboxRight, Arc<dyn MailboxRightStrategy>>,
}

impl MailboxRightRegistry {
    /// Builds a registry; later strategies replace earlier ones for the same right.
    #[must_use]
    pub fn new(strategies: Vec<Arc<dyn MailboxRightStrategy>>) -> Self {
        Self {
            strategies: strategies
                .into_iter()
                .map(|strategy| (strategy.right(), strategy))
                .collect(),
        }
    }

    /// Returns the strategy for `right`.
    pub fn get(&self, right: MailboxRight) -> AppResult<Arc<dyn MailboxRightStrategy>> {
        self.strategies.get(&right).cloned().ok_or_else(|| {
            AppError::Internal(format!(
                "no strategy registered for mailbox right '{}'",
                right.as_str()
            ))
        })
    }

    /// Returns the registered rights in stable order.
    #[must_use]
    pub fn rights(&self) -> Vec<MailboxRight> {
        let mut rights: Vec<_> = self.strategies.keys().copied().collect();
        rights.sort();
        rights
    }
}
