use std::sync::Arc;

use async_trait::async_trait;

use deskbot_core::AppResult;
use deskbot_domain::AccessToken;

use crate::{DirectoryGateway, MailboxRightRegistry, RunReport};

/// Ticketing system holding the requests bots work on.
#[async_trait]
pub trait TicketLookup: Send + Sync {
    /// Returns the identifier of the company that raised `ticket_id`.
    async fn company_for_ticket(&self, ticket_id: u64) -> AppResult<String>;
}

/// Sink receiving the final report of every run.
#[async_trait]
pub trait ResultReporter: Send + Sync {
    /// Publishes `report`.
    async fn report(&self, report: &RunReport) -> AppResult<()>;
}

/// Builds remote sessions bound to one company's tokens.
pub trait SessionFactory: Send + Sync {
    /// Returns a directory gateway authenticated with `token`.
    fn directory(&self, token: Arc<AccessToken>) -> Arc<dyn DirectoryGateway>;

    /// Returns mailbox right strategies for `tenant_domain`, authenticated with `token`.
    fn mailbox_rights(&self, token: Arc<AccessToken>, tenant_domain: &str) -> MailboxRightRegistry;
}
