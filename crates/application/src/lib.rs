//! Application services and ports.

#![forbid(unsafe_code)]

mod bot_runner;
mod broker_ports;
mod directory_ports;
mod directory_resolver_service;
mod mailbox_permission_service;
mod mailbox_ports;
mod membership_service;
mod reconcile_report;
mod run_context;
mod run_ports;
mod shell_ports;
mod token_broker_service;

#[cfg(test)]
mod fake_directory;

pub use bot_runner::BotRunner;
pub use broker_ports::{SecretStore, TenantDiscovery, TokenEndpoint, TokenGrant};
pub use directory_ports::{DirectoryGateway, DirectorySearch};
pub use directory_resolver_service::{
    AmbiguousMatch, Candidate, DirectoryResolverService, Resolution,
};
pub use mailbox_permission_service::{MailboxPermissionService, desired_mailbox_edges};
pub use mailbox_ports::{MailboxRightRegistry, MailboxRightStrategy};
pub use membership_service::MembershipService;
pub use reconcile_report::{EdgeOutcome, EdgeReport, FailureReason, ReconcileReport, SkipReason};
pub use run_context::{BotRequest, RunContext, RunReport, RunStatus};
pub use run_ports::{ResultReporter, SessionFactory, TicketLookup};
pub use shell_ports::{ShellBridge, ShellLine, ShellOutcome, ShellScript};
pub use token_broker_service::{TokenBrokerService, TokenCachePolicy};
