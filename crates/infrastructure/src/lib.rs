//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod call_error;
mod client_credentials_token_endpoint;
mod console_result_reporter;
mod exchange_mailbox_rights;
mod graph_directory_gateway;
mod key_vault_secret_store;
mod openid_tenant_discovery;
mod powershell_bridge;
mod psa_ticket_lookup;
mod remote_session_factory;
mod resilient_call_executor;

pub use client_credentials_token_endpoint::{
    ClientCredentialsTokenEndpoint, TOKEN_EXCHANGE_ATTEMPTS,
};
pub use console_result_reporter::ConsoleResultReporter;
pub use exchange_mailbox_rights::{
    ExchangeSession, FullAccessStrategy, SendAsStrategy, SendOnBehalfStrategy,
    exchange_mailbox_rights,
};
pub use graph_directory_gateway::GraphDirectoryGateway;
pub use key_vault_secret_store::{KeyVaultSecretStore, VAULT_RESOURCE, VaultIdentity};
pub use openid_tenant_discovery::OpenIdTenantDiscovery;
pub use powershell_bridge::{
    DEFAULT_WARNING_PATTERNS, POWERSHELL_ARGS, PowerShellBridge, ShellConfig, redact,
};
pub use psa_ticket_lookup::PsaTicketLookup;
pub use remote_session_factory::RemoteSessionFactory;
pub use resilient_call_executor::{
    CallBody, CallRequest, ResilientCallExecutor, RetryPolicy, retry_delay,
};
