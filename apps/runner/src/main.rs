//! Deskbot runner: processes one helpdesk ticket and prints its report.

#![forbid(unsafe_code)]

mod config;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use deskbot_application::{BotRunner, RunStatus, TokenBrokerService, TokenCachePolicy};
use deskbot_core::{AppError, AppResult};
use deskbot_domain::{ApiScope, Credential};
use deskbot_infrastructure::{
    ClientCredentialsTokenEndpoint, ConsoleResultReporter, KeyVaultSecretStore,
    OpenIdTenantDiscovery, PowerShellBridge, PsaTicketLookup, RemoteSessionFactory,
    ResilientCallExecutor, RetryPolicy, ShellConfig, VaultIdentity,
};

use tokio::time::Instant;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::RunnerConfig;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    match run().await {
        Ok(RunStatus::Succeeded) => ExitCode::SUCCESS,
        Ok(RunStatus::PartiallyFailed) => ExitCode::from(2),
        Ok(RunStatus::Failed) => ExitCode::FAILURE,
        Err(error) => {
            error!(error = %error, "deskbot-runner could not start");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> AppResult<RunStatus> {
    let config = RunnerConfig::load()?;
    let runner = build_runner(&config)?;

    info!(
        ticket_id = config.request.ticket_id,
        operation = config.request.operation.as_str(),
        graph_base_url = %config.graph_base_url,
        run_deadline_seconds = config.run_deadline.map(|deadline| deadline.as_secs()),
        "deskbot-runner started"
    );

    let report = runner.run(config.request.clone()).await;
    Ok(report.status)
}

fn build_runner(config: &RunnerConfig) -> AppResult<BotRunner> {
    let http_client = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|error| AppError::Internal(format!("failed to build HTTP client: {error}")))?;
    let policy = RetryPolicy {
        max_attempts: config.http_max_attempts,
        base_delay: config.http_base_delay,
        ..RetryPolicy::default()
    };
    let executor = ResilientCallExecutor::new(http_client, policy)
        .with_deadline(config.run_deadline.map(|deadline| Instant::now() + deadline));

    let token_endpoint = Arc::new(ClientCredentialsTokenEndpoint::new(
        &executor,
        config.login_authority_url.as_str(),
    ));
    let secret_store = Arc::new(KeyVaultSecretStore::new(
        executor.clone(),
        config.secret_store_url.as_str(),
        VaultIdentity {
            tenant_id: config.secret_store_tenant_id,
            credential: Credential::new(
                config.secret_store_tenant_id.to_string(),
                config.secret_store_client_id.as_str(),
                config.secret_store_client_secret.as_str(),
            )?,
        },
        token_endpoint.clone(),
    )?);
    let tenant_discovery = Arc::new(OpenIdTenantDiscovery::new(
        executor.clone(),
        config.login_authority_url.as_str(),
    ));
    let broker = TokenBrokerService::new(secret_store, tenant_discovery, token_endpoint)
        .with_cache(TokenCachePolicy::default());

    let tickets = Arc::new(PsaTicketLookup::new(
        executor.clone(),
        config.psa_base_url.as_str(),
        broker.clone(),
        config.psa_company.as_str(),
        ApiScope::new("PSA", config.psa_resource_scope.as_str())?,
    ));
    let shell = Arc::new(PowerShellBridge::new(ShellConfig::powershell(
        config.powershell_executable.as_str(),
        config.shell_timeout,
    ))?);
    let sessions = Arc::new(RemoteSessionFactory::new(
        executor,
        config.graph_base_url.as_str(),
        shell,
        config.shell_timeout,
    ));

    Ok(BotRunner::new(
        broker,
        tickets,
        sessions,
        Arc::new(ConsoleResultReporter::new()),
    )
    .with_deadline(config.run_deadline))
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
