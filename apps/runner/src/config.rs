use std::env;
use std::str::FromStr;
use std::time::Duration;

use deskbot_application::BotRequest;
use deskbot_core::{AppError, AppResult, TenantId};
use deskbot_domain::{BotOperation, MailboxRight, MembershipRole};

/// Reads one configuration value by name.
pub type EnvSource<'a> = &'a dyn Fn(&str) -> Option<String>;

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub secret_store_url: String,
    pub secret_store_tenant_id: TenantId,
    pub secret_store_client_id: String,
    pub secret_store_client_secret: String,
    pub login_authority_url: String,
    pub graph_base_url: String,
    pub psa_base_url: String,
    pub psa_resource_scope: String,
    pub psa_company: String,
    pub powershell_executable: String,
    pub shell_timeout: Option<Duration>,
    pub http_max_attempts: u32,
    pub http_base_delay: Duration,
    pub run_deadline: Option<Duration>,
    pub request: BotRequest,
}

impl RunnerConfig {
    pub fn load() -> AppResult<Self> {
        Self::from_source(&|name| env::var(name).ok())
    }

    pub fn from_source(source: EnvSource<'_>) -> AppResult<Self> {
        let secret_store_url = required_env(source, "SECRET_STORE_URL")?;
        let secret_store_tenant_id =
            TenantId::parse(required_env(source, "SECRET_STORE_TENANT_ID")?.as_str())?;
        let secret_store_client_id = required_env(source, "SECRET_STORE_CLIENT_ID")?;
        let secret_store_client_secret = required_env(source, "SECRET_STORE_CLIENT_SECRET")?;
        let login_authority_url = optional_env(source, "LOGIN_AUTHORITY_URL")
            .unwrap_or_else(|| "https://login.microsoftonline.com".to_owned());
        let graph_base_url = optional_env(source, "GRAPH_BASE_URL")
            .unwrap_or_else(|| "https://graph.microsoft.com/v1.0".to_owned());
        let psa_base_url = required_env(source, "PSA_BASE_URL")?;
        let psa_resource_scope = required_env(source, "PSA_RESOURCE_SCOPE")?;
        let psa_company = required_env(source, "PSA_COMPANY")?;
        let powershell_executable =
            optional_env(source, "POWERSHELL_EXECUTABLE").unwrap_or_else(|| "pwsh".to_owned());
        let shell_timeout_seconds = parse_env(source, "SHELL_TIMEOUT_SECONDS", 300_u64)?;
        let http_max_attempts = parse_env(source, "HTTP_MAX_ATTEMPTS", 5_u32)?;
        let http_base_delay_ms = parse_env(source, "HTTP_BASE_DELAY_MS", 1000_u64)?;
        let run_deadline_seconds = parse_env(source, "RUN_DEADLINE_SECONDS", 0_u64)?;

        if http_max_attempts == 0 {
            return Err(AppError::Validation(
                "HTTP_MAX_ATTEMPTS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            secret_store_url,
            secret_store_tenant_id,
            secret_store_client_id,
            secret_store_client_secret,
            login_authority_url,
            graph_base_url,
            psa_base_url,
            psa_resource_scope,
            psa_company,
            powershell_executable,
            shell_timeout: seconds(shell_timeout_seconds),
            http_max_attempts,
            http_base_delay: Duration::from_millis(http_base_delay_ms),
            run_deadline: seconds(run_deadline_seconds),
            request: load_request(source)?,
        })
    }
}

fn load_request(source: EnvSource<'_>) -> AppResult<BotRequest> {
    let ticket_id = required_env(source, "BOT_TICKET_ID")?;
    let ticket_id = ticket_id.parse::<u64>().map_err(|error| {
        AppError::Validation(format!("invalid BOT_TICKET_ID value '{ticket_id}': {error}"))
    })?;
    let operation = BotOperation::from_str(required_env(source, "BOT_OPERATION")?.as_str())?;
    let subject = required_env(source, "BOT_SUBJECT")?;
    let targets = optional_env(source, "BOT_TARGETS")
        .map(|value| split_targets(value.as_str()))
        .unwrap_or_default();
    let role = optional_env(source, "BOT_ROLE")
        .map(|value| MembershipRole::from_str(value.as_str()))
        .transpose()?
        .unwrap_or(MembershipRole::Member);
    let mailbox_right = optional_env(source, "BOT_MAILBOX_RIGHT")
        .map(|value| MailboxRight::from_str(value.as_str()))
        .transpose()?;

    Ok(BotRequest {
        ticket_id,
        operation,
        subject,
        targets,
        role,
        mailbox_right,
    })
}

/// Splits a ticket field listing groups or mailboxes on commas, semicolons and newlines.
pub fn split_targets(value: &str) -> Vec<String> {
    value
        .split([',', ';', '\n'])
        .map(str::trim)
        .filter(|target| !target.is_empty())
        .map(str::to_owned)
        .collect()
}

fn seconds(value: u64) -> Option<Duration> {
    (value > 0).then(|| Duration::from_secs(value))
}

fn optional_env(source: EnvSource<'_>, name: &str) -> Option<String> {
    source(name)
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn required_env(source: EnvSource<'_>, name: &str) -> AppResult<String> {
    optional_env(source, name).ok_or_else(|| AppError::Validation(format!("{name} is required")))
}

fn parse_env<T>(source: EnvSource<'_>, name: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional_env(source, name) {
        Some(value) => value.parse::<T>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        None => Ok(default),
    }
}
