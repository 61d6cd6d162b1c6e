use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use deskbot_application::{SecretStore, TokenEndpoint};
use deskbot_core::{AppError, AppResult, TenantId};
use deskbot_domain::{AccessToken, ApiScope, Credential};

use crate::call_error::outcome_error;
use crate::{CallRequest, ResilientCallExecutor};

/// OAuth scope of the secret store itself.
pub const VAULT_RESOURCE: &str = "https://vault.azure.net/.default";

const API_VERSION: &str = "7.4";

/// Identity the store uses to authenticate against the vault.
#[derive(Debug, Clone)]
pub struct VaultIdentity {
    /// Tenant owning the vault.
    pub tenant_id: TenantId,
    /// Registration client id and secret.
    pub credential: Credential,
}

/// Secret store backed by a vault REST API.
#[derive(Clone)]
pub struct KeyVaultSecretStore {
    executor: ResilientCallExecutor,
    vault_url: String,
    identity: VaultIdentity,
    token_endpoint: Arc<dyn TokenEndpoint>,
    scope: ApiScope,
    cached_token: Arc<RwLock<Option<AccessToken>>>,
}

impl KeyVaultSecretStore {
    /// Creates a store reading from `vault_url`.
    pub fn new(
        executor: ResilientCallExecutor,
        vault_url: impl Into<String>,
        identity: VaultIdentity,
        token_endpoint: Arc<dyn TokenEndpoint>,
    ) -> AppResult<Self> {
        Ok(Self {
            executor,
            vault_url: vault_url.into().trim_end_matches('/').to_owned(),
            identity,
            token_endpoint,
            scope: ApiScope::new("SecretStore", VAULT_RESOURCE)?,
            cached_token: Arc::new(RwLock::new(None)),
        })
    }

    async fn vault_token(&self) -> AppResult<String> {
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                if !token.is_expired_at(Utc::now(), Duration::minutes(5), Duration::minutes(50)) {
                    return Ok(token.value().to_owned());
                }
            }
        }

        let acquired_at = Utc::now();
        let grant = self
            .token_endpoint
            .request_token(self.identity.tenant_id, &self.identity.credential, &self.scope)
            .await?;
        let expires_at = grant
            .expires_in_seconds
            .filter(|seconds| *seconds > 0)
            .map(|seconds| acquired_at + Duration::seconds(seconds));
        let token = AccessToken::new(grant.access_token, VAULT_RESOURCE, acquired_at, expires_at)?;
        debug!(token = %token.preview(), "acquired secret store token");

        let value = token.value().to_owned();
        *self.cached_token.write().await = Some(token);
        Ok(value)
    }
}

fn validate_secret_name(name: &str) -> AppResult<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|character| character.is_ascii_alphanumeric() || character == '-');
    if valid {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "secret name '{name}' may only contain ASCII letters, digits and dashes"
        )))
    }
}

#[async_trait]
impl SecretStore for KeyVaultSecretStore {
    async fn get_secret(&self, name: &str) -> AppResult<Option<String>> {
        validate_secret_name(name)?;
        let token = self.vault_token().await?;
        let request = CallRequest::get(format!(
            "{}/secrets/{name}?api-version={API_VERSION}",
            self.vault_url
        ))
        .bearer(token);

        let outcome = self.executor.execute(&request).await;
        if outcome.status == deskbot_domain::CallStatus::NotFound {
            debug!(secret = name, "secret does not exist");
            return Ok(None);
        }
        if !outcome.is_success() {
            if outcome.http_status == Some(401) {
                *self.cached_token.write().await = None;
            }
            return Err(outcome_error(
                format!("read secret '{name}'").as_str(),
                &outcome,
            ));
        }

        Ok(outcome
            .payload
            .get("value")
            .and_then(Value::as_str)
            .map(str::to_owned))
    }
}
