//! Secret/token broker.
//!
//! Turns a company identifier and an [`ApiScope`] into a validated bearer
//! token: secrets are read from the store, the tenant is discovered from the
//! company's primary domain, and the token is obtained with the
//! client-credentials grant. The same broker serves every registration
//! (directory, mailbox, ticketing).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info};

use deskbot_core::{AppError, AppResult, NonEmptyString};
use deskbot_domain::{AccessToken, ApiScope, Credential, company_domain_secret_name};

use crate::{SecretStore, TenantDiscovery, TokenEndpoint};

/// Expiry rules for cached tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenCachePolicy {
    /// Tokens closer than this to expiry are refreshed.
    pub refresh_margin: Duration,
    /// Lifetime assumed when the endpoint reports none.
    pub fallback_ttl: Duration,
}

impl Default for TokenCachePolicy {
    fn default() -> Self {
        Self {
            refresh_margin: Duration::minutes(5),
            fallback_ttl: Duration::minutes(50),
        }
    }
}

type CacheKey = (String, ApiScope);

struct TokenCache {
    policy: TokenCachePolicy,
    entries: Mutex<HashMap<CacheKey, Arc<AccessToken>>>,
}

/// Application service resolving credentials and bearer tokens.
#[derive(Clone)]
pub struct TokenBrokerService {
    secret_store: Arc<dyn SecretStore>,
    tenant_discovery: Arc<dyn TenantDiscovery>,
    token_endpoint: Arc<dyn TokenEndpoint>,
    cache: Option<Arc<TokenCache>>,
}

impl TokenBrokerService {
    /// Creates a broker that requests a fresh token on every call.
    #[must_use]
    pub fn new(
        secret_store: Arc<dyn SecretStore>,
        tenant_discovery: Arc<dyn TenantDiscovery>,
        token_endpoint: Arc<dyn TokenEndpoint>,
    ) -> Self {
        Self {
            secret_store,
            tenant_discovery,
            token_endpoint,
            cache: None,
        }
    }

    /// Enables the per-company token cache.
    #[must_use]
    pub fn with_cache(mut self, policy: TokenCachePolicy) -> Self {
        self.cache = Some(Arc::new(TokenCache {
            policy,
            entries: Mutex::new(HashMap::new()),
        }));
        self
    }

    /// Returns a well-formed token for `company` and `scope`.
    pub async fn get_token(&self, company: &str, scope: &ApiScope) -> AppResult<Arc<AccessToken>> {
        let company = normalize_company(company)?;

        if let Some(cache) = &self.cache {
            let key = (company.clone(), scope.clone());
            let entries = cache.entries.lock().await;
            if let Some(token) = entries.get(&key) {
                let policy = &cache.policy;
                if !token.is_expired_at(Utc::now(), policy.refresh_margin, policy.fallback_ttl) {
                    debug!(company = %company, scope = scope.app(), "using cached token");
                    return Ok(Arc::clone(token));
                }
            }
        }

        let token = Arc::new(self.acquire_token(company.as_str(), scope).await?);

        if let Some(cache) = &self.cache {
            cache
                .entries
                .lock()
                .await
                .insert((company, scope.clone()), Arc::clone(&token));
        }

        Ok(token)
    }

    /// Drops a cached token so the next request acquires a new one.
    pub async fn invalidate(&self, company: &str, scope: &ApiScope) {
        if let Some(cache) = &self.cache {
            if let Ok(company) = normalize_company(company) {
                cache.entries.lock().await.remove(&(company, scope.clone()));
            }
        }
    }

    /// Returns the company's primary domain from the secret store.
    pub async fn company_domain(&self, company: &str) -> AppResult<String> {
        let company = normalize_company(company)?;
        self.required_secret(company_domain_secret_name(company.as_str()).as_str())
            .await
    }

    /// Reads the registration's client id and secret plus the company domain.
    ///
    /// Every part must be non-empty; nothing is sent to the token endpoint otherwise.
    pub async fn resolve_credential(
        &self,
        company: &str,
        scope: &ApiScope,
    ) -> AppResult<Credential> {
        let client_id = self
            .required_secret(scope.client_id_secret_name().as_str())
            .await?;
        let client_secret = self
            .required_secret(scope.client_secret_secret_name().as_str())
            .await?;
        let tenant_domain = self.company_domain(company).await?;

        Credential::new(tenant_domain, client_id, client_secret)
    }

    async fn acquire_token(&self, company: &str, scope: &ApiScope) -> AppResult<AccessToken> {
        let credential = self.resolve_credential(company, scope).await?;
        let tenant_id = self
            .tenant_discovery
            .discover_tenant(credential.tenant_domain())
            .await?;

        let acquired_at = Utc::now();
        let grant = self
            .token_endpoint
            .request_token(tenant_id, &credential, scope)
            .await?;
        let expires_at = grant
            .expires_in_seconds
            .filter(|seconds| *seconds > 0)
            .map(|seconds| acquired_at + Duration::seconds(seconds));

        let token =
            AccessToken::new(grant.access_token, scope.resource(), acquired_at, expires_at)?;

        info!(
            company = %company,
            scope = scope.app(),
            tenant_id = %tenant_id,
            token = %token.preview(),
            "acquired access token"
        );

        Ok(token)
    }

    async fn required_secret(&self, name: &str) -> AppResult<String> {
        match self.secret_store.get_secret(name).await? {
            Some(value) if !value.trim().is_empty() => Ok(value.trim().to_owned()),
            _ => Err(AppError::MalformedCredential(format!(
                "secret '{name}' is missing or empty"
            ))),
        }
    }
}

fn normalize_company(company: &str) -> AppResult<String> {
    NonEmptyString::new(company)
        .map(String::from)
        .map_err(|_| AppError::Validation("company identifier must not be empty".to_owned()))
}
