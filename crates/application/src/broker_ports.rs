use async_trait::async_trait;

use deskbot_core::{AppResult, TenantId};
use deskbot_domain::{ApiScope, Credential};

/// Secret store holding application registrations and company domains.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Reads a secret by name. Returns `None` when the secret does not exist.
    async fn get_secret(&self, name: &str) -> AppResult<Option<String>>;
}

/// Resolves the directory tenant behind a domain name.
#[async_trait]
pub trait TenantDiscovery: Send + Sync {
    /// Returns the tenant that owns `domain`.
    async fn discover_tenant(&self, domain: &str) -> AppResult<TenantId>;
}

/// Raw result of a client-credentials exchange, before shape validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    /// Bearer value as returned by the endpoint.
    pub access_token: String,
    /// Lifetime reported by the endpoint.
    pub expires_in_seconds: Option<i64>,
}

/// OAuth2 token endpoint performing the client-credentials grant.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Exchanges `credential` for a token valid for `scope` in `tenant_id`.
    async fn request_token(
        &self,
        tenant_id: TenantId,
        credential: &Credential,
        scope: &ApiScope,
    ) -> AppResult<TokenGrant>;
}
