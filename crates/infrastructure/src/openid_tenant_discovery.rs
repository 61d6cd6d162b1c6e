use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use deskbot_application::TenantDiscovery;
use deskbot_core::{AppError, AppResult, TenantId};

use crate::call_error::outcome_error;
use crate::{CallRequest, ResilientCallExecutor};

/// Discovers a domain's tenant from the authority's OpenID configuration.
#[derive(Clone)]
pub struct OpenIdTenantDiscovery {
    executor: ResilientCallExecutor,
    authority_url: String,
}

impl OpenIdTenantDiscovery {
    /// Creates a discovery client for `authority_url`.
    #[must_use]
    pub fn new(executor: ResilientCallExecutor, authority_url: impl Into<String>) -> Self {
        Self {
            executor,
            authority_url: authority_url.into().trim_end_matches('/').to_owned(),
        }
    }

    fn configuration_url(&self, domain: &str) -> String {
        format!(
            "{}/{domain}/v2.0/.well-known/openid-configuration",
            self.authority_url
        )
    }
}

/// Returns the tenant segment of a token endpoint URL.
///
/// `https://login.example.com/<tenant>/oauth2/v2.0/token` splits on `/` into
/// `["https:", "", "login.example.com", "<tenant>", ...]`.
pub(crate) fn tenant_segment(token_endpoint: &str) -> Option<&str> {
    token_endpoint
        .split('/')
        .nth(3)
        .filter(|segment| !segment.is_empty())
}

#[async_trait]
impl TenantDiscovery for OpenIdTenantDiscovery {
    async fn discover_tenant(&self, domain: &str) -> AppResult<TenantId> {
        let domain = domain.trim();
        if domain.is_empty() || domain.contains('/') {
            return Err(AppError::Validation(format!(
                "'{domain}' is not a valid tenant domain"
            )));
        }

        let outcome = self
            .executor
            .execute(&CallRequest::get(self.configuration_url(domain)))
            .await;
        if !outcome.is_success() {
            return Err(outcome_error(
                format!("tenant discovery for '{domain}'").as_str(),
                &outcome,
            ));
        }

        let token_endpoint = outcome
            .payload
            .get("token_endpoint")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "openid configuration for '{domain}' has no token_endpoint"
                ))
            })?;
        let segment = tenant_segment(token_endpoint).ok_or_else(|| {
            AppError::NotFound(format!(
                "token endpoint '{token_endpoint}' does not name a tenant"
            ))
        })?;
        let tenant_id = TenantId::parse(segment)?;

        debug!(domain, tenant_id = %tenant_id, "discovered tenant");
        Ok(tenant_id)
    }
}
