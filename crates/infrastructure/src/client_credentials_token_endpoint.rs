use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use deskbot_application::{TokenEndpoint, TokenGrant};
use deskbot_core::{AppError, AppResult, TenantId};
use deskbot_domain::{ApiScope, Credential};

use crate::call_error::outcome_error;
use crate::{CallRequest, ResilientCallExecutor};

/// Attempt budget for one token exchange.
pub const TOKEN_EXCHANGE_ATTEMPTS: u32 = 3;

/// OAuth2 client-credentials grant against the login authority.
#[derive(Clone)]
pub struct ClientCredentialsTokenEndpoint {
    executor: ResilientCallExecutor,
    authority_url: String,
}

impl ClientCredentialsTokenEndpoint {
    /// Creates an endpoint posting to `<authority_url>/<tenant>/oauth2/v2.0/token`.
    #[must_use]
    pub fn new(executor: &ResilientCallExecutor, authority_url: impl Into<String>) -> Self {
        Self {
            executor: executor.with_max_attempts(TOKEN_EXCHANGE_ATTEMPTS),
            authority_url: authority_url.into().trim_end_matches('/').to_owned(),
        }
    }

    fn token_url(&self, tenant_id: TenantId) -> String {
        format!("{}/{tenant_id}/oauth2/v2.0/token", self.authority_url)
    }
}

#[async_trait]
impl TokenEndpoint for ClientCredentialsTokenEndpoint {
    async fn request_token(
        &self,
        tenant_id: TenantId,
        credential: &Credential,
        scope: &ApiScope,
    ) -> AppResult<TokenGrant> {
        let request = CallRequest::post(self.token_url(tenant_id)).form(vec![
            ("grant_type".to_owned(), "client_credentials".to_owned()),
            ("client_id".to_owned(), credential.client_id().to_owned()),
            (
                "client_secret".to_owned(),
                credential.client_secret().to_owned(),
            ),
            ("scope".to_owned(), scope.resource().to_owned()),
        ]);

        let outcome = self.executor.execute(&request).await;
        if !outcome.is_success() {
            return Err(match outcome_error("token exchange", &outcome) {
                AppError::Validation(detail) | AppError::Forbidden(detail) => {
                    AppError::Unauthorized(detail)
                }
                other => other,
            });
        }

        let access_token = outcome
            .payload
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AppError::MalformedCredential(
                    "token response does not contain an access_token".to_owned(),
                )
            })?;
        let expires_in_seconds = outcome.payload.get("expires_in").and_then(|value| {
            value
                .as_i64()
                .or_else(|| value.as_str().and_then(|text| text.parse().ok()))
        });

        debug!(tenant_id = %tenant_id, scope = scope.app(), "token exchange succeeded");

        Ok(TokenGrant {
            access_token: access_token.to_owned(),
            expires_in_seconds,
        })
    }
}
