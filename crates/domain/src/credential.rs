//! Application credentials, OAuth scopes and bearer tokens.

use std::fmt::{Debug, Formatter};

use chrono::{DateTime, Duration, Utc};
use deskbot_core::{AppError, AppResult, token_preview};
use serde::{Deserialize, Serialize};

/// OAuth scope for Microsoft Graph.
pub const GRAPH_RESOURCE: &str = "https://graph.microsoft.com/.default";

/// OAuth scope for Exchange Online.
pub const EXCHANGE_RESOURCE: &str = "https://outlook.office365.com/.default";

/// An application registration and the resource it requests tokens for.
///
/// `app` names the registration in the secret store; `resource` is the OAuth
/// scope sent to the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApiScope {
    app: String,
    resource: String,
}

impl ApiScope {
    /// Creates a scope for an arbitrary registration.
    pub fn new(app: impl Into<String>, resource: impl Into<String>) -> AppResult<Self> {
        let app = app.into();
        let resource = resource.into();
        if app.trim().is_empty() || resource.trim().is_empty() {
            return Err(AppError::Validation(
                "api scope app and resource must not be empty".to_owned(),
            ));
        }

        Ok(Self { app, resource })
    }

    /// Directory scope backed by the `Graph` registration.
    #[must_use]
    pub fn graph() -> Self {
        Self {
            app: "Graph".to_owned(),
            resource: GRAPH_RESOURCE.to_owned(),
        }
    }

    /// Mailbox scope backed by the `Exchange` registration.
    #[must_use]
    pub fn exchange() -> Self {
        Self {
            app: "Exchange".to_owned(),
            resource: EXCHANGE_RESOURCE.to_owned(),
        }
    }

    /// Returns the registration name.
    #[must_use]
    pub fn app(&self) -> &str {
        self.app.as_str()
    }

    /// Returns the OAuth scope value.
    #[must_use]
    pub fn resource(&self) -> &str {
        self.resource.as_str()
    }

    /// Secret name holding the registration's client id.
    #[must_use]
    pub fn client_id_secret_name(&self) -> String {
        format!("{}-ClientID", self.app)
    }

    /// Secret name holding the registration's client secret.
    #[must_use]
    pub fn client_secret_secret_name(&self) -> String {
        format!("{}-ClientSecret", self.app)
    }
}

/// Secret name holding a company's primary domain.
///
/// Secret names only allow ASCII alphanumerics and dashes, so every other
/// character in the company identifier becomes a dash.
#[must_use]
pub fn company_domain_secret_name(company: &str) -> String {
    let sanitized: String = company
        .trim()
        .chars()
        .map(|character| {
            if character.is_ascii_alphanumeric() {
                character
            } else {
                '-'
            }
        })
        .collect();

    format!("{sanitized}-Domain")
}

/// Client-credentials for one application registration in one tenant.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    tenant_domain: String,
    client_id: String,
    client_secret: String,
}

impl Credential {
    /// Creates a credential, rejecting empty parts.
    pub fn new(
        tenant_domain: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> AppResult<Self> {
        let tenant_domain = tenant_domain.into().trim().to_owned();
        let client_id = client_id.into().trim().to_owned();
        let client_secret = client_secret.into();

        for (name, value) in [
            ("tenant domain", tenant_domain.as_str()),
            ("client id", client_id.as_str()),
            ("client secret", client_secret.as_str()),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::MalformedCredential(format!("{name} is empty")));
            }
        }

        Ok(Self {
            tenant_domain,
            client_id,
            client_secret,
        })
    }

    /// Returns the company's primary domain.
    #[must_use]
    pub fn tenant_domain(&self) -> &str {
        self.tenant_domain.as_str()
    }

    /// Returns the application client id.
    #[must_use]
    pub fn client_id(&self) -> &str {
        self.client_id.as_str()
    }

    /// Returns the application client secret.
    #[must_use]
    pub fn client_secret(&self) -> &str {
        self.client_secret.as_str()
    }
}

impl Debug for Credential {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Credential")
            .field("tenant_domain", &self.tenant_domain)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// A validated bearer token.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    value: String,
    scope: String,
    acquired_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    /// Wraps a raw token after checking its JWT shape.
    pub fn new(
        value: impl Into<String>,
        scope: impl Into<String>,
        acquired_at: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
    ) -> AppResult<Self> {
        let value = value.into();
        if !Self::is_well_formed(value.as_str()) {
            return Err(AppError::MalformedCredential(format!(
                "token '{}' is not a three-part JWT",
                token_preview(value.as_str())
            )));
        }

        Ok(Self {
            value,
            scope: scope.into(),
            acquired_at,
            expires_at,
        })
    }

    /// A token is usable only when non-empty with at least two `.` separators.
    #[must_use]
    pub fn is_well_formed(value: &str) -> bool {
        !value.is_empty() && value.matches('.').count() >= 2
    }

    /// Returns the raw bearer value.
    #[must_use]
    pub fn value(&self) -> &str {
        self.value.as_str()
    }

    /// Returns the scope the token was requested for.
    #[must_use]
    pub fn scope(&self) -> &str {
        self.scope.as_str()
    }

    /// Returns when the token was acquired.
    #[must_use]
    pub fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }

    /// Returns the expiry reported by the token endpoint, if any.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Returns a log-safe prefix of the token.
    #[must_use]
    pub fn preview(&self) -> String {
        token_preview(self.value.as_str())
    }

    /// Returns whether the token is expired at `now` once `margin` is applied.
    ///
    /// Tokens without a reported expiry are treated as valid for `fallback_ttl`
    /// after acquisition.
    #[must_use]
    pub fn is_expired_at(
        &self,
        now: DateTime<Utc>,
        margin: Duration,
        fallback_ttl: Duration,
    ) -> bool {
        let expires_at = self
            .expires_at
            .unwrap_or(self.acquired_at + fallback_ttl);
        now + margin >= expires_at
    }
}

impl Debug for AccessToken {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("AccessToken")
            .field("value", &self.preview())
            .field("scope", &self.scope)
            .field("acquired_at", &self.acquired_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use deskbot_core::AppError;
    use proptest::prelude::*;

    use super::{AccessToken, ApiScope, Credential, company_domain_secret_name};

    #[test]
    fn scope_secret_names_follow_convention() {
        let scope = ApiScope::graph();
        assert_eq!(scope.client_id_secret_name(), "Graph-ClientID");
        assert_eq!(scope.client_secret_secret_name(), "Graph-ClientSecret");
    }

    #[test]
    fn company_domain_secret_name_is_sanitized() {
        assert_eq!(company_domain_secret_name("Contoso Ltd."), "Contoso-Ltd--Domain");
    }

    #[test]
    fn empty_client_secret_is_malformed() {
        let credential = Credential::new("contoso.onmicrosoft.com", "client", "");
        assert!(matches!(credential, Err(AppError::MalformedCredential(_))));
    }

    #[test]
    fn credential_debug_hides_secret() {
        let credential = Credential::new("contoso.onmicrosoft.com", "client", "hunter2");
        assert!(credential.is_ok());
        let rendered = format!("{:?}", credential.unwrap_or_else(|_| unreachable!()));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn token_debug_shows_preview_only() {
        let token = AccessToken::new(
            "header-part.payload-part.signature",
            "scope",
            Utc::now(),
            None,
        );
        assert!(token.is_ok());
        let rendered = format!("{:?}", token.unwrap_or_else(|_| unreachable!()));
        assert!(rendered.contains("header-p..."));
        assert!(!rendered.contains("signature"));
    }

    #[test]
    fn token_without_expiry_uses_fallback_ttl() {
        let acquired_at = Utc::now();
        let token = AccessToken::new("a.b.c", "scope", acquired_at, None);
        assert!(token.is_ok());
        let token = token.unwrap_or_else(|_| unreachable!());

        assert!(!token.is_expired_at(acquired_at, Duration::minutes(5), Duration::minutes(50)));
        assert!(token.is_expired_at(
            acquired_at + Duration::minutes(46),
            Duration::minutes(5),
            Duration::minutes(50)
        ));
    }

    proptest! {
        #[test]
        fn tokens_with_fewer_than_two_dots_are_rejected(raw in "[A-Za-z0-9_-]{0,40}(\\.[A-Za-z0-9_-]{0,40})?") {
            let result = AccessToken::new(raw, "scope", Utc::now(), None);
            prop_assert!(matches!(result, Err(AppError::MalformedCredential(_))));
        }

        #[test]
        fn three_part_tokens_are_accepted(
            header in "[A-Za-z0-9_-]{1,20}",
            payload in "[A-Za-z0-9_-]{1,20}",
            signature in "[A-Za-z0-9_-]{1,20}",
        ) {
            let raw = format!("{header}.{payload}.{signature}");
            let result = AccessToken::new(raw.clone(), "scope", Utc::now(), None);
            prop_assert!(result.is_ok());
            prop_assert_eq!(result.map(|token| token.value().to_owned()).unwrap_or_default(), raw);
        }
    }
}
