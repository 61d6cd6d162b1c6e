//! Mailbox right strategies issuing Exchange Online cmdlets through the shell bridge.
//!
//! Listing scripts print one `success : <identity>` line per holder or mailbox.
//! Holders are printed as user principal names and mailboxes as primary SMTP
//! addresses; [`ExchangeSession::canonical_edge`] rewrites requested edges to
//! the same forms.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use deskbot_application::{
    MailboxRightRegistry, MailboxRightStrategy, ShellBridge, ShellLine, ShellOutcome, ShellScript,
};
use deskbot_core::{AppError, AppResult};
use deskbot_domain::{AccessToken, MailboxPermissionEdge, MailboxRight};

/// Quotes `value` as a PowerShell single-quoted literal.
pub(crate) fn ps_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Connected Exchange Online session for one organization.
pub struct ExchangeSession {
    bridge: Arc<dyn ShellBridge>,
    token: Arc<AccessToken>,
    organization: String,
    timeout: Option<Duration>,
}

impl ExchangeSession {
    /// Creates a session that connects with `token` to `organization`.
    #[must_use]
    pub fn new(
        bridge: Arc<dyn ShellBridge>,
        token: Arc<AccessToken>,
        organization: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            bridge,
            token,
            organization: organization.into(),
            timeout,
        }
    }

    fn script(&self, body: &str) -> ShellScript {
        let text = format!(
            "$ErrorActionPreference = 'Stop'\n\
             Import-Module ExchangeOnlineManagement\n\
             Connect-ExchangeOnline -AccessToken {} -Organization {} -ShowBanner:$false\n\
             {body}\n\
             Disconnect-ExchangeOnline -Confirm:$false",
            ps_quote(self.token.value()),
            ps_quote(self.organization.as_str()),
        );

        ShellScript::new(text).with_sensitive(self.token.value())
    }

    async fn run(&self, action: &str, body: &str) -> AppResult<ShellOutcome> {
        let outcome = self
            .bridge
            .run_command(&self.script(body), self.timeout)
            .await;
        if outcome.success {
            return Ok(outcome);
        }

        Err(shell_error(action, &outcome))
    }

    async fn list(&self, action: &str, body: &str) -> AppResult<Vec<String>> {
        let outcome = self.run(action, body).await?;
        let identities: Vec<String> = outcome
            .lines()
            .into_iter()
            .filter_map(|line| match line {
                ShellLine::Success(identity) if !identity.is_empty() => Some(identity),
                _ => None,
            })
            .collect();

        debug!(action, count = identities.len(), "listed mailbox rights");
        Ok(identities)
    }

    /// Resolves the mailbox to its primary SMTP address and the principal to
    /// its user principal name.
    pub async fn canonical_edge(
        &self,
        edge: &MailboxPermissionEdge,
    ) -> AppResult<MailboxPermissionEdge> {
        let body = format!(
            "$mailbox = Get-Mailbox -Identity {}\n\
             'success : ' + $mailbox.PrimarySmtpAddress\n\
             $user = Get-User -Identity {}\n\
             'success : ' + $user.UserPrincipalName",
            ps_quote(edge.mailbox_identity.as_str()),
            ps_quote(edge.subject_principal.as_str())
        );
        let identities = self.list("resolve mailbox right", &body).await?;
        match <[String; 2]>::try_from(identities) {
            Ok([mailbox_identity, subject_principal]) => Ok(MailboxPermissionEdge {
                subject_principal,
                mailbox_identity,
                right: edge.right,
            }),
            Err(_) => Err(AppError::NotFound(format!(
                "could not resolve '{}' on mailbox '{}'",
                edge.subject_principal, edge.mailbox_identity
            ))),
        }
    }
}

/// Pipeline stage printing the user principal name of each `$_.<property>`.
///
/// Holders that are not users, such as security groups, are dropped.
fn print_user(property: &str) -> String {
    format!(
        "ForEach-Object {{ $user = Get-User -Identity $_.{property} -ErrorAction SilentlyContinue; \
         if ($user) {{ 'success : ' + $user.UserPrincipalName }} }}"
    )
}

/// Pipeline stage printing the primary SMTP address of each `$_.<property>`.
fn print_mailbox(property: &str) -> String {
    format!(
        "ForEach-Object {{ $mailbox = Get-Mailbox -Identity $_.{property} \
         -ErrorAction SilentlyContinue; \
         if ($mailbox) {{ 'success : ' + $mailbox.PrimarySmtpAddress }} }}"
    )
}

/// Translates a failed shell outcome into an error category.
pub(crate) fn shell_error(action: &str, outcome: &ShellOutcome) -> AppError {
    let detail = format!("{action}: {}", outcome.diagnostic());
    if outcome.timed_out {
        return AppError::Timeout(detail);
    }

    let lowered = outcome.diagnostic().to_ascii_lowercase();
    if lowered.contains("already") {
        AppError::Conflict(detail)
    } else if lowered.contains("access denied")
        || lowered.contains("insufficient")
        || lowered.contains("unauthorized")
    {
        AppError::Forbidden(detail)
    } else if lowered.contains("couldn't be found")
        || lowered.contains("could not be found")
        || lowered.contains("doesn't exist")
        || lowered.contains("does not exist")
    {
        AppError::NotFound(detail)
    } else {
        AppError::Transport(detail)
    }
}

fn edges(
    identities: Vec<String>,
    right: MailboxRight,
    build: impl Fn(String) -> (String, String),
) -> Vec<MailboxPermissionEdge> {
    identities
        .into_iter()
        .map(|identity| {
            let (subject_principal, mailbox_identity) = build(identity);
            MailboxPermissionEdge {
                subject_principal,
                mailbox_identity,
                right,
            }
        })
        .collect()
}

/// `FullAccess` through `Get/Add/Remove-MailboxPermission`.
pub struct FullAccessStrategy {
    session: Arc<ExchangeSession>,
}

#[async_trait]
impl MailboxRightStrategy for FullAccessStrategy {
    fn right(&self) -> MailboxRight {
        MailboxRight::FullAccess
    }

    async fn canonical_edge(
        &self,
        edge: &MailboxPermissionEdge,
    ) -> AppResult<MailboxPermissionEdge> {
        self.session.canonical_edge(edge).await
    }

    async fn holders(&self, mailbox: &str) -> AppResult<Vec<MailboxPermissionEdge>> {
        let body = format!(
            "Get-MailboxPermission -Identity {} | Where-Object {{ -not $_.IsInherited -and \
             $_.AccessRights -contains 'FullAccess' -and $_.User -notlike 'NT AUTHORITY*' }} | {}",
            ps_quote(mailbox),
            print_user("User")
        );
        let holders = self.session.list("list full access holders", &body).await?;
        Ok(edges(holders, self.right(), |holder| {
            (holder, mailbox.to_owned())
        }))
    }

    async fn mailboxes_held_by(&self, principal: &str) -> AppResult<Vec<MailboxPermissionEdge>> {
        let body = format!(
            "Get-Mailbox -ResultSize Unlimited | Get-MailboxPermission -User {} | Where-Object {{ \
             -not $_.IsInherited -and $_.AccessRights -contains 'FullAccess' }} | {}",
            ps_quote(principal),
            print_mailbox("Identity")
        );
        let mailboxes = self.session.list("list full access mailboxes", &body).await?;
        Ok(edges(mailboxes, self.right(), |mailbox| {
            (principal.to_owned(), mailbox)
        }))
    }

    async fn grant(&self, edge: &MailboxPermissionEdge) -> AppResult<()> {
        let body = format!(
            "Add-MailboxPermission -Identity {} -User {} -AccessRights FullAccess \
             -InheritanceType All -AutoMapping $true -Confirm:$false | Out-Null",
            ps_quote(edge.mailbox_identity.as_str()),
            ps_quote(edge.subject_principal.as_str())
        );
        self.session.run("grant full access", &body).await.map(|_| ())
    }

    async fn revoke(&self, edge: &MailboxPermissionEdge) -> AppResult<()> {
        let body = format!(
            "Remove-MailboxPermission -Identity {} -User {} -AccessRights FullAccess \
             -InheritanceType All -Confirm:$false",
            ps_quote(edge.mailbox_identity.as_str()),
            ps_quote(edge.subject_principal.as_str())
        );
        self.session.run("revoke full access", &body).await.map(|_| ())
    }
}

/// `SendAs` through `Get/Add/Remove-RecipientPermission`.
pub struct SendAsStrategy {
    session: Arc<ExchangeSession>,
}

#[async_trait]
impl MailboxRightStrategy for SendAsStrategy {
    fn right(&self) -> MailboxRight {
        MailboxRight::SendAs
    }

    async fn canonical_edge(
        &self,
        edge: &MailboxPermissionEdge,
    ) -> AppResult<MailboxPermissionEdge> {
        self.session.canonical_edge(edge).await
    }

    async fn holders(&self, mailbox: &str) -> AppResult<Vec<MailboxPermissionEdge>> {
        let body = format!(
            "Get-RecipientPermission -Identity {} -AccessRights SendAs | Where-Object {{ \
             -not $_.IsInherited -and $_.Trustee -notlike 'NT AUTHORITY*' }} | {}",
            ps_quote(mailbox),
            print_user("Trustee")
        );
        let holders = self.session.list("list send as holders", &body).await?;
        Ok(edges(holders, self.right(), |holder| {
            (holder, mailbox.to_owned())
        }))
    }

    async fn mailboxes_held_by(&self, principal: &str) -> AppResult<Vec<MailboxPermissionEdge>> {
        let body = format!(
            "Get-RecipientPermission -Trustee {} -AccessRights SendAs -ResultSize Unlimited | {}",
            ps_quote(principal),
            print_mailbox("Identity")
        );
        let mailboxes = self.session.list("list send as mailboxes", &body).await?;
        Ok(edges(mailboxes, self.right(), |mailbox| {
            (principal.to_owned(), mailbox)
        }))
    }

    async fn grant(&self, edge: &MailboxPermissionEdge) -> AppResult<()> {
        let body = format!(
            "Add-RecipientPermission -Identity {} -Trustee {} -AccessRights SendAs \
             -Confirm:$false | Out-Null",
            ps_quote(edge.mailbox_identity.as_str()),
            ps_quote(edge.subject_principal.as_str())
        );
        self.session.run("grant send as", &body).await.map(|_| ())
    }

    async fn revoke(&self, edge: &MailboxPermissionEdge) -> AppResult<()> {
        let body = format!(
            "Remove-RecipientPermission -Identity {} -Trustee {} -AccessRights SendAs \
             -Confirm:$false",
            ps_quote(edge.mailbox_identity.as_str()),
            ps_quote(edge.subject_principal.as_str())
        );
        self.session.run("revoke send as", &body).await.map(|_| ())
    }
}

/// `SendOnBehalfOf` through `Get-Mailbox` and `Set-Mailbox -GrantSendOnBehalfTo`.
pub struct SendOnBehalfStrategy {
    session: Arc<ExchangeSession>,
}

#[async_trait]
impl MailboxRightStrategy for SendOnBehalfStrategy {
    fn right(&self) -> MailboxRight {
        MailboxRight::SendOnBehalfOf
    }

    async fn canonical_edge(
        &self,
        edge: &MailboxPermissionEdge,
    ) -> AppResult<MailboxPermissionEdge> {
        self.session.canonical_edge(edge).await
    }

    async fn holders(&self, mailbox: &str) -> AppResult<Vec<MailboxPermissionEdge>> {
        let body = format!(
            "(Get-Mailbox -Identity {}).GrantSendOnBehalfTo | {}",
            ps_quote(mailbox),
            print_user("ToString()")
        );
        let holders = self.session.list("list send on behalf holders", &body).await?;
        Ok(edges(holders, self.right(), |holder| {
            (holder, mailbox.to_owned())
        }))
    }

    async fn mailboxes_held_by(&self, principal: &str) -> AppResult<Vec<MailboxPermissionEdge>> {
        let body = format!(
            "$recipient = Get-Recipient -Identity {}\n\
             Get-Mailbox -ResultSize Unlimited \
             -Filter \"GrantSendOnBehalfTo -eq '$($recipient.DistinguishedName)'\" | \
             ForEach-Object {{ 'success : ' + $_.PrimarySmtpAddress }}",
            ps_quote(principal)
        );
        let mailboxes = self
            .session
            .list("list send on behalf mailboxes", &body)
            .await?;
        Ok(edges(mailboxes, self.right(), |mailbox| {
            (principal.to_owned(), mailbox)
        }))
    }

    async fn grant(&self, edge: &MailboxPermissionEdge) -> AppResult<()> {
        let body = format!(
            "Set-Mailbox -Identity {} -GrantSendOnBehalfTo @{{Add={}}} -Confirm:$false",
            ps_quote(edge.mailbox_identity.as_str()),
            ps_quote(edge.subject_principal.as_str())
        );
        self.session.run("grant send on behalf", &body).await.map(|_| ())
    }

    async fn revoke(&self, edge: &MailboxPermissionEdge) -> AppResult<()> {
        let body = format!(
            "Set-Mailbox -Identity {} -GrantSendOnBehalfTo @{{Remove={}}} -Confirm:$false",
            ps_quote(edge.mailbox_identity.as_str()),
            ps_quote(edge.subject_principal.as_str())
        );
        self.session.run("revoke send on behalf", &body).await.map(|_| ())
    }
}

/// Registers one strategy per mailbox right over a shared session.
#[must_use]
pub fn exchange_mailbox_rights(session: Arc<ExchangeSession>) -> MailboxRightRegistry {
    let strategies: Vec<Arc<dyn MailboxRightStrategy>> = vec![
        Arc::new(FullAccessStrategy {
            session: session.clone(),
        }),
        Arc::new(SendAsStrategy {
            session: session.clone(),
        }),
        Arc::new(SendOnBehalfStrategy { session }),
    ];

    MailboxRightRegistry::new(strategies)
}
