//! End-to-end processing of one helpdesk request.
//!
//! The runner resolves the ticket's company, obtains tokens from the broker,
//! resolves the subject and targets, applies the operation and hands the
//! report to the [`ResultReporter`]. A report is produced for every run,
//! whatever fails along the way.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use deskbot_core::{AppError, AppResult};
use deskbot_domain::{
    ApiScope, BotOperation, DirectoryEntity, EntityCategory, GroupMembership, MailboxRight,
};

use crate::{
    BotRequest, DirectoryGateway, DirectoryResolverService, MailboxPermissionService,
    MembershipService, Resolution, ResultReporter, RunContext, RunReport, SessionFactory,
    TicketLookup, TokenBrokerService, desired_mailbox_edges,
};

/// Application service running bot requests.
#[derive(Clone)]
pub struct BotRunner {
    broker: TokenBrokerService,
    tickets: Arc<dyn TicketLookup>,
    sessions: Arc<dyn SessionFactory>,
    reporter: Arc<dyn ResultReporter>,
    directory_scope: ApiScope,
    mailbox_scope: ApiScope,
    deadline: Option<Duration>,
}

impl BotRunner {
    /// Creates a runner using the default directory and mailbox registrations.
    #[must_use]
    pub fn new(
        broker: TokenBrokerService,
        tickets: Arc<dyn TicketLookup>,
        sessions: Arc<dyn SessionFactory>,
        reporter: Arc<dyn ResultReporter>,
    ) -> Self {
        Self {
            broker,
            tickets,
            sessions,
            reporter,
            directory_scope: ApiScope::graph(),
            mailbox_scope: ApiScope::exchange(),
            deadline: None,
        }
    }

    /// Stops processing items once `deadline` has elapsed since the run started.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Runs `request` and publishes its report.
    pub async fn run(&self, request: BotRequest) -> RunReport {
        info!(
            ticket_id = request.ticket_id,
            operation = request.operation.as_str(),
            subject = %request.subject,
            targets = request.targets.len(),
            "starting bot run"
        );

        let mut context = RunContext::new(request);
        let outcome = match self.deadline {
            Some(deadline) => tokio::time::timeout(deadline, self.process(&mut context))
                .await
                .unwrap_or_else(|_| {
                    Err(AppError::Timeout(format!(
                        "run deadline of {}s exceeded",
                        deadline.as_secs()
                    )))
                }),
            None => self.process(&mut context).await,
        };

        if let Err(error) = outcome {
            warn!(ticket_id = context.request().ticket_id, error = %error, "bot run stopped");
            context.record_error(error);
        }

        let report = context.finish();
        if let Err(error) = self.reporter.report(&report).await {
            warn!(ticket_id = report.ticket_id, error = %error, "failed to publish run report");
        }

        info!(
            ticket_id = report.ticket_id,
            status = ?report.status,
            added = report.items.added.len(),
            removed = report.items.removed.len(),
            skipped = report.items.skipped.len(),
            failed = report.items.failed.len(),
            "finished bot run"
        );

        report
    }

    async fn process(&self, context: &mut RunContext) -> AppResult<()> {
        let request = context.request().clone();
        if request.operation.requires_targets() && request.targets.is_empty() {
            return Err(AppError::Validation(format!(
                "operation '{}' requires at least one target",
                request.operation.as_str()
            )));
        }

        let company = self.tickets.company_for_ticket(request.ticket_id).await?;
        context.set_company(company.as_str());

        let directory_token = self
            .broker
            .get_token(company.as_str(), &self.directory_scope)
            .await?;
        let gateway = self.sessions.directory(directory_token);
        let resolver = DirectoryResolverService::new(gateway.clone());
        let subject = resolver
            .resolve_entity(request.subject.as_str(), EntityCategory::User)
            .await?
            .into_entity()?;

        match request.operation {
            BotOperation::AddToGroups => {
                let membership = MembershipService::new(gateway.clone());
                for group in resolve_groups(&resolver, context, &request).await {
                    let item = membership.add_edge(&subject, &group, request.role).await;
                    context.record(item);
                }
            }
            BotOperation::RemoveFromGroups => {
                let membership = MembershipService::new(gateway.clone());
                for group in resolve_groups(&resolver, context, &request).await {
                    let item = membership.remove_edge(&subject, &group, request.role).await;
                    context.record(item);
                }
            }
            BotOperation::ReconcileGroups => {
                let desired = resolve_groups(&resolver, context, &request)
                    .await
                    .into_iter()
                    .map(|group| GroupMembership {
                        group,
                        role: request.role,
                    })
                    .collect();
                let current = current_memberships(gateway.as_ref(), &subject, &request).await?;
                let membership = MembershipService::new(gateway.clone());
                context.merge(membership.reconcile(&subject, desired, current).await);
            }
            BotOperation::RemoveFromAllGroups => {
                let membership = MembershipService::new(gateway.clone());
                context.merge(membership.remove_all_edges(&subject).await?);
            }
            BotOperation::GrantMailboxPermissions => {
                let right = required_right(&request)?;
                let mailboxes = self.mailbox_service(company.as_str()).await?;
                let principal = subject.principal_name.as_str();
                for edge in desired_mailbox_edges(principal, &request.targets, right) {
                    context.record(mailboxes.grant(&edge).await);
                }
            }
            BotOperation::RevokeMailboxPermissions => {
                let right = required_right(&request)?;
                let mailboxes = self.mailbox_service(company.as_str()).await?;
                let principal = subject.principal_name.as_str();
                for edge in desired_mailbox_edges(principal, &request.targets, right) {
                    context.record(mailboxes.revoke(&edge).await);
                }
            }
            BotOperation::RevokeAllMailboxPermissions => {
                let mailboxes = self.mailbox_service(company.as_str()).await?;
                context.merge(mailboxes.revoke_all(subject.principal_name.as_str()).await);
            }
        }

        Ok(())
    }

    async fn mailbox_service(&self, company: &str) -> AppResult<MailboxPermissionService> {
        let token = self.broker.get_token(company, &self.mailbox_scope).await?;
        let tenant_domain = self.broker.company_domain(company).await?;
        let registry = self.sessions.mailbox_rights(token, tenant_domain.as_str());

        Ok(MailboxPermissionService::new(Arc::new(registry)))
    }
}

async fn resolve_groups(
    resolver: &DirectoryResolverService,
    context: &mut RunContext,
    request: &BotRequest,
) -> Vec<DirectoryEntity> {
    let mut groups = Vec::new();
    for (identifier, resolution) in resolver
        .resolve_many(&request.targets, EntityCategory::Group)
        .await
    {
        match resolution {
            Ok(Resolution::Resolved(group)) => groups.push(group),
            Ok(Resolution::Ambiguous(ambiguous)) => {
                context.record_unresolved(&identifier, request.role.as_str(), ambiguous.describe());
            }
            Ok(Resolution::NotFound { .. }) => {
                context.record_unresolved(
                    &identifier,
                    request.role.as_str(),
                    format!("no group matches '{identifier}'"),
                );
            }
            Err(error) => {
                context.record_unresolved(&identifier, request.role.as_str(), error.to_string());
            }
        }
    }

    groups
}

async fn current_memberships(
    gateway: &dyn DirectoryGateway,
    subject: &DirectoryEntity,
    request: &BotRequest,
) -> AppResult<Vec<GroupMembership>> {
    Ok(gateway
        .list_memberships(&subject.id)
        .await?
        .into_iter()
        .filter(|membership| membership.role == request.role)
        .collect())
}

fn required_right(request: &BotRequest) -> AppResult<MailboxRight> {
    request.mailbox_right.ok_or_else(|| {
        AppError::Validation(format!(
            "operation '{}' requires a mailbox right",
            request.operation.as_str()
        ))
    })
}
