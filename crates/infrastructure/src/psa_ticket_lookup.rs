use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use deskbot_application::{TicketLookup, TokenBrokerService};
use deskbot_core::{AppError, AppResult};
use deskbot_domain::ApiScope;

use crate::call_error::outcome_error;
use crate::{CallRequest, ResilientCallExecutor};

#[derive(Debug, Deserialize)]
struct TicketCompany {
    identifier: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Ticket {
    company: Option<TicketCompany>,
}

/// Reads the owning company of a ticket from the PSA REST API.
///
/// The PSA registration lives in the home company's tenant, so its token is
/// requested through the broker for `home_company`.
#[derive(Clone)]
pub struct PsaTicketLookup {
    executor: ResilientCallExecutor,
    base_url: String,
    broker: TokenBrokerService,
    home_company: String,
    scope: ApiScope,
}

impl PsaTicketLookup {
    /// Creates a lookup against `base_url`.
    #[must_use]
    pub fn new(
        executor: ResilientCallExecutor,
        base_url: impl Into<String>,
        broker: TokenBrokerService,
        home_company: impl Into<String>,
        scope: ApiScope,
    ) -> Self {
        Self {
            executor,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            broker,
            home_company: home_company.into(),
            scope,
        }
    }
}

#[async_trait]
impl TicketLookup for PsaTicketLookup {
    async fn company_for_ticket(&self, ticket_id: u64) -> AppResult<String> {
        let token = self
            .broker
            .get_token(self.home_company.as_str(), &self.scope)
            .await?;
        let request = CallRequest::get(format!("{}/tickets/{ticket_id}", self.base_url))
            .bearer(token.value());

        let outcome = self.executor.execute(&request).await;
        if !outcome.is_success() {
            if outcome.http_status == Some(401) {
                warn!(ticket_id, "psa rejected token, dropping it from the cache");
                self.broker
                    .invalidate(self.home_company.as_str(), &self.scope)
                    .await;
            }
            return Err(outcome_error(
                format!("read ticket {ticket_id}").as_str(),
                &outcome,
            ));
        }

        let ticket: Ticket = serde_json::from_value(outcome.payload).map_err(|error| {
            AppError::Transport(format!("ticket {ticket_id} has an unexpected shape: {error}"))
        })?;
        let company = ticket
            .company
            .and_then(|company| company.identifier)
            .map(|identifier| identifier.trim().to_owned())
            .filter(|identifier| !identifier.is_empty())
            .ok_or_else(|| {
                AppError::NotFound(format!("ticket {ticket_id} has no company identifier"))
            })?;

        debug!(ticket_id, company = %company, "resolved ticket company");
        Ok(company)
    }
}
