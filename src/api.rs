//! Build Hook API
//!
//! The remote-procedure surface the host exposes on top of the resolver: ticket-level
//! build lookup (`getBuild(ticket)`), the coordinator's status callback
//! (`setBuild(sha, builder, number, status)`), and the status view shown on ticket
//! pages.

use crate::error::HookError;
use crate::identity::{CallerIdentity, TicketPermissions};
use crate::resolver::BuildStatusResolver;
use crate::types::{BuildRecord, Sha};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Ticket states in which a branch is worth building on page views.
pub const REVIEWABLE_STATUSES: [&str; 2] = ["needs_review", "positive_review"];

/// The ticket fields the hook reads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: u64,
    /// Branch name as typed by the ticket author; may be blank
    pub branch: String,
    pub status: String,
}

impl Ticket {
    pub fn is_reviewable(&self) -> bool {
        REVIEWABLE_STATUSES.contains(&self.status.as_str())
    }
}

/// Host-provided ticket storage
pub trait TicketSource: Send + Sync {
    fn ticket(&self, id: u64) -> Result<Option<Ticket>, HookError>;
}

/// What a ticket page shows for a build
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildView {
    /// `Queued`, `In progress`, or the outcome name
    pub label: String,
    /// Review class for colouring; absent while queued
    pub review_class: Option<String>,
    /// Link to the build on the coordinator's web page
    pub url: Option<String>,
}

/// Build hook service
pub struct BuildHookApi {
    resolver: Arc<BuildStatusResolver>,
    tickets: Arc<dyn TicketSource>,
    permissions: Arc<dyn TicketPermissions>,
    coordinator_web_host: String,
}

impl BuildHookApi {
    pub fn new(
        resolver: Arc<BuildStatusResolver>,
        tickets: Arc<dyn TicketSource>,
        permissions: Arc<dyn TicketPermissions>,
        coordinator_web_host: impl Into<String>,
    ) -> Self {
        Self {
            resolver,
            tickets,
            permissions,
            coordinator_web_host: coordinator_web_host.into(),
        }
    }

    /// `getBuild(ticket)`: `[]` when there is no build, else `[builder, number, status]`.
    pub fn get_build(&self, caller: &CallerIdentity, ticket_id: u64) -> Result<Vec<Value>, HookError> {
        self.permissions.verify_view(caller, ticket_id)?;
        let ticket = self
            .tickets
            .ticket(ticket_id)?
            .ok_or(HookError::TicketNotFound(ticket_id))?;
        let record = self.ticket_build(caller, &ticket, false)?;
        Ok(record.map(|r| rpc_triple(&r)).unwrap_or_default())
    }

    /// Build for a ticket's branch.
    ///
    /// With `reviewable_only`, tickets outside [`REVIEWABLE_STATUSES`] are skipped; page
    /// views and ticket validation use this so drafts never trigger builds.
    pub fn ticket_build(
        &self,
        caller: &CallerIdentity,
        ticket: &Ticket,
        reviewable_only: bool,
    ) -> Result<Option<BuildRecord>, HookError> {
        if reviewable_only && !ticket.is_reviewable() {
            debug!(ticket = ticket.id, status = %ticket.status, "Ticket not under review");
            return Ok(None);
        }
        if ticket.branch.trim().is_empty() {
            return Ok(None);
        }
        self.resolver
            .resolve(&ticket.branch, &caller.name, Some(ticket.id))
    }

    /// `setBuild(sha, builder, number, status)`: coordinator reporting a result.
    pub fn set_build(
        &self,
        caller: &CallerIdentity,
        sha: &str,
        builder: &str,
        build_number: i64,
        status: i32,
    ) -> Result<(), HookError> {
        self.resolver
            .set_status(caller, &Sha::new(sha), builder, build_number, status)?;
        Ok(())
    }

    /// Status badge for a ticket page, `None` when the ticket has no build.
    pub fn ticket_view(
        &self,
        caller: &CallerIdentity,
        ticket: &Ticket,
    ) -> Result<Option<BuildView>, HookError> {
        Ok(self
            .ticket_build(caller, ticket, true)?
            .map(|record| build_view(&record, &self.coordinator_web_host)))
    }
}

/// Positional `[builder, number, status]` list as returned over RPC.
pub fn rpc_triple(record: &BuildRecord) -> Vec<Value> {
    vec![
        record.builder.clone().map(Value::from).unwrap_or(Value::Null),
        record.build_number.map(Value::from).unwrap_or(Value::Null),
        record.status.map(Value::from).unwrap_or(Value::Null),
    ]
}

/// Render the page badge for a record.
pub fn build_view(record: &BuildRecord, coordinator_web_host: &str) -> BuildView {
    match record.state() {
        Some(state) => BuildView {
            label: state.label().to_string(),
            review_class: state.review_class().map(str::to_string),
            url: record
                .status
                .and_then(|_| record.build_url(coordinator_web_host)),
        },
        None => BuildView {
            label: format!("Unknown status {}", record.status.unwrap_or_default()),
            review_class: None,
            url: record.build_url(coordinator_web_host),
        },
    }
}
