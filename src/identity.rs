//! Caller identity and authorization checks.
//!
//! Authentication happens in the host; the hook only sees the resulting name and asks
//! the host's permission policy about ticket access.

use crate::error::HookError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of the unauthenticated caller.
pub const ANONYMOUS: &str = "anonymous";

/// Authenticated name of whoever is calling the hook
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallerIdentity {
    pub name: String,
}

impl CallerIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn anonymous() -> Self {
        Self::new(ANONYMOUS)
    }
}

impl fmt::Display for CallerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Host-provided ticket permission policy
pub trait TicketPermissions: Send + Sync {
    /// Whether `caller` may view ticket `ticket_id`.
    fn can_view(&self, caller: &CallerIdentity, ticket_id: u64) -> bool;

    fn verify_view(&self, caller: &CallerIdentity, ticket_id: u64) -> Result<(), HookError> {
        if !self.can_view(caller, ticket_id) {
            return Err(HookError::Unauthorized(format!(
                "{} cannot view ticket #{}",
                caller, ticket_id
            )));
        }
        Ok(())
    }
}

/// Policy that lets everyone view every ticket
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenTickets;

impl TicketPermissions for OpenTickets {
    fn can_view(&self, _caller: &CallerIdentity, _ticket_id: u64) -> bool {
        true
    }
}

/// The single identity trusted to record build results
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusWriter {
    identity: String,
}

impl StatusWriter {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
        }
    }

    /// Reject every caller except the configured writer.
    pub fn verify(&self, caller: &CallerIdentity) -> Result<(), HookError> {
        if caller.name != self.identity {
            return Err(HookError::Unauthorized(format!(
                "{} cannot record build status; only {} may",
                caller, self.identity
            )));
        }
        Ok(())
    }
}
