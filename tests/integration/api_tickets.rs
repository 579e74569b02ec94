//! Ticket-level API: getBuild, ticket badges and the status callback.

use crate::integration::test_utils::{FakeOracle, Harness, RecordingNotifier};
use buildhook::api::{BuildHookApi, Ticket, TicketSource};
use buildhook::error::HookError;
use buildhook::identity::{CallerIdentity, OpenTickets, TicketPermissions};
use buildhook::types::MergeStatus;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

struct Tickets(HashMap<u64, Ticket>);

impl Tickets {
    fn new(tickets: &[(u64, &str, &str)]) -> Self {
        Self(
            tickets
                .iter()
                .map(|(id, branch, status)| {
                    (
                        *id,
                        Ticket {
                            id: *id,
                            branch: branch.to_string(),
                            status: status.to_string(),
                        },
                    )
                })
                .collect(),
        )
    }
}

impl TicketSource for Tickets {
    fn ticket(&self, id: u64) -> Result<Option<Ticket>, HookError> {
        Ok(self.0.get(&id).cloned())
    }
}

/// Only "staff" may view ticket 3.
struct PrivateThree;

impl TicketPermissions for PrivateThree {
    fn can_view(&self, caller: &CallerIdentity, ticket_id: u64) -> bool {
        ticket_id != 3 || caller.name == "staff"
    }
}

fn api(h: &Harness, permissions: Arc<dyn TicketPermissions>) -> BuildHookApi {
    let tickets = Tickets::new(&[
        (1, "u/a/ff", "needs_review"),
        (2, "u/a/draft", "new"),
        (3, "u/a/ff", "positive_review"),
        (4, "  ", "needs_review"),
    ]);
    BuildHookApi::new(h.resolver.clone(), Arc::new(tickets), permissions, "ci.example.org")
}

fn harness() -> Harness {
    Harness::new(
        FakeOracle::new("M")
            .with_branch("u/a/ff", "X", MergeStatus::FastForward)
            .with_branch("u/a/draft", "D", MergeStatus::FastForward),
        RecordingNotifier::accepting(),
    )
}

#[test]
fn test_get_build_returns_positional_triple() {
    let h = harness();
    let api = api(&h, Arc::new(OpenTickets));
    let alice = CallerIdentity::new("alice");

    let queued = api.get_build(&alice, 1).unwrap();
    assert_eq!(queued, vec![Value::Null, Value::Null, Value::Null]);

    api.set_build(&CallerIdentity::new("git"), "X", "linux", 8, 1).unwrap();
    let done = api.get_build(&alice, 1).unwrap();
    assert_eq!(done, vec![Value::from("linux"), Value::from(8), Value::from(1)]);
}

#[test]
fn test_get_build_without_branch_is_empty() {
    let h = harness();
    let api = api(&h, Arc::new(OpenTickets));
    assert!(api.get_build(&CallerIdentity::anonymous(), 4).unwrap().is_empty());
    assert_eq!(h.notifier.count(), 0);
}

#[test]
fn test_get_build_checks_view_permission() {
    let h = harness();
    let api = api(&h, Arc::new(PrivateThree));

    let err = api.get_build(&CallerIdentity::new("alice"), 3).unwrap_err();
    assert!(matches!(err, HookError::Unauthorized(_)));
    assert_eq!(h.notifier.count(), 0);

    assert_eq!(api.get_build(&CallerIdentity::new("staff"), 3).unwrap().len(), 3);
}

#[test]
fn test_get_build_unknown_ticket() {
    let h = harness();
    let api = api(&h, Arc::new(OpenTickets));
    assert!(matches!(
        api.get_build(&CallerIdentity::new("alice"), 99),
        Err(HookError::TicketNotFound(99))
    ));
}

#[test]
fn test_ticket_view_skips_drafts() {
    let h = harness();
    let api = api(&h, Arc::new(OpenTickets));
    let alice = CallerIdentity::new("alice");
    let draft = Ticket {
        id: 2,
        branch: "u/a/draft".to_string(),
        status: "new".to_string(),
    };
    assert!(api.ticket_view(&alice, &draft).unwrap().is_none());
    assert_eq!(h.notifier.count(), 0);

    let reviewed = Ticket {
        id: 1,
        branch: "u/a/ff".to_string(),
        status: "needs_review".to_string(),
    };
    let view = api.ticket_view(&alice, &reviewed).unwrap().unwrap();
    assert_eq!(view.label, "Queued");
    assert_eq!(view.url, None);

    api.set_build(&CallerIdentity::new("git"), "X", "linux", 8, 2).unwrap();
    let view = api.ticket_view(&alice, &reviewed).unwrap().unwrap();
    assert_eq!(view.label, "Failure");
    assert_eq!(view.review_class.as_deref(), Some("needs_work"));
    assert_eq!(
        view.url.as_deref(),
        Some("http://ci.example.org/builders/linux/builds/8")
    );
}

#[test]
fn test_set_build_requires_status_writer() {
    let h = harness();
    let api = api(&h, Arc::new(OpenTickets));
    let err = api
        .set_build(&CallerIdentity::new("alice"), "X", "linux", 8, 0)
        .unwrap_err();
    assert!(matches!(err, HookError::Unauthorized(_)));
    assert!(h.store.records().unwrap().is_empty());
}
