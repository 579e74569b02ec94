//! NotificationBridge sessions against a scripted local coordinator.

use crate::integration::test_utils::{sample_change, CoordinatorScript, FakeCoordinator};
use buildhook::config::CoordinatorConfig;
use buildhook::notify::{ChangeNotifier, NotificationBridge};
use std::net::TcpListener;
use std::time::{Duration, Instant};

fn bridge(port: u16) -> NotificationBridge {
    let config = CoordinatorConfig {
        host: "127.0.0.1".to_string(),
        port: Some(port),
        username: "hook".to_string(),
        password: "secret".to_string(),
        repository: "repo".to_string(),
        ..CoordinatorConfig::default()
    };
    NotificationBridge::new(&config)
        .unwrap()
        .with_deadline(Duration::from_secs(5))
}

#[test]
fn test_accepted_change_reaches_coordinator() {
    let coordinator = FakeCoordinator::start(CoordinatorScript::Accept);
    assert!(bridge(coordinator.port).submit(&sample_change()));

    let logins = coordinator.logins();
    assert_eq!(logins.len(), 1);
    assert_eq!(logins[0]["op"], "login");
    assert_eq!(logins[0]["username"], "hook");
    assert_eq!(logins[0]["password"], "secret");

    let calls = coordinator.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0]["method"], "addChange");
    let payload = &calls[0]["payload"];
    assert_eq!(payload["who"], "alice");
    assert_eq!(payload["branch"], "u/alice/fix");
    assert_eq!(payload["revision"], "abc123");
    assert_eq!(payload["files"][0], "src/lib.rs");
    assert_eq!(payload["src"], "git");
    assert_eq!(payload["properties"]["trac_ticket"], 7);
    assert_eq!(payload["properties"]["premerge_revision"], "def456");
}

#[test]
fn test_each_submit_opens_its_own_session() {
    let coordinator = FakeCoordinator::start(CoordinatorScript::Accept);
    let bridge = bridge(coordinator.port);
    assert!(bridge.submit(&sample_change()));
    assert!(bridge.submit(&sample_change()));
    assert_eq!(coordinator.logins().len(), 2);
    assert_eq!(coordinator.calls().len(), 2);
}

#[test]
fn test_rejected_change_is_false() {
    let coordinator = FakeCoordinator::start(CoordinatorScript::RejectChange);
    assert!(!bridge(coordinator.port).submit(&sample_change()));
    assert_eq!(coordinator.calls().len(), 1);
}

#[test]
fn test_login_failure_is_false() {
    let coordinator = FakeCoordinator::start(CoordinatorScript::RejectLogin);
    assert!(!bridge(coordinator.port).submit(&sample_change()));
    assert!(coordinator.calls().is_empty());
}

#[test]
fn test_hang_up_mid_session_is_false() {
    let coordinator = FakeCoordinator::start(CoordinatorScript::HangUpAfterLogin);
    assert!(!bridge(coordinator.port).submit(&sample_change()));
}

#[test]
fn test_connect_failure_is_false() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    assert!(!bridge(port).submit(&sample_change()));
}

#[test]
fn test_silent_coordinator_times_out() {
    let coordinator = FakeCoordinator::start(CoordinatorScript::Silent);
    let bridge = bridge(coordinator.port).with_deadline(Duration::from_millis(500));

    let started = Instant::now();
    assert!(!bridge.submit(&sample_change()));
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(400), "returned too early: {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(5), "deadline not enforced: {:?}", elapsed);
}
