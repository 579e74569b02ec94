//! Resolver behavior against fake collaborators and a real sled cache.

use crate::integration::test_utils::{FakeOracle, Harness, RecordingNotifier};
use buildhook::error::HookError;
use buildhook::identity::CallerIdentity;
use buildhook::store::{BuildEntry, BuildStore};
use buildhook::types::{MergeStatus, Sha};

#[test]
fn test_fast_forward_is_queued_once() {
    let h = Harness::new(
        FakeOracle::new("M").with_branch("u/a/ff", "X", MergeStatus::FastForward),
        RecordingNotifier::accepting(),
    );

    let first = h.resolver.resolve("u/a/ff", "alice", Some(100)).unwrap().unwrap();
    assert_eq!(first.master_revision, Sha::new("M"));
    assert_eq!(first.target_commit, Sha::new("X"));
    assert_eq!(first.builder, None);
    assert_eq!(first.build_number, None);
    assert_eq!(first.status, None);
    assert_eq!(h.notifier.count(), 1);

    let second = h.resolver.resolve("u/a/ff", "alice", Some(100)).unwrap().unwrap();
    assert_eq!(second, first);
    assert_eq!(h.notifier.count(), 1, "cache hit must not notify again");
}

#[test]
fn test_notification_describes_the_merge() {
    let h = Harness::new(
        FakeOracle::new("M").with_branch("u/a/m", "C", MergeStatus::Merged(Sha::new("MC"))),
        RecordingNotifier::accepting(),
    );

    let record = h.resolver.resolve("u/a/m", "alice", Some(42)).unwrap().unwrap();
    assert_eq!(record.target_commit, Sha::new("C"));

    let changes = h.notifier.submitted();
    assert_eq!(changes.len(), 1);
    let change = &changes[0];
    assert_eq!(change.target_revision, Sha::new("MC"));
    assert_eq!(change.properties.premerge_revision, Sha::new("C"));
    assert_eq!(change.properties.ticket_id, Some(42));
    assert_eq!(change.branch_name, "u/a/m");
    assert_eq!(change.author, "alice");
    assert_eq!(change.comment_text, "From Trac #42 (http://trac.sagemath.org/42)");
    assert_eq!(change.revision_link, "http://git.example.org/commit/MC");
    assert_eq!(change.source_tag, "git");
    assert!(change.changed_files.contains("src/a.rs"));
}

#[test]
fn test_up_to_date_never_notifies() {
    let h = Harness::new(
        FakeOracle::new("M").with_branch("u/a/old", "X", MergeStatus::UpToDate),
        RecordingNotifier::accepting(),
    );

    assert!(h.resolver.resolve("u/a/old", "alice", None).unwrap().is_none());
    assert!(h.resolver.resolve("u/a/old", "alice", None).unwrap().is_none());
    assert_eq!(h.notifier.count(), 0);
    assert!(h.store.records().unwrap().is_empty());
}

#[test]
fn test_failed_merge_never_notifies() {
    let h = Harness::new(
        FakeOracle::new("M").with_branch("u/a/conflict", "X", MergeStatus::FailedMerge),
        RecordingNotifier::accepting(),
    );

    assert!(h.resolver.resolve("u/a/conflict", "alice", None).unwrap().is_none());
    assert!(h.resolver.resolve("u/a/conflict", "alice", None).unwrap().is_none());
    assert_eq!(h.notifier.count(), 0);
}

#[test]
fn test_unknown_branch_is_no_build() {
    let h = Harness::new(FakeOracle::new("M"), RecordingNotifier::accepting());
    assert!(h.resolver.resolve("u/nobody/nothing", "alice", None).unwrap().is_none());
    assert_eq!(h.oracle.merge_calls(), 0);
}

#[test]
fn test_rejected_notification_writes_nothing() {
    let h = Harness::new(
        FakeOracle::new("M").with_branch("u/a/ff", "X", MergeStatus::FastForward),
        RecordingNotifier::rejecting(),
    );

    assert!(h.resolver.resolve("u/a/ff", "alice", None).unwrap().is_none());
    assert_eq!(h.notifier.count(), 1);
    assert!(h.store.get(&Sha::new("X"), &Sha::new("M")).unwrap().is_none());

    // No retry bookkeeping: the next request tries again.
    assert!(h.resolver.resolve("u/a/ff", "alice", None).unwrap().is_none());
    assert_eq!(h.notifier.count(), 2);
}

#[test]
fn test_master_move_forces_re_resolution() {
    let h = Harness::new(
        FakeOracle::new("M1").with_branch("u/a/ff", "X", MergeStatus::FastForward),
        RecordingNotifier::accepting(),
    );
    h.resolver.resolve("u/a/ff", "alice", None).unwrap().unwrap();
    assert_eq!(h.notifier.count(), 1);

    h.oracle.set_master("M2");
    assert!(h.resolver.cached(&Sha::new("X")).unwrap().is_none());

    let record = h.resolver.resolve("u/a/ff", "alice", None).unwrap().unwrap();
    assert_eq!(record.master_revision, Sha::new("M2"));
    assert_eq!(h.notifier.count(), 2);
}

#[test]
fn test_staleness_purges_every_row() {
    let h = Harness::new(FakeOracle::new("M1"), RecordingNotifier::accepting());
    let m1 = Sha::new("M1");
    for commit in ["A", "B", "C"] {
        h.store.put(&Sha::new(commit), &m1, BuildEntry::queued()).unwrap();
    }
    // One row recorded against a different master.
    h.store
        .put(&Sha::new("D"), &Sha::new("M0"), BuildEntry::queued())
        .unwrap();

    assert!(h.resolver.cached(&Sha::new("D")).unwrap().is_none());
    for commit in ["A", "B", "C"] {
        assert!(
            h.resolver.cached(&Sha::new(commit)).unwrap().is_none(),
            "row {} survived the purge",
            commit
        );
    }
    assert!(h.store.records().unwrap().is_empty());
}

#[test]
fn test_cached_rows_always_match_master() {
    let h = Harness::new(
        FakeOracle::new("M1")
            .with_branch("one", "A", MergeStatus::FastForward)
            .with_branch("two", "B", MergeStatus::Merged(Sha::new("MB"))),
        RecordingNotifier::accepting(),
    );
    for master in ["M1", "M2", "M3"] {
        h.oracle.set_master(master);
        for branch in ["one", "two"] {
            let record = h.resolver.resolve(branch, "alice", None).unwrap().unwrap();
            assert_eq!(record.master_revision, Sha::new(master));
        }
        for commit in ["A", "B"] {
            if let Some(record) = h.resolver.cached(&Sha::new(commit)).unwrap() {
                assert_eq!(record.master_revision, Sha::new(master));
            }
        }
    }
}

#[test]
fn test_resolution_gives_up_while_master_keeps_moving() {
    let h = Harness::new(
        FakeOracle::new("M0").with_branch("u/a/ff", "X", MergeStatus::FastForward),
        RecordingNotifier::accepting(),
    );
    let oracle = h.oracle.clone();
    let moves = std::sync::atomic::AtomicUsize::new(0);
    h.notifier.set_on_submit(move || {
        let n = moves.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
        oracle.set_master(&format!("M{}", n));
    });

    assert!(h.resolver.resolve("u/a/ff", "alice", None).unwrap().is_none());
    assert_eq!(h.notifier.count(), 3);
}

#[test]
fn test_status_updates_follow_build_lifecycle() {
    let h = Harness::new(
        FakeOracle::new("M").with_branch("u/a/ff", "X", MergeStatus::FastForward),
        RecordingNotifier::accepting(),
    );
    let git = CallerIdentity::new("git");
    let x = Sha::new("X");

    h.resolver.resolve("u/a/ff", "alice", None).unwrap().unwrap();
    h.resolver.set_status(&git, &x, "linux", 12, -1).unwrap();
    let record = h.resolver.resolve("u/a/ff", "alice", None).unwrap().unwrap();
    assert_eq!(record.state().unwrap().label(), "In progress");

    h.resolver.set_status(&git, &x, "linux", 12, 0).unwrap();
    let record = h.resolver.resolve("u/a/ff", "alice", None).unwrap().unwrap();
    assert_eq!(record.builder.as_deref(), Some("linux"));
    assert_eq!(record.build_number, Some(12));
    assert_eq!(record.state().unwrap().label(), "Success");
    assert_eq!(h.notifier.count(), 1);
}

#[test]
fn test_untrusted_status_writer_is_rejected() {
    let h = Harness::new(
        FakeOracle::new("M").with_branch("u/a/ff", "X", MergeStatus::FastForward),
        RecordingNotifier::accepting(),
    );
    let before = h.resolver.resolve("u/a/ff", "alice", None).unwrap().unwrap();

    let err = h
        .resolver
        .set_status(&CallerIdentity::new("alice"), &Sha::new("X"), "linux", 1, 2)
        .unwrap_err();
    assert!(matches!(err, HookError::Unauthorized(_)));

    let after = h.resolver.cached(&Sha::new("X")).unwrap().unwrap();
    assert_eq!(after, before);
}

#[test]
fn test_set_status_without_prior_resolution_creates_row() {
    let h = Harness::new(FakeOracle::new("M"), RecordingNotifier::accepting());
    let record = h
        .resolver
        .set_status(&CallerIdentity::new("git"), &Sha::new("Y"), "mac", 3, 4)
        .unwrap();
    assert_eq!(record.master_revision, Sha::new("M"));
    assert_eq!(record.state().unwrap().label(), "Exception");
    assert_eq!(h.notifier.count(), 0);
}

#[test]
fn test_purge_then_resolve_requeues() {
    let h = Harness::new(
        FakeOracle::new("M").with_branch("u/a/ff", "X", MergeStatus::FastForward),
        RecordingNotifier::accepting(),
    );
    h.resolver.resolve("u/a/ff", "alice", None).unwrap().unwrap();
    h.resolver.purge().unwrap();
    assert!(h.store.records().unwrap().is_empty());

    h.resolver.resolve("u/a/ff", "alice", None).unwrap().unwrap();
    assert_eq!(h.notifier.count(), 2);
}
