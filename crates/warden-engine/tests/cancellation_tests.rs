// Canceled or expired contexts fail the call and leave no partial state.

mod common;

use std::time::{Duration, Instant};

use common::*;
use rusqlite::Connection;
use tempfile::TempDir;
use warden_core::errors::ExErrorKind;
use warden_core::model::{OpType, OplogFilter, Resource, TcpTarget};
use warden_core_types::{CancelToken, RequestContext};
use warden_engine::{UpdateOptions, Writer};
use warden_store::StoreConfig;

#[test]
fn test_canceled_context_fails_create() {
    let w = memory_writer();
    let token = CancelToken::new();
    let request = RequestContext::new().with_cancel_token(token.clone());
    token.cancel();

    let mut t = new_target(SCOPE, "web").with_public_id("ttcp_cancel00001");
    let err = w.create(&request, &mut t).unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::Canceled);
    assert_eq!(err.request_id(), Some(&request.request_id));
    assert_eq!(row_count(&w, "target_tcp", "ttcp_cancel00001"), 0);
    assert!(w
        .oplog(&ctx(), "ttcp_cancel00001", &OplogFilter::new())
        .unwrap()
        .is_empty());
}

#[test]
fn test_expired_deadline_fails_update() {
    let w = memory_writer();
    let t = test_target(&w, SCOPE, "web");

    let expired = RequestContext::new().with_deadline(Instant::now());
    let mut proposed = t.clone();
    proposed.name = "late".to_string();
    let err = w
        .update(&expired, &mut proposed, &["Name"], &[], UpdateOptions::new())
        .unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::Timeout);
    assert!(!err.is_retryable());
    let found: TcpTarget = w.read(&ctx(), t.public_id()).unwrap();
    assert_eq!(found.name, "web");
    assert_eq!(count_ops(&w, t.public_id(), OpType::Update), 0);
}

#[test]
fn test_canceled_context_fails_reads_and_deletes() {
    let w = memory_writer();
    let t = test_target(&w, SCOPE, "web");
    let request = RequestContext::new();
    request.cancel_token().cancel();

    assert_eq!(
        w.read::<TcpTarget>(&request, t.public_id()).unwrap_err().kind(),
        ExErrorKind::Canceled
    );
    assert_eq!(w.delete(&request, &t).unwrap_err().kind(), ExErrorKind::Canceled);
    assert_eq!(row_count(&w, "target_tcp", t.public_id()), 1);
}

/// Writer over a file database plus a second raw connection holding the
/// write lock
fn locked_store(busy: Duration) -> (TempDir, Writer, Connection, TcpTarget) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("warden.db");
    let w = Writer::open(
        StoreConfig::file(&path)
            .with_pool_size(2)
            .with_busy_timeout(busy),
    )
    .unwrap();
    let t = test_target(&w, SCOPE, "web");

    let blocker = Connection::open(&path).unwrap();
    blocker.execute_batch("BEGIN IMMEDIATE").unwrap();
    (dir, w, blocker, t)
}

#[test]
fn test_deadline_bounds_lock_wait() {
    let (_dir, w, blocker, t) = locked_store(Duration::from_secs(30));

    let request = RequestContext::new().with_timeout(Duration::from_millis(150));
    let started = Instant::now();
    let mut proposed = t.clone();
    proposed.name = "blocked".to_string();
    let err = w
        .update(&request, &mut proposed, &["Name"], &[], UpdateOptions::new())
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(matches!(
        err.kind(),
        ExErrorKind::Timeout | ExErrorKind::StoreUnavailable
    ));

    blocker.execute_batch("ROLLBACK").unwrap();
    let found: TcpTarget = w.read(&ctx(), t.public_id()).unwrap();
    assert_eq!(found, t);
    assert_eq!(count_ops(&w, t.public_id(), OpType::Update), 0);
}

#[test]
fn test_lock_contention_is_retryable() {
    let (_dir, w, blocker, t) = locked_store(Duration::from_millis(100));

    let mut proposed = t.clone();
    proposed.description = "contended".to_string();
    let err = w
        .update(&ctx(), &mut proposed, &["Description"], &[], UpdateOptions::new())
        .unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::StoreUnavailable);
    assert!(err.is_retryable());

    blocker.execute_batch("ROLLBACK").unwrap();
    assert_eq!(
        w.update(&ctx(), &mut proposed, &["Description"], &[], UpdateOptions::new())
            .unwrap(),
        1
    );
    assert_eq!(proposed.version(), 2);
}
