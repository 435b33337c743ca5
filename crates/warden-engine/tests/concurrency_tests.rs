// Concurrent writers sharing one Writer through an Arc.

mod common;

use std::sync::Arc;
use std::thread;

use common::*;
use warden_core::errors::ExErrorKind;
use warden_core::model::{OpType, Resource, TcpTarget};
use warden_engine::UpdateOptions;

const THREADS: usize = 4;
const UPDATES_PER_THREAD: usize = 5;

#[test]
fn test_concurrent_updates_all_commit() {
    let (_dir, w) = file_writer(THREADS);
    let w = Arc::new(w);
    let t = test_target(&w, SCOPE, "web");

    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let w = Arc::clone(&w);
            let mut mine = t.clone();
            thread::spawn(move || {
                for n in 0..UPDATES_PER_THREAD {
                    mine.description = format!("thread {} update {}", i, n);
                    let rows = w
                        .update(&ctx(), &mut mine, &["Description"], &[], UpdateOptions::new())
                        .unwrap();
                    assert_eq!(rows, 1);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let found: TcpTarget = w.read(&ctx(), t.public_id()).unwrap();
    let total = THREADS * UPDATES_PER_THREAD;
    assert_eq!(found.version() as usize, 1 + total);
    assert_eq!(found.name, "web");
    assert_eq!(count_ops(&w, t.public_id(), OpType::Update), total);
    assert_eq!(w.verify_oplog(&ctx()).unwrap() as usize, 1 + total);
}

#[test]
fn test_concurrent_creates_with_same_name() {
    let (_dir, w) = file_writer(THREADS);
    let w = Arc::new(w);

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let w = Arc::clone(&w);
            thread::spawn(move || {
                let mut t = new_target(SCOPE, "contested");
                w.create(&ctx(), &mut t).map(|_| ()).map_err(|e| e.kind())
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let won = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(won, 1);
    for r in results.iter().filter_map(|r| r.as_ref().err()) {
        assert_eq!(*r, ExErrorKind::DuplicateName);
    }
}

#[test]
fn test_stale_version_loses_under_contention() {
    let (_dir, w) = file_writer(2);
    let t = test_target(&w, SCOPE, "web");

    let mut first = t.clone();
    first.description = "first".to_string();
    let mut second = t.clone();
    second.description = "second".to_string();
    let opts = UpdateOptions::new().with_expected_version(t.version());

    assert_eq!(
        w.update(&ctx(), &mut first, &["Description"], &[], opts).unwrap(),
        1
    );
    let err = w
        .update(&ctx(), &mut second, &["Description"], &[], opts)
        .unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::Concurrency);
}
