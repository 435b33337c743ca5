// Shared fixtures for writer integration tests
#![allow(dead_code)]

use tempfile::TempDir;
use warden_core::model::{OpType, OplogFilter, Session, TcpTarget};
use warden_core_types::RequestContext;
use warden_engine::Writer;
use warden_store::StoreConfig;

pub const SCOPE: &str = "p_1234567890";
pub const OTHER_SCOPE: &str = "p_0987654321";

/// Writer over a private in-memory database
pub fn memory_writer() -> Writer {
    Writer::open(StoreConfig::in_memory()).unwrap()
}

/// Writer over a WAL database file; keep the `TempDir` alive for the test
pub fn file_writer(pool_size: usize) -> (TempDir, Writer) {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig::file(dir.path().join("warden.db")).with_pool_size(pool_size);
    let writer = Writer::open(config).unwrap();
    (dir, writer)
}

pub fn ctx() -> RequestContext {
    RequestContext::new()
}

pub fn new_target(scope: &str, name: &str) -> TcpTarget {
    TcpTarget::new(scope, name)
        .unwrap()
        .with_description(format!("{} description", name))
        .with_default_port(22)
}

/// Create and return a persisted target
pub fn test_target(writer: &Writer, scope: &str, name: &str) -> TcpTarget {
    let mut t = new_target(scope, name);
    assert_eq!(writer.create(&ctx(), &mut t).unwrap(), 1);
    t
}

pub fn new_session(scope: &str) -> Session {
    Session::new(
        "u_1234567890",
        "h_1234567890",
        "worker-1",
        "worker",
        "ttcp_1234567890",
        "hs_1234567890",
        "at_1234567890",
        scope,
        "127.0.0.1",
        "22",
    )
    .unwrap()
}

/// Number of oplog entries of `op` recorded for `target_id`
pub fn count_ops(writer: &Writer, target_id: &str, op: OpType) -> usize {
    writer
        .oplog(&ctx(), target_id, &OplogFilter::new().with_operation(op))
        .unwrap()
        .len()
}

/// Rows in `table` with the public id
pub fn row_count(writer: &Writer, table: &str, public_id: &str) -> i64 {
    let conn = writer.pool().get(&ctx()).unwrap();
    conn.query_row(
        &format!("SELECT COUNT(*) FROM {} WHERE public_id = ?1", table),
        [public_id],
        |r| r.get(0),
    )
    .unwrap()
}
