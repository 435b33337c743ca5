//! Database connection management
//!
//! Opens and configures SQLite connections and keeps a fixed-size pool of
//! them. Migrations run once, on the first connection, when the pool opens.

#![allow(clippy::result_large_err)]

use rusqlite::Connection;
use std::ops::{Deref, DerefMut};
use std::path::Path;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use warden_core_types::RequestContext;

use crate::config::{DbLocation, StoreConfig};
use crate::errors::{context_error, from_rusqlite, pool_exhausted, Result};
use crate::migrations::apply_migrations;

/// How often a blocked checkout re-checks the caller's cancellation token
const CHECKOUT_POLL: Duration = Duration::from_millis(25);

/// Open a SQLite database at the given path
pub fn open<P: AsRef<Path>>(path: P) -> Result<Connection> {
    Connection::open(path).map_err(from_rusqlite)
}

/// Open a private in-memory database
pub fn open_in_memory() -> Result<Connection> {
    Connection::open_in_memory().map_err(from_rusqlite)
}

/// Apply connection settings: foreign keys, busy timeout and, when enabled,
/// the WAL journal.
pub fn configure(conn: &Connection, config: &StoreConfig) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")
        .map_err(from_rusqlite)?;
    conn.busy_timeout(config.busy_timeout())
        .map_err(from_rusqlite)?;
    if config.use_wal() {
        let mode: String = conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .map_err(from_rusqlite)?;
        tracing::debug!(journal_mode = %mode, "journal mode set");
    }
    Ok(())
}

fn connect(config: &StoreConfig) -> Result<Connection> {
    let conn = match &config.location {
        DbLocation::File(path) => open(path)?,
        DbLocation::Memory => open_in_memory()?,
    };
    configure(&conn, config)?;
    Ok(conn)
}

/// Fixed-size pool of configured connections
///
/// Checkout blocks until a connection is free, the configured checkout
/// timeout elapses, or the caller's context is done.
pub struct Pool {
    idle: Mutex<Vec<Connection>>,
    available: Condvar,
    config: StoreConfig,
}

impl Pool {
    /// Open `config.effective_pool_size()` connections and migrate the
    /// database.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let size = config.effective_pool_size();
        let mut first = connect(&config)?;
        apply_migrations(&mut first)?;

        let mut idle = Vec::with_capacity(size);
        idle.push(first);
        for _ in 1..size {
            idle.push(connect(&config)?);
        }

        tracing::debug!(pool_size = size, location = ?config.location, "connection pool opened");
        Ok(Self {
            idle: Mutex::new(idle),
            available: Condvar::new(),
            config,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Check out a connection on behalf of `ctx`.
    ///
    /// The connection's busy timeout is capped by the context's remaining
    /// time, so lock waits inside the store never outlive the caller's
    /// deadline.
    pub fn get(&self, ctx: &RequestContext) -> Result<PooledConnection<'_>> {
        let started = Instant::now();
        let mut give_up = started + self.config.checkout_timeout();
        if let Some(deadline) = ctx.deadline() {
            give_up = give_up.min(deadline);
        }

        let mut idle = self.lock_idle();
        let conn = loop {
            if let Some(err) = context_error(ctx) {
                return Err(err);
            }
            if let Some(conn) = idle.pop() {
                break conn;
            }
            let now = Instant::now();
            if now >= give_up {
                return Err(pool_exhausted(started.elapsed().as_millis()));
            }
            let wait = (give_up - now).min(CHECKOUT_POLL);
            idle = match self.available.wait_timeout(idle, wait) {
                Ok((guard, _)) => guard,
                Err(poisoned) => {
                    tracing::warn!("connection pool lock poisoned; recovering");
                    poisoned.into_inner().0
                }
            };
        };
        drop(idle);

        let pooled = PooledConnection {
            pool: self,
            conn: Some(conn),
        };
        let busy = match ctx.remaining() {
            Some(left) => left.min(self.config.busy_timeout()),
            None => self.config.busy_timeout(),
        };
        pooled.busy_timeout(busy).map_err(from_rusqlite)?;
        Ok(pooled)
    }

    /// Number of connections currently checked in
    pub fn idle_count(&self) -> usize {
        self.lock_idle().len()
    }

    /// The idle list is only pushed and popped, so a holder that panicked
    /// cannot leave it half-updated; keep using it.
    fn lock_idle(&self) -> MutexGuard<'_, Vec<Connection>> {
        self.idle.lock().unwrap_or_else(|poisoned: PoisonError<_>| {
            tracing::warn!("connection pool lock poisoned; recovering");
            poisoned.into_inner()
        })
    }

    fn put_back(&self, conn: Connection) {
        self.lock_idle().push(conn);
        self.available.notify_one();
    }
}

/// A checked-out connection, returned to the pool on drop
pub struct PooledConnection<'a> {
    pool: &'a Pool,
    conn: Option<Connection>,
}

impl Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        // Only `Drop` takes the connection out.
        self.conn.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl DerefMut for PooledConnection<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().unwrap_or_else(|| unreachable!())
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.put_back(conn);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use warden_core::errors::ExErrorKind;

    #[test]
    fn test_pool_opens_migrated_memory_db() {
        let pool = Pool::open(StoreConfig::in_memory()).unwrap();
        let conn = pool.get(&RequestContext::new()).unwrap();
        let n: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'oplog_entry'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(n, 1);
    }

    #[test]
    fn test_checkout_times_out_when_exhausted() {
        let cfg = StoreConfig::in_memory().with_checkout_timeout(Duration::from_millis(50));
        let pool = Pool::open(cfg).unwrap();
        let _held = pool.get(&RequestContext::new()).unwrap();

        let err = pool.get(&RequestContext::new()).err().unwrap();
        assert_eq!(err.kind(), ExErrorKind::StoreUnavailable);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_checkout_respects_canceled_context() {
        let pool = Pool::open(StoreConfig::in_memory()).unwrap();
        let ctx = RequestContext::new();
        ctx.cancel_token().cancel();
        let err = pool.get(&ctx).err().unwrap();
        assert_eq!(err.kind(), ExErrorKind::Canceled);
    }

    #[test]
    fn test_blocked_checkout_observes_deadline() {
        let pool = Pool::open(StoreConfig::in_memory()).unwrap();
        let _held = pool.get(&RequestContext::new()).unwrap();

        let ctx = RequestContext::new().with_timeout(Duration::from_millis(40));
        let err = pool.get(&ctx).err().unwrap();
        assert!(matches!(
            err.kind(),
            ExErrorKind::Timeout | ExErrorKind::StoreUnavailable
        ));
    }

    #[test]
    fn test_connection_returns_to_pool_on_drop() {
        let pool = Arc::new(Pool::open(StoreConfig::in_memory()).unwrap());
        {
            let _c = pool.get(&RequestContext::new()).unwrap();
        }
        let waiter = {
            let pool = Arc::clone(&pool);
            std::thread::spawn(move || pool.get(&RequestContext::new()).map(|_| ()))
        };
        assert!(waiter.join().unwrap().is_ok());
    }

    #[test]
    fn test_poisoned_lock_keeps_connections() {
        let pool = Arc::new(Pool::open(StoreConfig::in_memory()).unwrap());
        let conn = pool.get(&RequestContext::new()).unwrap();
        assert_eq!(pool.idle_count(), 0);

        let poisoner = {
            let pool = Arc::clone(&pool);
            std::thread::spawn(move || {
                let _guard = pool.idle.lock().unwrap();
                panic!("holder panicked");
            })
        };
        assert!(poisoner.join().is_err());
        assert!(pool.idle.is_poisoned());

        drop(conn);
        assert_eq!(pool.idle_count(), 1);
        assert!(pool.get(&RequestContext::new()).is_ok());
    }

    #[test]
    fn test_file_pool_shares_schema() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::file(dir.path().join("w.db")).with_pool_size(3);
        let pool = Pool::open(config).unwrap();
        let ctx = RequestContext::new();
        let a = pool.get(&ctx).unwrap();
        let b = pool.get(&ctx).unwrap();
        for conn in [&a, &b] {
            let n: i64 = conn
                .query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))
                .unwrap();
            assert!(n >= 2);
        }
    }
}
