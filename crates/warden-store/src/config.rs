//! Store configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Where the database lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DbLocation {
    File(PathBuf),
    /// Private in-memory database; only reachable through a single connection
    Memory,
}

/// Connection pool and SQLite settings
///
/// Deserializes from partial documents; missing keys take the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub location: DbLocation,
    pub pool_size: usize,
    pub busy_timeout_ms: u64,
    pub checkout_timeout_ms: u64,
    /// WAL journal for file databases; ignored in memory
    pub wal: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            location: DbLocation::Memory,
            pool_size: 4,
            busy_timeout_ms: 5_000,
            checkout_timeout_ms: 5_000,
            wal: true,
        }
    }
}

impl StoreConfig {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            location: DbLocation::File(path.into()),
            ..Self::default()
        }
    }

    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout_ms = duration_ms(timeout);
        self
    }

    pub fn with_checkout_timeout(mut self, timeout: Duration) -> Self {
        self.checkout_timeout_ms = duration_ms(timeout);
        self
    }

    /// Every in-memory connection would be a separate database, so memory
    /// stores always get exactly one connection.
    pub fn effective_pool_size(&self) -> usize {
        match self.location {
            DbLocation::Memory => 1,
            DbLocation::File(_) => self.pool_size.max(1),
        }
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn checkout_timeout(&self) -> Duration {
        Duration::from_millis(self.checkout_timeout_ms)
    }

    pub fn use_wal(&self) -> bool {
        self.wal && matches!(self.location, DbLocation::File(_))
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
