//! Warden Store - SQLite persistence for resources and the oplog
//!
//! Provides:
//! - store configuration and a fixed-size connection pool
//! - embedded, checksummed schema migrations
//! - a generic row repository driven by each kind's field catalogue
//! - the append-only, hash-chained audit trail

pub mod config;
pub mod db;
pub mod errors;
pub mod migrations;
pub mod oplog;
pub mod repo;

pub use config::{DbLocation, StoreConfig};
pub use db::{Pool, PooledConnection};
pub use errors::Result;
pub use repo::ResourceRepo;
