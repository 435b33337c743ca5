//! Repository layer: resource rows in and out of SQLite

pub mod hydration;
pub mod resource_repo;

pub use resource_repo::{create_table_sql, ResourceRepo};
