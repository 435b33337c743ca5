//! Migration framework
//!
//! Embedded SQL migrations applied in order, each recorded in
//! `schema_version` with the SHA-256 of its body. Re-running is a no-op; a
//! recorded migration whose body has since changed is rejected.

mod checksums;
mod embedded;
mod runner;

pub use checksums::compute_checksum;
pub use embedded::{get_migrations, Migration};
pub use runner::{apply_migration_set, apply_migrations};
