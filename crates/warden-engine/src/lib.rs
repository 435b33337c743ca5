//! Warden Engine - the mutation writer
//!
//! This crate ties the pure rules of `warden-core` to the store:
//! - `writer`: create/read/update/delete with an oplog entry per mutation
//! - `enforcer`: immutability and name uniqueness inside the transaction
//! - `scoped`: calls qualified by an acting scope
//!
//! The engine owns lifecycle logging for every operation it exposes.

pub mod enforcer;
pub mod options;
pub mod scoped;
pub mod writer;

pub use options::UpdateOptions;
pub use scoped::ScopedWriter;
pub use writer::Writer;
