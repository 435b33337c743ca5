//! Warden Core - resource model and pure write-path rules
//!
//! - the `Resource` trait and the shipped kinds (TCP targets, sessions, groups)
//! - field-mask update planning
//! - creation/update vetting and the immutability check
//! - the error facility and the structured logging facility
//!
//! Nothing in this crate touches the store.

pub mod errors;
pub mod logging_facility;
pub mod mask;
pub mod model;
pub mod rules;

pub use errors::{ExError, ExErrorKind, Result, WardenError};
pub use mask::{plan_update, Assignment, UpdatePlan};
pub use model::{
    AuditEntry, FieldSpec, FieldType, FieldValue, Group, OpType, OplogFilter, RecordMeta,
    Resource, ResourceKind, Session, TcpTarget,
};
pub use rules::WriteOp;
