pub mod audit;
pub mod field;
pub mod group;
pub mod resource;
pub mod session;
pub mod target;

pub use audit::{AuditEntry, OpType, OplogFilter};
pub use field::{lookup_field, same_value, FieldSpec, FieldType, FieldValue};
pub use group::Group;
pub use resource::{next_update_time, now_millis, RecordMeta, Resource, ResourceKind};
pub use session::Session;
pub use target::TcpTarget;
