use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::field::{lookup_field, FieldSpec, FieldValue};
use crate::errors::{Result, WardenError};
use crate::rules::validation::{vet_for_write, WriteOp};

/// The resource kinds the writer knows how to persist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    TcpTarget,
    Session,
    Group,
}

impl ResourceKind {
    /// Stable identifier recorded in the oplog
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::TcpTarget => "tcp_target",
            ResourceKind::Session => "session",
            ResourceKind::Group => "group",
        }
    }

    /// Prefix of generated public ids
    pub fn id_prefix(&self) -> &'static str {
        match self {
            ResourceKind::TcpTarget => "ttcp",
            ResourceKind::Session => "s",
            ResourceKind::Group => "g",
        }
    }

    pub fn default_table(&self) -> &'static str {
        match self {
            ResourceKind::TcpTarget => "target_tcp",
            ResourceKind::Session => "session",
            ResourceKind::Group => "iam_group",
        }
    }

    /// Label used in error messages
    pub fn label(&self) -> &'static str {
        match self {
            ResourceKind::TcpTarget => "tcp target",
            ResourceKind::Session => "session",
            ResourceKind::Group => "group",
        }
    }

    /// Generate a fresh public id: `<prefix>_<32 hex chars>`
    pub fn new_public_id(&self) -> String {
        format!("{}_{}", self.id_prefix(), Uuid::now_v7().simple())
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server-managed record state shared by every kind
///
/// Timestamps are `None` until the record has been persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMeta {
    pub public_id: String,
    pub create_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
    pub version: u32,
}

/// A versioned domain record the writer can persist
///
/// Kinds implement the field catalogue and typed field access; everything the
/// planner, the enforcer and the repository need is derived from those.
pub trait Resource: Clone + fmt::Debug + PartialEq + Serialize + Send + Sync + 'static {
    const KIND: ResourceKind;

    /// An instance with every field at its zero value
    fn empty() -> Self;

    /// Updatable fields in column order
    fn fields() -> &'static [FieldSpec];

    fn meta(&self) -> &RecordMeta;

    fn meta_mut(&mut self) -> &mut RecordMeta;

    fn scope_id(&self) -> &str;

    /// Current value of the field stored in `column`
    fn field(&self, column: &str) -> Option<FieldValue>;

    /// # Errors
    ///
    /// `Internal` when the column is unknown or the value has the wrong type.
    fn set_field(&mut self, column: &str, value: FieldValue) -> Result<()>;

    fn table_override(&self) -> Option<&str>;

    fn set_table_override(&mut self, table: Option<String>);

    /// Name subject to `(scope_id, name)` uniqueness; `None` when empty or
    /// when the kind has no name.
    fn name(&self) -> Option<&str> {
        None
    }

    fn public_id(&self) -> &str {
        &self.meta().public_id
    }

    fn version(&self) -> u32 {
        self.meta().version
    }

    fn create_time(&self) -> Option<DateTime<Utc>> {
        self.meta().create_time
    }

    fn update_time(&self) -> Option<DateTime<Utc>> {
        self.meta().update_time
    }

    /// The override when set and non-empty, else the kind's default table
    fn table_name(&self) -> &str {
        match self.table_override() {
            Some(t) if !t.is_empty() => t,
            _ => Self::KIND.default_table(),
        }
    }

    /// An empty name resets to the kind's default table
    fn set_table_name(&mut self, table: &str) {
        if table.is_empty() {
            self.set_table_override(None);
        } else {
            self.set_table_override(Some(table.to_string()));
        }
    }

    /// # Errors
    ///
    /// `InvalidParameter` naming the first offending field.
    fn validate(&self, op: WriteOp<'_>) -> Result<()> {
        vet_for_write(self, op)
    }

    fn field_spec(path: &str) -> Option<&'static FieldSpec> {
        lookup_field(Self::fields(), path)
    }

    /// Reset a field to its zero value
    fn clear_field(&mut self, column: &str) -> Result<()> {
        let spec = Self::field_spec(column).ok_or_else(|| unknown_column(Self::KIND, column))?;
        self.set_field(spec.column, FieldValue::zero(spec.ty))
    }

    /// JSON snapshot recorded in the oplog
    fn snapshot(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

pub(crate) fn unknown_column(kind: ResourceKind, column: &str) -> WardenError {
    WardenError::Internal {
        message: format!("{} has no column {}", kind.label(), column),
    }
}

pub(crate) fn type_mismatch(kind: ResourceKind, column: &str, value: &FieldValue) -> WardenError {
    WardenError::Internal {
        message: format!(
            "{} column {} cannot hold {:?} value",
            kind.label(),
            column,
            value.field_type()
        ),
    }
}

/// Current time truncated to the millisecond precision the store keeps
pub fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    Utc.timestamp_millis_opt(now.timestamp_millis())
        .single()
        .unwrap_or(now)
}

/// Next `update_time`: now, but strictly after `previous`
pub fn next_update_time(previous: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = now_millis();
    match previous {
        Some(prev) if now <= prev => prev + Duration::milliseconds(1),
        _ => now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_public_id_format() {
        let id = ResourceKind::TcpTarget.new_public_id();
        let (prefix, rest) = id.split_once('_').unwrap();
        assert_eq!(prefix, "ttcp");
        assert_eq!(rest.len(), 32);
        assert!(rest.chars().all(|c| c.is_ascii_hexdigit()));

        assert!(ResourceKind::Session.new_public_id().starts_with("s_"));
        assert!(ResourceKind::Group.new_public_id().starts_with("g_"));
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = ResourceKind::Group.new_public_id();
        let b = ResourceKind::Group.new_public_id();
        assert_ne!(a, b);
    }

    #[test]
    fn test_now_millis_has_no_sub_millisecond_part() {
        let t = now_millis();
        assert_eq!(t.timestamp_subsec_nanos() % 1_000_000, 0);
    }

    #[test]
    fn test_next_update_time_strictly_increases() {
        let future = now_millis() + Duration::seconds(10);
        assert_eq!(
            next_update_time(Some(future)),
            future + Duration::milliseconds(1)
        );

        let past = now_millis() - Duration::seconds(10);
        assert!(next_update_time(Some(past)) > past);
        assert!(next_update_time(None) <= now_millis());
    }

    #[test]
    fn test_kind_defaults() {
        assert_eq!(ResourceKind::TcpTarget.default_table(), "target_tcp");
        assert_eq!(ResourceKind::Session.default_table(), "session");
        assert_eq!(ResourceKind::Group.default_table(), "iam_group");
        assert_eq!(ResourceKind::TcpTarget.to_string(), "tcp_target");
    }
}
