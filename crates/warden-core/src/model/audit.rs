//! Audit trail records
//!
//! Entries are produced by the store's oplog inside the write transaction and
//! are never modified afterwards.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::WardenError;

/// Kind of mutation an entry records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OpType {
    Create,
    Update,
    Delete,
}

impl OpType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpType::Create => "CREATE",
            OpType::Update => "UPDATE",
            OpType::Delete => "DELETE",
        }
    }
}

impl fmt::Display for OpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OpType {
    type Err = WardenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATE" => Ok(OpType::Create),
            "UPDATE" => Ok(OpType::Update),
            "DELETE" => Ok(OpType::Delete),
            other => Err(WardenError::Serialization {
                message: format!("unknown oplog op type: {}", other),
            }),
        }
    }
}

/// One committed mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub seq: i64,
    pub entry_id: String,
    pub op_type: OpType,
    pub resource_kind: String,
    pub table_name: String,
    pub target_id: String,
    pub scope_id: String,
    /// Canonical names of the fields set by an update
    pub field_mask: Vec<String>,
    /// Canonical names of the fields nulled by an update
    pub null_paths: Vec<String>,
    /// Resource version after the mutation; the deleted version for deletes
    pub version: u32,
    pub data: serde_json::Value,
    pub request_id: Option<String>,
    pub create_time: DateTime<Utc>,
    pub prev_digest: String,
    pub digest: String,
}

/// Narrowing options for oplog queries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OplogFilter {
    pub op_type: Option<OpType>,
    pub not_before: Option<DateTime<Utc>>,
}

impl OplogFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_operation(mut self, op: OpType) -> Self {
        self.op_type = Some(op);
        self
    }

    /// Only entries created at or after `at`
    pub fn not_before(mut self, at: DateTime<Utc>) -> Self {
        self.not_before = Some(at);
        self
    }

    /// Only entries created within the last `window`
    pub fn created_within(self, window: std::time::Duration) -> Self {
        let window = Duration::from_std(window).unwrap_or_else(|_| Duration::days(365_000));
        let at = Utc::now()
            .checked_sub_signed(window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.not_before(at)
    }

    pub fn matches(&self, entry: &AuditEntry) -> bool {
        self.op_type.map_or(true, |op| entry.op_type == op)
            && self.not_before.map_or(true, |t| entry.create_time >= t)
    }
}
