use serde::{Deserialize, Serialize};

use super::field::{FieldSpec, FieldValue};
use super::resource::{type_mismatch, RecordMeta, Resource, ResourceKind};
use crate::errors::{Result, WardenError};

static TCP_TARGET_FIELDS: [FieldSpec; 4] = [
    FieldSpec::text("ScopeId", "scope_id", "scope id")
        .required()
        .immutable(),
    FieldSpec::text("Name", "name", "name").required(),
    FieldSpec::text("Description", "description", "description"),
    FieldSpec::u32("DefaultPort", "default_port", "default port"),
];

/// A TCP target: a named, scoped endpoint sessions connect to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TcpTarget {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub scope_id: String,
    pub name: String,
    pub description: String,
    pub default_port: u32,
    #[serde(skip)]
    table_name: Option<String>,
}

impl TcpTarget {
    /// New, unpersisted target in `scope_id`.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` when `scope_id` is empty.
    pub fn new(scope_id: impl Into<String>, name: impl Into<String>) -> Result<Self> {
        let scope_id = scope_id.into();
        if scope_id.is_empty() {
            return Err(WardenError::missing("ScopeId", "scope id"));
        }
        Ok(Self {
            scope_id,
            name: name.into(),
            ..Self::empty()
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_default_port(mut self, port: u32) -> Self {
        self.default_port = port;
        self
    }

    /// Pre-assign the public id instead of letting the writer generate one
    pub fn with_public_id(mut self, public_id: impl Into<String>) -> Self {
        self.meta.public_id = public_id.into();
        self
    }
}

impl Resource for TcpTarget {
    const KIND: ResourceKind = ResourceKind::TcpTarget;

    fn empty() -> Self {
        Self {
            meta: RecordMeta::default(),
            scope_id: String::new(),
            name: String::new(),
            description: String::new(),
            default_port: 0,
            table_name: None,
        }
    }

    fn fields() -> &'static [FieldSpec] {
        &TCP_TARGET_FIELDS
    }

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn scope_id(&self) -> &str {
        &self.scope_id
    }

    fn name(&self) -> Option<&str> {
        Some(self.name.as_str()).filter(|n| !n.is_empty())
    }

    fn field(&self, column: &str) -> Option<FieldValue> {
        match column {
            "scope_id" => Some(FieldValue::Text(self.scope_id.clone())),
            "name" => Some(FieldValue::Text(self.name.clone())),
            "description" => Some(FieldValue::Text(self.description.clone())),
            "default_port" => Some(FieldValue::U32(self.default_port)),
            _ => None,
        }
    }

    fn set_field(&mut self, column: &str, value: FieldValue) -> Result<()> {
        match (column, value) {
            ("scope_id", FieldValue::Text(v)) => self.scope_id = v,
            ("name", FieldValue::Text(v)) => self.name = v,
            ("description", FieldValue::Text(v)) => self.description = v,
            ("default_port", FieldValue::U32(v)) => self.default_port = v,
            (column, value) => return Err(type_mismatch(Self::KIND, column, &value)),
        }
        Ok(())
    }

    fn table_override(&self) -> Option<&str> {
        self.table_name.as_deref()
    }

    fn set_table_override(&mut self, table: Option<String>) {
        self.table_name = table;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::WardenError;

    #[test]
    fn test_new_requires_scope() {
        let err = TcpTarget::new("", "web").unwrap_err();
        assert!(matches!(
            err,
            WardenError::InvalidParameter { ref field, .. } if field == "ScopeId"
        ));
    }

    #[test]
    fn test_new_with_options() {
        let t = TcpTarget::new("o_1", "web")
            .unwrap()
            .with_description("frontend")
            .with_default_port(22);
        assert_eq!(t.scope_id, "o_1");
        assert_eq!(t.name(), Some("web"));
        assert_eq!(t.description, "frontend");
        assert_eq!(t.default_port, 22);
        assert!(t.public_id().is_empty());
        assert_eq!(t.version(), 0);
        assert!(t.create_time().is_none());
    }

    #[test]
    fn test_empty_name_is_not_a_unique_key() {
        let t = TcpTarget::new("o_1", "").unwrap();
        assert_eq!(t.name(), None);
    }

    #[test]
    fn test_table_name_override_and_reset() {
        let mut t = TcpTarget::new("o_1", "web").unwrap();
        assert_eq!(t.table_name(), "target_tcp");
        t.set_table_name("target_tcp_staging");
        assert_eq!(t.table_name(), "target_tcp_staging");
        t.set_table_name("");
        assert_eq!(t.table_name(), "target_tcp");
    }

    #[test]
    fn test_clone_is_independent() {
        let original = TcpTarget::new("o_1", "web").unwrap().with_default_port(22);
        let mut copy = original.clone();
        assert_eq!(copy, original);

        copy.name = "db".to_string();
        copy.set_field("default_port", FieldValue::U32(5432)).unwrap();
        assert_eq!(original.name, "web");
        assert_eq!(original.default_port, 22);
        assert_ne!(copy, original);
    }

    #[test]
    fn test_field_access_round_trip() {
        let mut t = TcpTarget::empty();
        t.set_field("name", FieldValue::Text("web".into())).unwrap();
        t.set_field("default_port", FieldValue::U32(80)).unwrap();
        assert_eq!(t.field("name"), Some(FieldValue::Text("web".into())));
        assert_eq!(t.field("default_port"), Some(FieldValue::U32(80)));
        assert_eq!(t.field("address"), None);

        t.clear_field("DefaultPort").unwrap();
        assert_eq!(t.default_port, 0);
    }

    #[test]
    fn test_set_field_rejects_wrong_type() {
        let mut t = TcpTarget::empty();
        let err = t
            .set_field("default_port", FieldValue::Text("22".into()))
            .unwrap_err();
        assert!(matches!(err, WardenError::Internal { .. }));
        assert!(t.set_field("nope", FieldValue::U32(1)).is_err());
    }

    #[test]
    fn test_snapshot_skips_table_override() {
        let mut t = TcpTarget::new("o_1", "web").unwrap();
        t.set_table_name("other");
        let snap = t.snapshot().unwrap();
        assert_eq!(snap["name"], "web");
        assert_eq!(snap["scope_id"], "o_1");
        assert!(snap.get("table_name").is_none());
        assert!(snap.get("public_id").is_some());
    }
}
