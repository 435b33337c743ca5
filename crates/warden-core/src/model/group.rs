use serde::{Deserialize, Serialize};

use super::field::{FieldSpec, FieldValue};
use super::resource::{type_mismatch, RecordMeta, Resource, ResourceKind};
use crate::errors::{Result, WardenError};

static GROUP_FIELDS: [FieldSpec; 3] = [
    FieldSpec::text("ScopeId", "scope_id", "scope id")
        .required()
        .immutable(),
    FieldSpec::text("Name", "name", "name"),
    FieldSpec::text("Description", "description", "description"),
];

/// An IAM group. The name is optional, but unique within its scope when set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub scope_id: String,
    pub name: String,
    pub description: String,
    #[serde(skip)]
    table_name: Option<String>,
}

impl Group {
    /// # Errors
    ///
    /// `InvalidParameter` when `scope_id` is empty.
    pub fn new(scope_id: impl Into<String>) -> Result<Self> {
        let scope_id = scope_id.into();
        if scope_id.is_empty() {
            return Err(WardenError::missing("ScopeId", "scope id"));
        }
        Ok(Self {
            scope_id,
            ..Self::empty()
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

impl Resource for Group {
    const KIND: ResourceKind = ResourceKind::Group;

    fn empty() -> Self {
        Self {
            meta: RecordMeta::default(),
            scope_id: String::new(),
            name: String::new(),
            description: String::new(),
            table_name: None,
        }
    }

    fn fields() -> &'static [FieldSpec] {
        &GROUP_FIELDS
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
        let value = match column {
            "scope_id" => &self.scope_id,
            "name" => &self.name,
            "description" => &self.description,
            _ => return None,
        };
        Some(FieldValue::Text(value.clone()))
    }

    fn set_field(&mut self, column: &str, value: FieldValue) -> Result<()> {
        match (column, value) {
            ("scope_id", FieldValue::Text(v)) => self.scope_id = v,
            ("name", FieldValue::Text(v)) => self.name = v,
            ("description", FieldValue::Text(v)) => self.description = v,
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
