use serde::{Deserialize, Serialize};

use super::field::{FieldSpec, FieldValue};
use super::resource::{type_mismatch, RecordMeta, Resource, ResourceKind};
use crate::errors::Result;
use crate::rules::validation::validate_required;

// Order matters: creation validation reports the first missing field.
static SESSION_FIELDS: [FieldSpec; 10] = [
    FieldSpec::text("UserId", "user_id", "user id")
        .required()
        .immutable(),
    FieldSpec::text("HostId", "host_id", "host id")
        .required()
        .immutable(),
    FieldSpec::text("ServerId", "server_id", "server id").required(),
    FieldSpec::text("ServerType", "server_type", "server type").required(),
    FieldSpec::text("TargetId", "target_id", "target id")
        .required()
        .immutable(),
    FieldSpec::text("SetId", "set_id", "host set id")
        .required()
        .immutable(),
    FieldSpec::text("AuthTokenId", "auth_token_id", "auth token id")
        .required()
        .immutable(),
    FieldSpec::text("ScopeId", "scope_id", "scope id")
        .required()
        .immutable(),
    FieldSpec::text("Address", "address", "address").required(),
    FieldSpec::text("Port", "port", "port").required(),
];

/// A user's connection to a target through a worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub user_id: String,
    pub host_id: String,
    pub server_id: String,
    pub server_type: String,
    pub target_id: String,
    pub set_id: String,
    pub auth_token_id: String,
    pub scope_id: String,
    pub address: String,
    pub port: String,
    #[serde(skip)]
    table_name: Option<String>,
}

impl Session {
    /// New, unpersisted session. Every field is required.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` naming the first empty field.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: impl Into<String>,
        host_id: impl Into<String>,
        server_id: impl Into<String>,
        server_type: impl Into<String>,
        target_id: impl Into<String>,
        host_set_id: impl Into<String>,
        auth_token_id: impl Into<String>,
        scope_id: impl Into<String>,
        address: impl Into<String>,
        port: impl Into<String>,
    ) -> Result<Self> {
        let s = Self {
            user_id: user_id.into(),
            host_id: host_id.into(),
            server_id: server_id.into(),
            server_type: server_type.into(),
            target_id: target_id.into(),
            set_id: host_set_id.into(),
            auth_token_id: auth_token_id.into(),
            scope_id: scope_id.into(),
            address: address.into(),
            port: port.into(),
            ..Self::empty()
        };
        validate_required(&s)?;
        Ok(s)
    }

    fn column_mut(&mut self, column: &str) -> Option<&mut String> {
        Some(match column {
            "user_id" => &mut self.user_id,
            "host_id" => &mut self.host_id,
            "server_id" => &mut self.server_id,
            "server_type" => &mut self.server_type,
            "target_id" => &mut self.target_id,
            "set_id" => &mut self.set_id,
            "auth_token_id" => &mut self.auth_token_id,
            "scope_id" => &mut self.scope_id,
            "address" => &mut self.address,
            "port" => &mut self.port,
            _ => return None,
        })
    }
}

impl Resource for Session {
    const KIND: ResourceKind = ResourceKind::Session;

    fn empty() -> Self {
        Self {
            meta: RecordMeta::default(),
            user_id: String::new(),
            host_id: String::new(),
            server_id: String::new(),
            server_type: String::new(),
            target_id: String::new(),
            set_id: String::new(),
            auth_token_id: String::new(),
            scope_id: String::new(),
            address: String::new(),
            port: String::new(),
            table_name: None,
        }
    }

    fn fields() -> &'static [FieldSpec] {
        &SESSION_FIELDS
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

    fn field(&self, column: &str) -> Option<FieldValue> {
        let value = match column {
            "user_id" => &self.user_id,
            "host_id" => &self.host_id,
            "server_id" => &self.server_id,
            "server_type" => &self.server_type,
            "target_id" => &self.target_id,
            "set_id" => &self.set_id,
            "auth_token_id" => &self.auth_token_id,
            "scope_id" => &self.scope_id,
            "address" => &self.address,
            "port" => &self.port,
            _ => return None,
        };
        Some(FieldValue::Text(value.clone()))
    }

    fn set_field(&mut self, column: &str, value: FieldValue) -> Result<()> {
        match value {
            FieldValue::Text(v) => match self.column_mut(column) {
                Some(slot) => {
                    *slot = v;
                    Ok(())
                }
                None => Err(type_mismatch(Self::KIND, column, &FieldValue::Text(v))),
            },
            other => Err(type_mismatch(Self::KIND, column, &other)),
        }
    }

    fn table_override(&self) -> Option<&str> {
        self.table_name.as_deref()
    }

    fn set_table_override(&mut self, table: Option<String>) {
        self.table_name = table;
    }
}
