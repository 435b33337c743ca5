//! Field catalogue entries and typed field values
//!
//! Every resource kind publishes a static list of [`FieldSpec`]s. The planner,
//! the validation rules and the row repository walk that list instead of
//! reflecting over struct fields.

use std::fmt;

/// Storage type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    U32,
}

/// One updatable field of a resource kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Name used in field masks and null paths (`ScopeId`)
    pub name: &'static str,
    /// Column in the resource table (`scope_id`)
    pub column: &'static str,
    /// Human-readable label used in error messages (`scope id`)
    pub label: &'static str,
    pub ty: FieldType,
    /// Must be non-empty at creation and can never be set empty or null
    pub required: bool,
    /// Cannot change after creation
    pub immutable: bool,
}

impl FieldSpec {
    pub const fn text(name: &'static str, column: &'static str, label: &'static str) -> Self {
        Self {
            name,
            column,
            label,
            ty: FieldType::Text,
            required: false,
            immutable: false,
        }
    }

    pub const fn u32(name: &'static str, column: &'static str, label: &'static str) -> Self {
        Self {
            ty: FieldType::U32,
            ..Self::text(name, column, label)
        }
    }

    pub const fn required(self) -> Self {
        Self {
            required: true,
            ..self
        }
    }

    pub const fn immutable(self) -> Self {
        Self {
            immutable: true,
            ..self
        }
    }

    /// Whether a caller-supplied path names this field.
    ///
    /// Paths match the mask name or the column, ASCII case-insensitively.
    pub fn matches(&self, path: &str) -> bool {
        path.eq_ignore_ascii_case(self.name) || path.eq_ignore_ascii_case(self.column)
    }
}

/// Find the field a path refers to
pub fn lookup_field<'a>(fields: &'a [FieldSpec], path: &str) -> Option<&'a FieldSpec> {
    fields.iter().find(|f| f.matches(path))
}

/// A typed field value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    U32(u32),
}

impl FieldValue {
    /// The zero value of a field type: empty string or `0`
    pub fn zero(ty: FieldType) -> Self {
        match ty {
            FieldType::Text => FieldValue::Text(String::new()),
            FieldType::U32 => FieldValue::U32(0),
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            FieldValue::Text(s) => s.is_empty(),
            FieldValue::U32(n) => *n == 0,
        }
    }

    pub fn field_type(&self) -> FieldType {
        match self {
            FieldValue::Text(_) => FieldType::Text,
            FieldValue::U32(_) => FieldType::U32,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::U32(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => write!(f, "{:?}", s),
            FieldValue::U32(n) => write!(f, "{}", n),
        }
    }
}

/// Compare two possibly-null values, treating null and the zero value as the
/// same value.
pub fn same_value(a: Option<&FieldValue>, b: Option<&FieldValue>) -> bool {
    match (a, b) {
        (Some(x), Some(y)) => x == y || (x.is_zero() && y.is_zero()),
        (Some(v), None) | (None, Some(v)) => v.is_zero(),
        (None, None) => true,
    }
}
