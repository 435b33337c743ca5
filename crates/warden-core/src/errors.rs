use thiserror::Error;
use warden_core_types::{RequestContext, RequestId, TraceId};

/// Result type alias using WardenError
pub type Result<T> = std::result::Result<T, WardenError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Every failure the writer can surface is classified into exactly one kind.
/// Each kind maps to a stable code usable for programmatic handling, tests
/// and external API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Request shape (detected before any store call)
    InvalidParameter,
    AmbiguousUpdate,
    EmptyFieldMask,

    // Constraints
    ImmutableFieldViolation,
    DuplicateName,
    AlreadyExists,

    // Lookup
    NotFound,

    // Concurrency / liveness
    /// Caller's expected version differs from the persisted one
    Concurrency,
    Canceled,
    Timeout,

    // Store
    /// Connection, lock or I/O failure; no semantic state was examined
    StoreUnavailable,
    Persistence,
    Serialization,

    // Audit trail
    AppendOnlyViolation,
    TamperDetected,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::InvalidParameter => "ERR_INVALID_PARAMETER",
            ExErrorKind::AmbiguousUpdate => "ERR_AMBIGUOUS_UPDATE",
            ExErrorKind::EmptyFieldMask => "ERR_EMPTY_FIELD_MASK",
            ExErrorKind::ImmutableFieldViolation => "ERR_IMMUTABLE_FIELD",
            ExErrorKind::DuplicateName => "ERR_DUPLICATE_NAME",
            ExErrorKind::AlreadyExists => "ERR_ALREADY_EXISTS",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::Concurrency => "ERR_CONCURRENCY",
            ExErrorKind::Canceled => "ERR_CANCELED",
            ExErrorKind::Timeout => "ERR_TIMEOUT",
            ExErrorKind::StoreUnavailable => "ERR_STORE_UNAVAILABLE",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::AppendOnlyViolation => "ERR_APPEND_ONLY",
            ExErrorKind::TamperDetected => "ERR_TAMPER_DETECTED",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }

    /// Only store unavailability is eligible for caller-level retry with
    /// backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExErrorKind::StoreUnavailable)
    }
}

/// Canonical structured error type
///
/// Carries the classification used by callers plus the context needed to
/// debug a failed write (operation, resource id, offending field, scope).
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    entity_id: Option<String>,
    field: Option<String>,
    scope_id: Option<String>,
    request_id: Option<RequestId>,
    trace_id: Option<TraceId>,
    message: String,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            entity_id: None,
            field: None,
            scope_id: None,
            request_id: None,
            trace_id: None,
            message: String::new(),
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add entity (public id) context
    pub fn with_entity_id(mut self, id: impl Into<String>) -> Self {
        self.entity_id = Some(id.into());
        self
    }

    /// Add the offending field
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Add scope context
    pub fn with_scope_id(mut self, scope_id: impl Into<String>) -> Self {
        self.scope_id = Some(scope_id.into());
        self
    }

    /// Add request ID context
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Add trace ID context
    pub fn with_trace_id(mut self, trace_id: TraceId) -> Self {
        self.trace_id = Some(trace_id);
        self
    }

    /// Copy the correlation ids of a request context
    pub fn with_context(mut self, ctx: &RequestContext) -> Self {
        self.request_id = Some(ctx.request_id.clone());
        self.trace_id = ctx.trace_id.clone();
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Get the operation context, if any
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Get the entity ID context, if any
    pub fn entity_id(&self) -> Option<&str> {
        self.entity_id.as_deref()
    }

    /// Get the offending field, if any
    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    /// Get the scope context, if any
    pub fn scope_id(&self) -> Option<&str> {
        self.scope_id.as_deref()
    }

    /// Get the request ID context, if any
    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    /// Get the trace ID context, if any
    pub fn trace_id(&self) -> Option<&TraceId> {
        self.trace_id.as_ref()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(entity_id) = &self.entity_id {
            write!(f, " (entity_id: {})", entity_id)?;
        }
        if let Some(field) = &self.field {
            write!(f, " (field: {})", field)?;
        }
        if let Some(scope_id) = &self.scope_id {
            write!(f, " (scope_id: {})", scope_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {}

// ========== End Error Facility ==========

/// Domain error taxonomy raised by the pure write-path rules
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WardenError {
    /// Missing or malformed input, named by field
    #[error("invalid parameter {field}: {reason}")]
    InvalidParameter { field: String, reason: String },

    /// A field was named both in the field mask and in the null paths
    #[error("ambiguous update: fields in both field mask and null paths: {fields:?}")]
    AmbiguousUpdate { fields: Vec<String> },

    /// Neither a field mask nor null paths were supplied
    #[error("empty field mask: nothing to update")]
    EmptyFieldMask,

    /// Update attempted to change a field that is fixed after creation
    #[error("immutable field: {field}")]
    ImmutableFieldViolation { field: String },

    /// Another resource in the scope already carries the name
    #[error("duplicate name {name:?} in scope {scope_id}")]
    DuplicateName { scope_id: String, name: String },

    /// No resource with the public id
    #[error("{kind} not found: {public_id}")]
    NotFound { kind: String, public_id: String },

    /// Caller's expected version differs from the persisted one
    #[error("version mismatch: expected {expected}, actual {actual}")]
    VersionMismatch { expected: u32, actual: u32 },

    #[error("serialization error: {message}")]
    Serialization { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl WardenError {
    /// Shorthand for a missing required field
    pub fn missing(field: impl Into<String>, label: &str) -> Self {
        WardenError::InvalidParameter {
            field: field.into(),
            reason: format!("missing {}", label),
        }
    }
}

/// Conversion from WardenError to ExError
impl From<WardenError> for ExError {
    fn from(err: WardenError) -> Self {
        match err {
            WardenError::InvalidParameter { field, reason } => {
                ExError::new(ExErrorKind::InvalidParameter)
                    .with_field(field)
                    .with_message(reason)
            }
            WardenError::AmbiguousUpdate { fields } => ExError::new(ExErrorKind::AmbiguousUpdate)
                .with_field(fields.join(","))
                .with_message("fields named in both field mask and null paths"),
            WardenError::EmptyFieldMask => ExError::new(ExErrorKind::EmptyFieldMask)
                .with_message("field mask and null paths are both empty"),
            WardenError::ImmutableFieldViolation { field } => {
                ExError::new(ExErrorKind::ImmutableFieldViolation)
                    .with_message(format!("immutable column: {}", field))
                    .with_field(field)
            }
            WardenError::DuplicateName { scope_id, name } => {
                ExError::new(ExErrorKind::DuplicateName)
                    .with_message(format!("name {:?} already exists in scope", name))
                    .with_field("name")
                    .with_scope_id(scope_id)
            }
            WardenError::NotFound { kind, public_id } => ExError::new(ExErrorKind::NotFound)
                .with_entity_id(public_id)
                .with_message(format!("{} not found", kind)),
            WardenError::VersionMismatch { expected, actual } => {
                ExError::new(ExErrorKind::Concurrency)
                    .with_field("version")
                    .with_message(format!(
                        "version mismatch: expected {}, actual {}",
                        expected, actual
                    ))
            }
            WardenError::Serialization { message } => {
                ExError::new(ExErrorKind::Serialization).with_message(message)
            }
            WardenError::Internal { message } => {
                ExError::new(ExErrorKind::Internal).with_message(message)
            }
        }
    }
}

/// Conversion from serde_json::Error to WardenError
impl From<serde_json::Error> for WardenError {
    fn from(err: serde_json::Error) -> Self {
        WardenError::Serialization {
            message: err.to_string(),
        }
    }
}
