//! Names shared by the writer's log events and the test capture layer
//!
//! Every boundary event carries `component`, `op` and `event`; the writer
//! adds the resource keys below as they apply.

// Keys present on every boundary event
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";

// Correlation
pub const FIELD_REQUEST_ID: &str = "request_id";
pub const FIELD_TRACE_ID: &str = "trace_id";

// Resource keys
pub const FIELD_PUBLIC_ID: &str = "public_id";
pub const FIELD_RESOURCE_KIND: &str = "resource_kind";
pub const FIELD_TABLE_NAME: &str = "table_name";
pub const FIELD_ROWS_AFFECTED: &str = "rows_affected";
pub const FIELD_VERSION: &str = "version";

// Failure keys (set by `log_op_error!`)
pub const FIELD_ERR_KIND: &str = "err_kind";
pub const FIELD_ERR_CODE: &str = "err_code";

pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";

/// Writer operation names, as logged in `op` and attached to errors
pub mod ops {
    pub const CREATE: &str = "create";
    pub const READ: &str = "read";
    pub const UPDATE: &str = "update";
    pub const DELETE: &str = "delete";
    pub const OPLOG_QUERY: &str = "oplog_query";
    pub const VERIFY_OPLOG: &str = "verify_oplog";
    pub const PROVISION_TABLE: &str = "provision_table";

    pub const ALL: [&str; 7] = [
        CREATE,
        READ,
        UPDATE,
        DELETE,
        OPLOG_QUERY,
        VERIFY_OPLOG,
        PROVISION_TABLE,
    ];
}
