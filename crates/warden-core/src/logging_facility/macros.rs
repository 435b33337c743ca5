//! Boundary logging macros
//!
//! Callers must depend on `warden-core-types` (the macros name its `schema`
//! constants by absolute path) and `tracing`.

/// Log the start of a writer operation
///
/// ```
/// # use warden_core::log_op_start;
/// log_op_start!("create");
/// log_op_start!("create", resource_kind = "tcp_target", table_name = "target_tcp");
/// ```
#[macro_export]
macro_rules! log_op_start {
    ($op:expr) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = warden_core_types::schema::EVENT_START,
        );
    };
    ($op:expr, $($field:tt)*) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = warden_core_types::schema::EVENT_START,
            $($field)*
        );
    };
}

/// Log the successful end of a writer operation
///
/// ```
/// # use warden_core::log_op_end;
/// log_op_end!("update", duration_ms = 3, rows_affected = 1);
/// ```
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, duration_ms = $duration:expr) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = warden_core_types::schema::EVENT_END,
            duration_ms = $duration,
        );
    };
    ($op:expr, duration_ms = $duration:expr, $($field:tt)*) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = warden_core_types::schema::EVENT_END,
            duration_ms = $duration,
            $($field)*
        );
    };
}

/// Log a failed writer operation
///
/// `$err` is anything convertible into `ExError`; pass a reference-free
/// clone when the error is still needed afterwards.
///
/// ```
/// # use warden_core::{log_op_error, errors::WardenError};
/// log_op_error!("update", WardenError::EmptyFieldMask, duration_ms = 0);
/// ```
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $err:expr, duration_ms = $duration:expr) => {{
        let ex_err: $crate::errors::ExError = $err.into();
        tracing::warn!(
            component = module_path!(),
            op = $op,
            event = warden_core_types::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err_kind = ?ex_err.kind(),
            err_code = ex_err.code(),
            error = %ex_err,
        );
    }};
    ($op:expr, $err:expr, duration_ms = $duration:expr, $($field:tt)*) => {{
        let ex_err: $crate::errors::ExError = $err.into();
        tracing::warn!(
            component = module_path!(),
            op = $op,
            event = warden_core_types::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err_kind = ?ex_err.kind(),
            err_code = ex_err.code(),
            error = %ex_err,
            $($field)*
        );
    }};
}
