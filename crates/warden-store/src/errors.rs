//! Error handling for warden-store
//!
//! Store operations return `ExError`. rusqlite failures are classified so the
//! writer can tell retryable unavailability from constraint and data errors.

use rusqlite::ffi;
use rusqlite::ErrorCode;
use warden_core::errors::{ExError, ExErrorKind};
use warden_core_types::{ContextState, RequestContext};

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

/// Message the oplog triggers abort with
pub(crate) const APPEND_ONLY_MESSAGE: &str = "oplog is append-only";

/// Classify a rusqlite error
pub fn from_rusqlite(err: rusqlite::Error) -> ExError {
    let kind = classify(&err);
    ExError::new(kind)
        .with_op("sqlite")
        .with_message(err.to_string())
}

fn classify(err: &rusqlite::Error) -> ExErrorKind {
    let rusqlite::Error::SqliteFailure(failure, message) = err else {
        return ExErrorKind::Persistence;
    };
    match failure.code {
        ErrorCode::DatabaseBusy
        | ErrorCode::DatabaseLocked
        | ErrorCode::CannotOpen
        | ErrorCode::SystemIoFailure
        | ErrorCode::DiskFull
        | ErrorCode::FileLockingProtocolFailed => ExErrorKind::StoreUnavailable,
        ErrorCode::OperationInterrupted => ExErrorKind::Canceled,
        ErrorCode::ConstraintViolation => match failure.extended_code {
            ffi::SQLITE_CONSTRAINT_PRIMARYKEY => ExErrorKind::AlreadyExists,
            ffi::SQLITE_CONSTRAINT_UNIQUE => ExErrorKind::DuplicateName,
            ffi::SQLITE_CONSTRAINT_TRIGGER
                if message
                    .as_deref()
                    .is_some_and(|m| m.contains(APPEND_ONLY_MESSAGE)) =>
            {
                ExErrorKind::AppendOnlyViolation
            }
            _ => ExErrorKind::Persistence,
        },
        _ => ExErrorKind::Persistence,
    }
}

/// Create a migration error
pub fn migration_error(migration_id: &str, reason: &str) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("migration")
        .with_message(format!("Migration {} failed: {}", migration_id, reason))
}

/// A migration body differs from the one recorded when it was applied
pub fn checksum_mismatch(migration_id: &str, expected: &str, actual: &str) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("migration_checksum")
        .with_message(format!(
            "Checksum mismatch for migration {}: expected {}, got {}",
            migration_id, expected, actual
        ))
}

/// No pooled connection became free in time
pub fn pool_exhausted(waited_ms: u128) -> ExError {
    ExError::new(ExErrorKind::StoreUnavailable)
        .with_op("pool_checkout")
        .with_message(format!("no connection available after {} ms", waited_ms))
}

/// Error for a request context that is no longer active, `None` otherwise
pub fn context_error(ctx: &RequestContext) -> Option<ExError> {
    let kind = match ctx.state() {
        ContextState::Active => return None,
        ContextState::Canceled => ExErrorKind::Canceled,
        ContextState::DeadlineExceeded => ExErrorKind::Timeout,
    };
    let message = match kind {
        ExErrorKind::Canceled => "request canceled",
        _ => "request deadline exceeded",
    };
    Some(ExError::new(kind).with_context(ctx).with_message(message))
}

/// Recomputed oplog digest does not match the stored one
pub fn tamper_detected(seq: i64) -> ExError {
    ExError::new(ExErrorKind::TamperDetected)
        .with_op("verify_oplog")
        .with_entity_id(seq.to_string())
        .with_message(format!("oplog entry {} does not match its digest", seq))
}

/// A stored value could not be decoded
pub fn corrupt_row(what: &str, detail: impl std::fmt::Display) -> ExError {
    ExError::new(ExErrorKind::Serialization)
        .with_op("decode_row")
        .with_message(format!("invalid {}: {}", what, detail))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn failure(code: std::os::raw::c_int, message: Option<&str>) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(ffi::Error::new(code), message.map(String::from))
    }

    #[test]
    fn test_busy_and_locked_are_unavailable() {
        for code in [ffi::SQLITE_BUSY, ffi::SQLITE_LOCKED, ffi::SQLITE_CANTOPEN, ffi::SQLITE_FULL] {
            let err = from_rusqlite(failure(code, None));
            assert_eq!(err.kind(), ExErrorKind::StoreUnavailable, "code {}", code);
            assert!(err.is_retryable());
        }
    }

    #[test]
    fn test_constraint_classification() {
        assert_eq!(
            from_rusqlite(failure(ffi::SQLITE_CONSTRAINT_PRIMARYKEY, None)).kind(),
            ExErrorKind::AlreadyExists
        );
        assert_eq!(
            from_rusqlite(failure(ffi::SQLITE_CONSTRAINT_UNIQUE, None)).kind(),
            ExErrorKind::DuplicateName
        );
        assert_eq!(
            from_rusqlite(failure(
                ffi::SQLITE_CONSTRAINT_TRIGGER,
                Some("oplog is append-only")
            ))
            .kind(),
            ExErrorKind::AppendOnlyViolation
        );
        assert_eq!(
            from_rusqlite(failure(ffi::SQLITE_CONSTRAINT_TRIGGER, Some("boom"))).kind(),
            ExErrorKind::Persistence
        );
        assert_eq!(
            from_rusqlite(failure(ffi::SQLITE_CONSTRAINT_NOTNULL, None)).kind(),
            ExErrorKind::Persistence
        );
    }

    #[test]
    fn test_interrupt_is_canceled() {
        let err = from_rusqlite(failure(ffi::SQLITE_INTERRUPT, None));
        assert_eq!(err.kind(), ExErrorKind::Canceled);
    }

    #[test]
    fn test_other_errors_are_persistence() {
        let err = from_rusqlite(rusqlite::Error::QueryReturnedNoRows);
        assert_eq!(err.kind(), ExErrorKind::Persistence);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_context_error_states() {
        let ctx = RequestContext::new();
        assert!(context_error(&ctx).is_none());

        ctx.cancel_token().cancel();
        assert_eq!(context_error(&ctx).unwrap().kind(), ExErrorKind::Canceled);

        let expired =
            RequestContext::new().with_deadline(Instant::now() - Duration::from_millis(5));
        let err = context_error(&expired).unwrap();
        assert_eq!(err.kind(), ExErrorKind::Timeout);
        assert_eq!(err.request_id(), Some(&expired.request_id));
    }
}
