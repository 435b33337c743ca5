//! Structured logging facility for the warden writer
//!
//! - one initialization point, `init(profile)`
//! - boundary macros (`log_op_start!`, `log_op_end!`, `log_op_error!`) keyed
//!   by the canonical names in `warden_core_types::schema`
//! - an in-memory capture layer for test assertions
//!
//! Only the engine's writer emits boundary events. Store and core code log at
//! `debug` with plain `tracing::debug!`.
//!
//! ```rust
//! use warden_core::logging_facility::{init, Profile};
//!
//! init(Profile::Development);
//! ```

pub mod init;
pub mod macros;
pub mod test_capture;

pub use init::{init, Profile};
pub use test_capture::{init_test_capture, CapturedEvent, TestCapture};
