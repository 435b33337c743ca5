//! Core types shared across Warden facilities
//!
//! This crate provides foundational types used by the error handling,
//! logging and write paths:
//!
//! - **Correlation types**: RequestId, TraceId, RequestContext
//! - **Cancellation**: CancelToken and deadline-aware context checks
//! - **Schema constants**: Canonical field keys and event names

pub mod correlation;
pub mod schema;

pub use correlation::{CancelToken, ContextState, RequestContext, RequestId, TraceId};
