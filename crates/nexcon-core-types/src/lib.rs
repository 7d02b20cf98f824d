//! Shared vocabulary for the nexcon facilities
//!
//! - **Correlation**: `RequestId` / `RequestContext` threaded through command application
//! - **Schema constants**: canonical structured-logging field keys and event names

pub mod correlation;
pub mod schema;

pub use correlation::{RequestContext, RequestId};
