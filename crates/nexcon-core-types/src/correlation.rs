//! Correlation identifiers for user-triggered operations
//!
//! One user action (a dialog confirmation, a CLI invocation) maps to one
//! `RequestId`; every log event and error raised while applying it can carry it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier for a single user action
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(String);

impl RequestId {
    /// Generate a fresh, time-ordered id (UUIDv7)
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wrap an id received from elsewhere (e.g. a UI event)
    pub fn from_string(s: String) -> Self {
        Self(s)
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Context carried from the action handler into the core
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub request_id: RequestId,
    /// Free-form origin label ("cli", "add-component-dialog", ...)
    pub origin: Option<String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }
}
