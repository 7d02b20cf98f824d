use serde::Serialize;

/// Scoped change notification emitted after each store mutation
///
/// Paths are absolute and reflect the document at the moment the event was
/// emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChangeEvent {
    NodeAdded { path: String },
    NodeRemoved { path: String },
    NodeRenamed { from: String, to: String },
    /// A dataset under `path` named `name` was created or overwritten
    FieldChanged { path: String, name: String },
    AttributeChanged { path: String, name: String },
}

impl ChangeEvent {
    /// Path most relevant to a view refresh
    pub fn path(&self) -> &str {
        match self {
            ChangeEvent::NodeAdded { path }
            | ChangeEvent::NodeRemoved { path }
            | ChangeEvent::FieldChanged { path, .. }
            | ChangeEvent::AttributeChanged { path, .. } => path,
            ChangeEvent::NodeRenamed { to, .. } => to,
        }
    }
}
