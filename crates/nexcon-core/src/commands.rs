//! Command inventory for user-driven mutations
//!
//! Every action a front end can take on an instrument document is a
//! [`Command`]; [`crate::apply::apply`] executes it atomically. Entities are
//! addressed by absolute path so commands can be built from UI or CLI input.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::Vector3;
use crate::store::{ChangeEvent, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    /// Create a component routed by its class
    CreateComponent {
        name: String,
        nx_class: String,
        #[serde(default)]
        description: String,
    },

    /// Delete a component and its subtree
    RemoveComponent { component: String },

    /// Rename a component (spaces become underscores)
    RenameComponent { component: String, name: String },

    SetDescription {
        component: String,
        description: String,
    },

    /// Add a translation; `vector` carries both direction and distance
    AddTranslation {
        component: String,
        vector: Vector3,
        #[serde(default)]
        units: Option<String>,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        depends_on: Option<String>,
    },

    AddRotation {
        component: String,
        axis: Vector3,
        angle: f64,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        depends_on: Option<String>,
    },

    /// Remove a transform owned by `component`
    RemoveTransformation {
        component: String,
        transform: String,
    },

    RenameTransform { transform: String, name: String },

    /// Re-point a component; `None` for the origin
    SetComponentDependsOn {
        component: String,
        target: Option<String>,
    },

    /// Re-point a transform; `None` for the origin
    SetTransformDependsOn {
        transform: String,
        target: Option<String>,
    },

    /// Add an `NCstream` group whose datasets configure a writer stream
    AddStream {
        parent: String,
        name: String,
        #[serde(default)]
        fields: BTreeMap<String, Value>,
    },

    /// Add a group that exports as a link to `target`
    AddLink {
        parent: String,
        name: String,
        target: String,
    },
}

impl Command {
    /// Operation name used in logs
    pub fn op_name(&self) -> &'static str {
        match self {
            Command::CreateComponent { .. } => "create_component",
            Command::RemoveComponent { .. } => "remove_component",
            Command::RenameComponent { .. } => "rename_component",
            Command::SetDescription { .. } => "set_description",
            Command::AddTranslation { .. } => "add_translation",
            Command::AddRotation { .. } => "add_rotation",
            Command::RemoveTransformation { .. } => "remove_transformation",
            Command::RenameTransform { .. } => "rename_transform",
            Command::SetComponentDependsOn { .. } => "set_component_depends_on",
            Command::SetTransformDependsOn { .. } => "set_transform_depends_on",
            Command::AddStream { .. } => "add_stream",
            Command::AddLink { .. } => "add_link",
        }
    }
}

/// Result of a successful command
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandOutcome {
    /// Path of the entity created, changed or removed
    pub path: String,
    /// Change events produced by this command
    pub events: Vec<ChangeEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_from_json() {
        let cmd: Command = serde_json::from_str(
            r#"{"command":"add_rotation","component":"/entry/instrument/detector",
                "axis":{"x":0.0,"y":0.0,"z":1.0},"angle":90.0}"#,
        )
        .unwrap();

        match cmd {
            Command::AddRotation {
                angle, depends_on, ..
            } => {
                assert_eq!(angle, 90.0);
                assert_eq!(depends_on, None);
            }
            _ => panic!("Wrong command variant"),
        }
    }

    #[test]
    fn test_command_clone() {
        let cmd1 = Command::RenameComponent {
            component: "/entry/instrument/a".to_string(),
            name: "b".to_string(),
        };
        let cmd2 = cmd1.clone();
        assert_eq!(cmd1, cmd2);
        assert_eq!(cmd1.op_name(), "rename_component");
    }

    #[test]
    fn test_add_stream_from_json() {
        let cmd: Command = serde_json::from_str(
            r#"{"command":"add_stream","parent":"/entry/instrument/detector","name":"events",
                "fields":{"topic":{"type":"str","value":"det_events"},
                          "nexus.indices.index_every_mb":{"type":"int","value":1}}}"#,
        )
        .unwrap();

        assert_eq!(cmd.op_name(), "add_stream");
        match cmd {
            Command::AddStream { fields, .. } => {
                assert_eq!(fields["topic"], Value::from("det_events"));
                assert_eq!(fields["nexus.indices.index_every_mb"], Value::Int(1));
            }
            _ => panic!("Wrong command variant"),
        }
    }
}
