use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::value::Value;

/// Stable identity of a node for the lifetime of a document
///
/// Ids are never reused within a store, so a handle to a deleted node can be
/// detected rather than silently aliasing a newer node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u64);

impl NodeId {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Container or leaf
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Container; children kept in creation order
    Group { children: Vec<NodeId> },
    /// Leaf holding a single typed value
    Dataset { value: Value },
}

/// One node of the hierarchical store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) name: String,
    pub(crate) parent: Option<NodeId>,
    pub(crate) kind: NodeKind,
    #[serde(default)]
    pub(crate) attributes: BTreeMap<String, Value>,
}

impl Node {
    pub(crate) fn group(id: NodeId, name: String, parent: Option<NodeId>) -> Self {
        Self {
            id,
            name,
            parent,
            kind: NodeKind::Group {
                children: Vec::new(),
            },
            attributes: BTreeMap::new(),
        }
    }

    pub(crate) fn dataset(id: NodeId, name: String, parent: NodeId, value: Value) -> Self {
        Self {
            id,
            name,
            parent: Some(parent),
            kind: NodeKind::Dataset { value },
            attributes: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, NodeKind::Group { .. })
    }

    /// Children of a group; empty for datasets
    pub fn children(&self) -> &[NodeId] {
        match &self.kind {
            NodeKind::Group { children } => children,
            NodeKind::Dataset { .. } => &[],
        }
    }

    /// Value of a dataset; `None` for groups
    pub fn value(&self) -> Option<&Value> {
        match &self.kind {
            NodeKind::Dataset { value } => Some(value),
            NodeKind::Group { .. } => None,
        }
    }

    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }
}

/// Reject names that cannot be a single path segment
pub(crate) fn validate_name(name: &str) -> Option<&'static str> {
    if name.is_empty() {
        Some("name cannot be empty")
    } else if name.contains('/') {
        Some("name cannot contain '/'")
    } else if name == "." || name == ".." {
        Some("name cannot be a relative path token")
    } else {
        None
    }
}
