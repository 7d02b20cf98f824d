//! Hierarchical attributed store
//!
//! An in-memory tree of groups (containers) and datasets (leaves holding one
//! typed value), with string-keyed attributes on any node. Nodes live in an
//! arena keyed by [`NodeId`]; absolute paths are derived from names.
//!
//! Not thread-safe: designed for a single logical writer. Every mutating call
//! appends exactly one [`ChangeEvent`] to a journal drained with
//! [`Store::take_events`].

pub mod events;
pub mod node;
pub mod value;

pub use events::ChangeEvent;
pub use node::{Node, NodeId, NodeKind};
pub use value::{DependsOn, Value, ORIGIN_SENTINEL};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::errors::{NexconError, Result};
use node::validate_name;

/// Attribute naming the NeXus class of a group
pub const NX_CLASS: &str = "NX_class";

const DOCUMENT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "StoreDocument", into = "StoreDocument")]
pub struct Store {
    nodes: BTreeMap<NodeId, Node>,
    root: NodeId,
    next_id: u64,
    events: Vec<ChangeEvent>,
}

/// On-disk shape of a store
#[derive(Serialize, Deserialize)]
struct StoreDocument {
    format_version: u32,
    root: NodeId,
    next_id: u64,
    nodes: Vec<Node>,
}

impl From<Store> for StoreDocument {
    fn from(store: Store) -> Self {
        Self {
            format_version: DOCUMENT_FORMAT_VERSION,
            root: store.root,
            next_id: store.next_id,
            nodes: store.nodes.into_values().collect(),
        }
    }
}

impl TryFrom<StoreDocument> for Store {
    type Error = NexconError;

    fn try_from(doc: StoreDocument) -> Result<Self> {
        if doc.format_version != DOCUMENT_FORMAT_VERSION {
            return Err(NexconError::Serialization {
                message: format!(
                    "unsupported document format_version {} (expected {})",
                    doc.format_version, DOCUMENT_FORMAT_VERSION
                ),
            });
        }

        let listed = doc.nodes.len();
        let nodes: BTreeMap<NodeId, Node> = doc.nodes.into_iter().map(|n| (n.id, n)).collect();
        if nodes.len() != listed {
            return Err(corrupt("duplicate node id"));
        }

        check_tree(&nodes, doc.root, doc.next_id)?;

        Ok(Self {
            nodes,
            root: doc.root,
            next_id: doc.next_id,
            events: Vec::new(),
        })
    }
}

fn corrupt(message: impl Into<String>) -> NexconError {
    NexconError::Serialization {
        message: message.into(),
    }
}

/// The document must describe exactly one tree rooted at `root`
///
/// Every node is reachable from the root exactly once, parent links mirror the
/// child lists, sibling names are unique, and every id is below `next_id`.
fn check_tree(nodes: &BTreeMap<NodeId, Node>, root: NodeId, next_id: u64) -> Result<()> {
    let root_node = nodes
        .get(&root)
        .ok_or_else(|| corrupt(format!("root node {} missing from document", root)))?;
    if root_node.parent.is_some() {
        return Err(corrupt(format!("root node {} has a parent", root)));
    }

    for node in nodes.values() {
        if node.id.raw() >= next_id {
            return Err(corrupt(format!(
                "node {} not below next_id {}",
                node.id, next_id
            )));
        }
        if node.id != root && node.parent.is_none() {
            return Err(corrupt(format!("node {} has no parent", node.id)));
        }
    }

    let mut visited = BTreeSet::new();
    visited.insert(root);
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        let Some(node) = nodes.get(&id) else {
            return Err(corrupt(format!("node {} missing from document", id)));
        };
        let mut names = BTreeSet::new();
        for child in node.children() {
            let linked = nodes
                .get(child)
                .map(|c| c.parent == Some(id))
                .unwrap_or(false);
            if !linked {
                return Err(corrupt(format!(
                    "child {} of {} is missing or unlinked",
                    child, id
                )));
            }
            if !visited.insert(*child) {
                return Err(corrupt(format!("node {} reached twice", child)));
            }
            let name = nodes.get(child).map(|c| c.name.as_str()).unwrap_or_default();
            if !names.insert(name) {
                return Err(corrupt(format!(
                    "duplicate child name '{}' under {}",
                    name, id
                )));
            }
            stack.push(*child);
        }
    }

    if visited.len() != nodes.len() {
        let unreached = nodes
            .keys()
            .find(|id| !visited.contains(*id))
            .map(|id| id.to_string())
            .unwrap_or_default();
        return Err(corrupt(format!("node {} not reachable from the root", unreached)));
    }
    Ok(())
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Create a store holding only the root group `/`
    pub fn new() -> Self {
        let root = NodeId::from_raw(0);
        let mut nodes = BTreeMap::new();
        nodes.insert(root, Node::group(root, String::new(), None));
        Self {
            nodes,
            root,
            next_id: 1,
            events: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// # Errors
    ///
    /// Returns `UnknownNode` if the node has been deleted.
    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(&id).ok_or(NexconError::UnknownNode {
            node_id: id.raw(),
        })
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes.get_mut(&id).ok_or(NexconError::UnknownNode {
            node_id: id.raw(),
        })
    }

    pub fn name(&self, id: NodeId) -> Result<&str> {
        Ok(self.node(id)?.name())
    }

    pub fn parent_of(&self, id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.node(id)?.parent)
    }

    pub fn children_of(&self, id: NodeId) -> Result<&[NodeId]> {
        Ok(self.node(id)?.children())
    }

    /// Absolute path of a node (`/` for the root)
    pub fn absolute_path(&self, id: NodeId) -> Result<String> {
        let mut segments = Vec::new();
        let mut current = self.node(id)?;
        while let Some(parent) = current.parent {
            segments.push(current.name.as_str());
            current = self.node(parent)?;
        }
        segments.reverse();
        Ok(format!("/{}", segments.join("/")))
    }

    /// Child of `parent` with the given name
    pub fn child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        let parent = self.nodes.get(&parent)?;
        parent
            .children()
            .iter()
            .copied()
            .find(|c| self.nodes.get(c).map(|n| n.name == name).unwrap_or(false))
    }

    /// Resolve an absolute path
    pub fn find(&self, path: &str) -> Option<NodeId> {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(self.root, |current, segment| self.child(current, segment))
    }

    /// Like [`Store::find`] but fails with `NodeNotFound`
    pub fn require(&self, path: &str) -> Result<NodeId> {
        self.find(path).ok_or_else(|| NexconError::NodeNotFound {
            path: path.to_string(),
        })
    }

    /// True if `node` is `ancestor` or lies below it
    pub fn is_within(&self, node: NodeId, ancestor: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(&id).and_then(|n| n.parent);
        }
        false
    }

    /// Pre-order walk of the subtree rooted at `from` (inclusive)
    pub fn walk(&self, from: NodeId) -> Result<Vec<NodeId>> {
        self.node(from)?;
        let mut visited = Vec::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            visited.push(id);
            let node = self.node(id)?;
            stack.extend(node.children().iter().rev().copied());
        }
        Ok(visited)
    }

    pub fn nx_class(&self, id: NodeId) -> Result<Option<&str>> {
        Ok(self.node(id)?.attribute(NX_CLASS).and_then(Value::as_str))
    }

    /// Wire form of a reference: `"."` or the target's absolute path
    ///
    /// # Errors
    ///
    /// Returns `UnknownNode` if the target has been deleted.
    pub fn wire_form(&self, reference: &DependsOn) -> Result<String> {
        match reference {
            DependsOn::Origin => Ok(ORIGIN_SENTINEL.to_string()),
            DependsOn::Node(id) => self.absolute_path(*id),
        }
    }

    // ===== Mutation =====

    fn allocate(&mut self) -> NodeId {
        let id = NodeId::from_raw(self.next_id);
        self.next_id += 1;
        id
    }

    fn emit(&mut self, event: ChangeEvent) {
        tracing::trace!(event = ?event, "store change");
        self.events.push(event);
    }

    /// Check that `parent` is a group that can take a new child called `name`
    fn check_new_child(&self, parent: NodeId, name: &str) -> Result<()> {
        if let Some(reason) = validate_name(name) {
            return Err(NexconError::InvalidName {
                name: name.to_string(),
                reason: reason.to_string(),
            });
        }
        let parent_node = self.node(parent)?;
        if !parent_node.is_group() {
            return Err(NexconError::NotAGroup {
                path: self.absolute_path(parent)?,
            });
        }
        if self.child(parent, name).is_some() {
            return Err(NexconError::NodeAlreadyExists {
                path: join_path(&self.absolute_path(parent)?, name),
            });
        }
        Ok(())
    }

    fn attach(&mut self, parent: NodeId, node: Node) -> Result<NodeId> {
        let id = node.id;
        match &mut self.node_mut(parent)?.kind {
            NodeKind::Group { children } => children.push(id),
            NodeKind::Dataset { .. } => {
                return Err(NexconError::Internal {
                    message: format!("attach under dataset {}", parent),
                })
            }
        }
        self.nodes.insert(id, node);
        Ok(id)
    }

    fn overwrite_value(&mut self, dataset: NodeId, value: Value) -> Result<()> {
        if self.node(dataset)?.is_group() {
            return Err(NexconError::WrongNodeKind {
                path: self.absolute_path(dataset)?,
                expected: "dataset".to_string(),
            });
        }
        if let NodeKind::Dataset { value: slot } = &mut self.node_mut(dataset)?.kind {
            *slot = value;
        }
        Ok(())
    }

    /// Create a group under `parent`, tagging it with `nx_class` when given
    ///
    /// # Errors
    /// * `InvalidName` - empty name, or one containing `/`
    /// * `NotAGroup` - `parent` is a dataset
    /// * `NodeAlreadyExists` - `parent` already has a child with that name
    pub fn create_group(
        &mut self,
        parent: NodeId,
        name: &str,
        nx_class: Option<&str>,
    ) -> Result<NodeId> {
        self.check_new_child(parent, name)?;

        let id = self.allocate();
        let mut node = Node::group(id, name.to_string(), Some(parent));
        if let Some(class) = nx_class {
            node.attributes
                .insert(NX_CLASS.to_string(), Value::Str(class.to_string()));
        }
        self.attach(parent, node)?;

        let path = self.absolute_path(id)?;
        self.emit(ChangeEvent::NodeAdded { path });
        Ok(id)
    }

    /// Value of the dataset `name` directly under `group`
    ///
    /// Returns `Ok(None)` when no such dataset exists.
    pub fn get_field(&self, group: NodeId, name: &str) -> Result<Option<&Value>> {
        self.node(group)?;
        Ok(self
            .child(group, name)
            .and_then(|c| self.nodes.get(&c))
            .and_then(Node::value))
    }

    /// Create or overwrite the dataset `name` under `group`
    ///
    /// # Errors
    /// * `NotAGroup` - `group` is a dataset
    /// * `WrongNodeKind` - a child group already uses the name
    pub fn set_field(&mut self, group: NodeId, name: &str, value: Value) -> Result<NodeId> {
        let id = match self.child(group, name) {
            Some(existing) => {
                self.overwrite_value(existing, value)?;
                existing
            }
            None => {
                self.check_new_child(group, name)?;
                let id = self.allocate();
                self.attach(group, Node::dataset(id, name.to_string(), group, value))?;
                id
            }
        };

        let path = self.absolute_path(group)?;
        self.emit(ChangeEvent::FieldChanged {
            path,
            name: name.to_string(),
        });
        Ok(id)
    }

    /// Overwrite the value of an existing dataset node
    pub fn set_dataset_value(&mut self, dataset: NodeId, value: Value) -> Result<()> {
        self.overwrite_value(dataset, value)?;

        let node = self.node(dataset)?;
        let name = node.name.clone();
        let parent = node.parent.unwrap_or(self.root);
        let path = self.absolute_path(parent)?;
        self.emit(ChangeEvent::FieldChanged { path, name });
        Ok(())
    }

    pub fn get_attribute(&self, id: NodeId, name: &str) -> Result<Option<&Value>> {
        Ok(self.node(id)?.attribute(name))
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: Value) -> Result<()> {
        self.node_mut(id)?
            .attributes
            .insert(name.to_string(), value);

        let path = self.absolute_path(id)?;
        self.emit(ChangeEvent::AttributeChanged {
            path,
            name: name.to_string(),
        });
        Ok(())
    }

    /// Delete a node and its whole subtree
    ///
    /// # Errors
    /// * `UnknownNode` - the node does not exist
    /// * `WrongNodeKind` - attempt to delete the root
    pub fn delete_node(&mut self, id: NodeId) -> Result<()> {
        let parent = self
            .node(id)?
            .parent
            .ok_or_else(|| NexconError::WrongNodeKind {
                path: "/".to_string(),
                expected: "deletable (non-root) node".to_string(),
            })?;

        let path = self.absolute_path(id)?;
        let doomed = self.walk(id)?;

        if let NodeKind::Group { children } = &mut self.node_mut(parent)?.kind {
            children.retain(|c| *c != id);
        }
        for node in doomed {
            self.nodes.remove(&node);
        }

        self.emit(ChangeEvent::NodeRemoved { path });
        Ok(())
    }

    /// Rename a node in place (a move within the same parent)
    ///
    /// Ids are unchanged, so references to the node and its descendants stay valid.
    pub fn rename_node(&mut self, id: NodeId, new_name: &str) -> Result<()> {
        let parent = self
            .node(id)?
            .parent
            .ok_or_else(|| NexconError::WrongNodeKind {
                path: "/".to_string(),
                expected: "renamable (non-root) node".to_string(),
            })?;

        if self.node(id)?.name == new_name {
            return Ok(());
        }
        self.check_new_child(parent, new_name)?;

        let from = self.absolute_path(id)?;
        self.node_mut(id)?.name = new_name.to_string();
        let to = self.absolute_path(id)?;

        self.emit(ChangeEvent::NodeRenamed { from, to });
        Ok(())
    }

    // ===== Change journal =====

    /// Events emitted since the last drain
    pub fn pending_events(&self) -> &[ChangeEvent] {
        &self.events
    }

    /// Drain the change journal
    pub fn take_events(&mut self) -> Vec<ChangeEvent> {
        std::mem::take(&mut self.events)
    }
}

fn join_path(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", parent, name)
    }
}
