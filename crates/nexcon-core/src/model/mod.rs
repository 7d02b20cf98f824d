//! Domain model: typed handles over store nodes
//!
//! Components and transforms are not copied out of the store. A handle is a
//! node id; every accessor reads through the [`crate::Instrument`] that owns the
//! store, so the store stays the single source of truth.

pub mod classes;
pub mod component;
pub mod transform;
pub mod vector;

pub use component::Component;
pub use transform::{Transform, TransformKind, TransformSnapshot};
pub use vector::Vector3;

use crate::errors::Result;
use crate::store::{NodeId, Store, Value};

/// Closed classification of the nodes the model cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Component,
    TransformationsGroup,
    Translation,
    Rotation,
}

impl EntityKind {
    pub fn is_transform(&self) -> bool {
        matches!(self, EntityKind::Translation | EntityKind::Rotation)
    }

    /// Entities that carry a depends_on pointer
    pub fn has_depends_on(&self) -> bool {
        !matches!(self, EntityKind::TransformationsGroup)
    }
}

/// Classify a node; `Ok(None)` for nodes outside the model (plain fields, entry, ...)
///
/// # Errors
///
/// Returns `UnknownNode` if the node does not exist.
pub fn classify(store: &Store, id: NodeId) -> Result<Option<EntityKind>> {
    let node = store.node(id)?;

    if node.is_group() {
        let kind = match store.nx_class(id)? {
            Some(classes::NX_TRANSFORMATIONS) => Some(EntityKind::TransformationsGroup),
            Some(class) if classes::is_component_class(class) => Some(EntityKind::Component),
            _ => None,
        };
        return Ok(kind);
    }

    let kind = node
        .attribute(classes::TRANSFORMATION_TYPE)
        .and_then(Value::as_str)
        .and_then(|t| t.parse::<TransformKind>().ok())
        .map(|k| match k {
            TransformKind::Translation => EntityKind::Translation,
            TransformKind::Rotation => EntityKind::Rotation,
        });
    Ok(kind)
}
