use serde::Serialize;
use std::collections::BTreeSet;
use std::str::FromStr;
use std::time::Instant;

use super::classes::{TRANSFORMATION_TYPE, UNITS, VECTOR};
use super::{classify, Component, Vector3};
use crate::errors::{NexconError, Result};
use crate::logging_facility::elapsed_ms;
use crate::ops::{depends_on_ops, Instrument};
use crate::store::{NodeId, Value};
use crate::{log_op_end, log_op_error, log_op_start};

/// Kind of rigid-body operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TransformKind {
    Translation,
    Rotation,
}

impl TransformKind {
    /// Value stored in the `transformation_type` attribute
    pub fn as_str(&self) -> &'static str {
        match self {
            TransformKind::Translation => "Translation",
            TransformKind::Rotation => "Rotation",
        }
    }

    pub fn default_units(&self) -> &'static str {
        match self {
            TransformKind::Translation => "m",
            TransformKind::Rotation => "degrees",
        }
    }

    /// Prefix of auto-generated names (`translation_1`, `rotation_2`, ...)
    pub fn name_prefix(&self) -> &'static str {
        match self {
            TransformKind::Translation => "translation",
            TransformKind::Rotation => "rotation",
        }
    }
}

impl FromStr for TransformKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Translation" => Ok(TransformKind::Translation),
            "Rotation" => Ok(TransformKind::Rotation),
            other => Err(format!("unknown transformation_type '{}'", other)),
        }
    }
}

impl std::fmt::Display for TransformKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only view of a transform, for views and exports
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformSnapshot {
    pub name: String,
    pub path: String,
    pub kind: TransformKind,
    pub magnitude: f64,
    pub units: String,
    pub vector: Vector3,
    /// Wire form: `"."` or the absolute path of the next transform
    pub depends_on: String,
}

/// Handle to a transform node: one rotation or translation
///
/// The node is a dataset inside a component's transformations group. Its value
/// is the magnitude (distance or angle); `units`, `vector`,
/// `transformation_type` and `depends_on` are attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Transform(NodeId);

impl Transform {
    pub(crate) fn from_id(id: NodeId) -> Self {
        Self(id)
    }

    /// Wrap a node after checking that it is a transform
    ///
    /// # Errors
    /// * `UnknownNode` - the node does not exist
    /// * `WrongNodeKind` - the node is not a translation or rotation
    pub fn from_node(instrument: &Instrument, id: NodeId) -> Result<Self> {
        match classify(instrument.store(), id)? {
            Some(kind) if kind.is_transform() => Ok(Self(id)),
            _ => Err(NexconError::WrongNodeKind {
                path: instrument.store().absolute_path(id)?,
                expected: "transform".to_string(),
            }),
        }
    }

    pub fn id(&self) -> NodeId {
        self.0
    }

    /// Identity string of the transform
    pub fn absolute_path(&self, instrument: &Instrument) -> Result<String> {
        instrument.store().absolute_path(self.0)
    }

    pub fn name(&self, instrument: &Instrument) -> Result<String> {
        Ok(instrument.store().name(self.0)?.to_string())
    }

    /// Rename the underlying node
    ///
    /// References to this transform are id-based and survive the rename.
    ///
    /// # Errors
    /// * `UnknownNode` - the transform no longer exists
    /// * `NodeAlreadyExists` - a sibling already has that name
    pub fn set_name(&self, instrument: &mut Instrument, name: &str) -> Result<()> {
        instrument.store_mut().rename_node(self.0, name)
    }

    pub fn kind(&self, instrument: &Instrument) -> Result<TransformKind> {
        let raw = self.string_attribute(instrument, TRANSFORMATION_TYPE)?;
        raw.parse().map_err(|reason| NexconError::InvalidValue {
            path: self.path_or_id(instrument),
            name: TRANSFORMATION_TYPE.to_string(),
            reason,
        })
    }

    /// Distance for a translation, angle for a rotation
    pub fn magnitude(&self, instrument: &Instrument) -> Result<f64> {
        let node = instrument.store().node(self.0)?;
        node.value()
            .and_then(Value::as_f64)
            .ok_or_else(|| NexconError::InvalidValue {
                path: self.path_or_id(instrument),
                name: "value".to_string(),
                reason: "expected a numeric magnitude".to_string(),
            })
    }

    pub fn set_magnitude(&self, instrument: &mut Instrument, magnitude: f64) -> Result<()> {
        instrument
            .store_mut()
            .set_dataset_value(self.0, Value::Float(magnitude))
    }

    pub fn units(&self, instrument: &Instrument) -> Result<String> {
        self.string_attribute(instrument, UNITS)
    }

    pub fn set_units(&self, instrument: &mut Instrument, units: &str) -> Result<()> {
        instrument
            .store_mut()
            .set_attribute(self.0, UNITS, Value::from(units))
    }

    /// Unit direction for a translation, axis for a rotation
    pub fn vector(&self, instrument: &Instrument) -> Result<Vector3> {
        let invalid = |reason: String| NexconError::InvalidValue {
            path: self.path_or_id(instrument),
            name: VECTOR.to_string(),
            reason,
        };
        let values = instrument
            .store()
            .get_attribute(self.0, VECTOR)?
            .and_then(Value::as_float_array)
            .ok_or_else(|| invalid("expected an array of 3 floats".to_string()))?;
        Vector3::try_from(values).map_err(|len| invalid(format!("expected 3 floats, found {}", len)))
    }

    pub fn set_vector(&self, instrument: &mut Instrument, vector: Vector3) -> Result<()> {
        instrument
            .store_mut()
            .set_attribute(self.0, VECTOR, Value::FloatArray(vector.to_vec()))
    }

    /// Component owning this transform (two levels up: group, then component)
    pub fn owner(&self, instrument: &Instrument) -> Result<Component> {
        let store = instrument.store();
        let owner = store
            .parent_of(self.0)?
            .map(|group| store.parent_of(group))
            .transpose()?
            .flatten()
            .ok_or_else(|| NexconError::WrongNodeKind {
                path: self.path_or_id(instrument),
                expected: "transform inside a component".to_string(),
            })?;
        Component::from_node(instrument, owner)
    }

    /// Next transform nearer the origin; `None` at the origin
    ///
    /// # Errors
    ///
    /// Returns `DanglingReference` if the stored pointer targets a missing node.
    pub fn depends_on(&self, instrument: &Instrument) -> Result<Option<Transform>> {
        depends_on_ops::resolve_depends_on(instrument, self.0)
    }

    /// Re-point this transform
    ///
    /// Deregisters from the previous target, writes the new pointer (`"."` for
    /// `None`), then registers with the new target, all within this call.
    ///
    /// # Errors
    /// * `CycleDetected` - the target already (transitively) depends on this transform
    /// * `WrongNodeKind` / `UnknownNode` - the target is not a live transform
    pub fn set_depends_on(
        &self,
        instrument: &mut Instrument,
        target: Option<Transform>,
    ) -> Result<()> {
        depends_on_ops::set_depends_on(instrument, self.0, target)
    }

    /// Record `dependent` as pointing at this transform. Idempotent.
    pub fn register_dependent(&self, instrument: &mut Instrument, dependent: NodeId) -> bool {
        instrument.registry_mut().register(self.0, dependent)
    }

    /// Idempotent inverse of [`Transform::register_dependent`]
    pub fn deregister_dependent(&self, instrument: &mut Instrument, dependent: NodeId) -> bool {
        instrument.registry_mut().deregister(self.0, dependent)
    }

    /// Entities whose depends_on currently targets this transform
    pub fn get_dependents(&self, instrument: &Instrument) -> BTreeSet<NodeId> {
        instrument.registry().dependents_of(self.0)
    }

    /// Absolute paths of the dependents, sorted
    pub fn dependent_paths(&self, instrument: &Instrument) -> Result<Vec<String>> {
        let mut paths = self
            .get_dependents(instrument)
            .into_iter()
            .map(|id| instrument.store().absolute_path(id))
            .collect::<Result<Vec<_>>>()?;
        paths.sort();
        Ok(paths)
    }

    /// True when nothing depends on this transform
    pub fn is_deletable(&self, instrument: &Instrument) -> bool {
        !instrument.registry().has_dependents(self.0)
    }

    pub fn describe(&self, instrument: &Instrument) -> Result<TransformSnapshot> {
        let store = instrument.store();
        let depends_on = depends_on_ops::stored_reference(instrument, self.0)?;
        Ok(TransformSnapshot {
            name: self.name(instrument)?,
            path: self.absolute_path(instrument)?,
            kind: self.kind(instrument)?,
            magnitude: self.magnitude(instrument)?,
            units: self.units(instrument)?,
            vector: self.vector(instrument)?,
            depends_on: store.wire_form(&depends_on).map_err(|_| {
                NexconError::DanglingReference {
                    owner: self.path_or_id(instrument),
                    target: depends_on
                        .target()
                        .map(|id| id.to_string())
                        .unwrap_or_default(),
                }
            })?,
        })
    }

    /// Remove this transform from its owning component
    ///
    /// Convenience for `owner.remove_transformation(self)`.
    pub fn remove(&self, instrument: &mut Instrument) -> Result<()> {
        let start = Instant::now();
        log_op_start!("transform_remove", node_path = %self.path_or_id(instrument));
        let result = self
            .owner(instrument)
            .and_then(|owner| owner.remove_transformation(instrument, *self));
        match &result {
            Ok(()) => log_op_end!("transform_remove", duration_ms = elapsed_ms(start)),
            Err(e) => log_op_error!("transform_remove", e, duration_ms = elapsed_ms(start)),
        }
        result
    }

    fn string_attribute(&self, instrument: &Instrument, name: &str) -> Result<String> {
        instrument
            .store()
            .get_attribute(self.0, name)?
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| NexconError::InvalidValue {
                path: self.path_or_id(instrument),
                name: name.to_string(),
                reason: "expected a string attribute".to_string(),
            })
    }

    fn path_or_id(&self, instrument: &Instrument) -> String {
        instrument
            .store()
            .absolute_path(self.0)
            .unwrap_or_else(|_| self.0.to_string())
    }
}

impl From<Transform> for NodeId {
    fn from(t: Transform) -> Self {
        t.0
    }
}
