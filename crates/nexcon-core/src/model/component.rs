use std::time::Instant;

use super::classes::{
    DEPENDS_ON, DESCRIPTION, NX_TRANSFORMATIONS, TRANSFORMATIONS_GROUP_NAME, TRANSFORMATION_TYPE,
    UNITS, VECTOR,
};
use super::{classify, EntityKind, Transform, TransformKind, Vector3};
use crate::errors::{NexconError, Result};
use crate::logging_facility::elapsed_ms;
use crate::ops::{depends_on_ops, Instrument};
use crate::store::node::validate_name;
use crate::store::{NodeId, Value};
use crate::traversal::{resolve_chain, ChainScope};
use crate::{log_op_end, log_op_error, log_op_start};

/// Handle to a component: a classified group representing one instrument part
///
/// A component owns at most one transformations group, created on the first
/// `add_translation`/`add_rotation` and deleted with its last transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Component(NodeId);

/// Fully checked request to create one transform
struct NewTransform<'a> {
    kind: TransformKind,
    name: Option<&'a str>,
    magnitude: f64,
    units: &'a str,
    vector: Vector3,
    depends_on: Option<Transform>,
}

impl Component {
    pub(crate) fn from_id(id: NodeId) -> Self {
        Self(id)
    }

    /// Wrap a node after checking that it is a component group
    ///
    /// # Errors
    /// * `UnknownNode` - the node does not exist
    /// * `WrongNodeKind` - the node is not a group of a known component class
    pub fn from_node(instrument: &Instrument, id: NodeId) -> Result<Self> {
        match classify(instrument.store(), id)? {
            Some(EntityKind::Component) => Ok(Self(id)),
            _ => Err(NexconError::WrongNodeKind {
                path: instrument.store().absolute_path(id)?,
                expected: "component".to_string(),
            }),
        }
    }

    pub fn id(&self) -> NodeId {
        self.0
    }

    pub fn absolute_path(&self, instrument: &Instrument) -> Result<String> {
        instrument.store().absolute_path(self.0)
    }

    pub fn name(&self, instrument: &Instrument) -> Result<String> {
        Ok(instrument.store().name(self.0)?.to_string())
    }

    /// Rename the component; spaces become underscores
    pub fn set_name(&self, instrument: &mut Instrument, name: &str) -> Result<()> {
        instrument
            .store_mut()
            .rename_node(self.0, &name.replace(' ', "_"))
    }

    pub fn nx_class(&self, instrument: &Instrument) -> Result<String> {
        Ok(instrument
            .store()
            .nx_class(self.0)?
            .unwrap_or_default()
            .to_string())
    }

    /// Description field, empty when unset
    pub fn description(&self, instrument: &Instrument) -> Result<String> {
        Ok(instrument
            .store()
            .get_field(self.0, DESCRIPTION)?
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    pub fn set_description(&self, instrument: &mut Instrument, description: &str) -> Result<()> {
        instrument
            .store_mut()
            .set_field(self.0, DESCRIPTION, Value::from(description))
            .map(|_| ())
    }

    /// Value of the field `name`; `Ok(None)` when absent
    pub fn get_field(&self, instrument: &Instrument, name: &str) -> Result<Option<Value>> {
        Ok(instrument.store().get_field(self.0, name)?.cloned())
    }

    /// Create or overwrite the field `name`
    ///
    /// # Errors
    ///
    /// Returns `InvalidValue` for `depends_on`, which only changes through
    /// [`Component::set_depends_on`] so the registry stays in step.
    pub fn set_field(&self, instrument: &mut Instrument, name: &str, value: Value) -> Result<()> {
        if name == DEPENDS_ON {
            return Err(NexconError::InvalidValue {
                path: self.absolute_path(instrument)?,
                name: name.to_string(),
                reason: "use set_depends_on".to_string(),
            });
        }
        instrument
            .store_mut()
            .set_field(self.0, name, value)
            .map(|_| ())
    }

    /// First transform of this component's chain; `None` at the origin
    pub fn depends_on(&self, instrument: &Instrument) -> Result<Option<Transform>> {
        depends_on_ops::resolve_depends_on(instrument, self.0)
    }

    /// Re-point the component, moving its registry edge in the same call
    pub fn set_depends_on(
        &self,
        instrument: &mut Instrument,
        target: Option<Transform>,
    ) -> Result<()> {
        depends_on_ops::set_depends_on(instrument, self.0, target)
    }

    /// The transformations group, if one exists
    pub fn transformation_group(&self, instrument: &Instrument) -> Result<Option<NodeId>> {
        let store = instrument.store();
        for child in store.children_of(self.0)? {
            if store.nx_class(*child)? == Some(NX_TRANSFORMATIONS) {
                return Ok(Some(*child));
            }
        }
        Ok(None)
    }

    /// Transforms in the group, in creation order (not chain order)
    pub fn list_transforms(&self, instrument: &Instrument) -> Result<Vec<Transform>> {
        let Some(group) = self.transformation_group(instrument)? else {
            return Ok(Vec::new());
        };
        Ok(instrument
            .store()
            .children_of(group)?
            .iter()
            .filter_map(|id| Transform::from_node(instrument, *id).ok())
            .collect())
    }

    /// Chain to the origin, crossing component boundaries; nearest first
    pub fn transforms_full_chain(&self, instrument: &Instrument) -> Result<Vec<Transform>> {
        resolve_chain(instrument, self.depends_on(instrument)?, ChainScope::Full)
    }

    /// The part of the chain owned by this component
    pub fn transforms(&self, instrument: &Instrument) -> Result<Vec<Transform>> {
        resolve_chain(
            instrument,
            self.depends_on(instrument)?,
            ChainScope::LocalTo(*self),
        )
    }

    /// Add a translation by `vector` in metres
    ///
    /// The vector is split into a unit direction (stored as `vector`) and its
    /// length (stored as the node value).
    ///
    /// # Errors
    /// * `ZeroLengthVector` - `vector` has zero (or non-finite) length
    /// * `NodeAlreadyExists` / `InvalidName` - unusable caller-supplied name
    /// * `WrongNodeKind` / `UnknownNode` - `depends_on` is not a live transform
    pub fn add_translation(
        &self,
        instrument: &mut Instrument,
        vector: Vector3,
        name: Option<&str>,
        depends_on: Option<Transform>,
    ) -> Result<Transform> {
        self.add_translation_with_units(
            instrument,
            vector,
            TransformKind::Translation.default_units(),
            name,
            depends_on,
        )
    }

    /// Like [`Component::add_translation`] with the distance unit given
    pub fn add_translation_with_units(
        &self,
        instrument: &mut Instrument,
        vector: Vector3,
        units: &str,
        name: Option<&str>,
        depends_on: Option<Transform>,
    ) -> Result<Transform> {
        let start = Instant::now();
        log_op_start!("add_translation", node_path = %self.path_or_id(instrument));

        let result = match vector.normalized() {
            Some(direction) => self.add_transform(
                instrument,
                NewTransform {
                    kind: TransformKind::Translation,
                    name,
                    magnitude: vector.magnitude(),
                    units,
                    vector: direction,
                    depends_on,
                },
            ),
            None => Err(NexconError::ZeroLengthVector),
        };

        match &result {
            Ok(_) => log_op_end!("add_translation", duration_ms = elapsed_ms(start)),
            Err(e) => log_op_error!("add_translation", e, duration_ms = elapsed_ms(start)),
        }
        result
    }

    /// Add a rotation of `angle` degrees about `axis`
    ///
    /// The axis is stored exactly as given.
    pub fn add_rotation(
        &self,
        instrument: &mut Instrument,
        axis: Vector3,
        angle: f64,
        name: Option<&str>,
        depends_on: Option<Transform>,
    ) -> Result<Transform> {
        let start = Instant::now();
        log_op_start!("add_rotation", node_path = %self.path_or_id(instrument));

        let result = self.add_transform(
            instrument,
            NewTransform {
                kind: TransformKind::Rotation,
                name,
                magnitude: angle,
                units: TransformKind::Rotation.default_units(),
                vector: axis,
                depends_on,
            },
        );

        match &result {
            Ok(_) => log_op_end!("add_rotation", duration_ms = elapsed_ms(start)),
            Err(e) => log_op_error!("add_rotation", e, duration_ms = elapsed_ms(start)),
        }
        result
    }

    fn add_transform(&self, instrument: &mut Instrument, new: NewTransform<'_>) -> Result<Transform> {
        // Step 1: validate everything before the first write
        Component::from_node(instrument, self.0)?;
        let group = self.transformation_group(instrument)?;
        let name = match new.name {
            Some(name) => {
                self.check_transform_name(instrument, group, name)?;
                name.to_string()
            }
            None => next_free_name(instrument, group, new.kind),
        };
        if let Some(target) = new.depends_on {
            Transform::from_node(instrument, target.id())?;
        }

        // Step 2: group on demand
        let group = match group {
            Some(group) => group,
            None => instrument.store_mut().create_group(
                self.0,
                TRANSFORMATIONS_GROUP_NAME,
                Some(NX_TRANSFORMATIONS),
            )?,
        };

        // Step 3: node value and attributes
        let store = instrument.store_mut();
        let id = store.set_field(group, &name, Value::Float(new.magnitude))?;
        store.set_attribute(id, UNITS, Value::from(new.units))?;
        store.set_attribute(id, VECTOR, Value::FloatArray(new.vector.to_vec()))?;
        store.set_attribute(id, TRANSFORMATION_TYPE, Value::from(new.kind.as_str()))?;

        // Step 4: pointer and registry edge
        let transform = Transform::from_id(id);
        depends_on_ops::set_depends_on(instrument, id, new.depends_on)?;
        Ok(transform)
    }

    fn check_transform_name(
        &self,
        instrument: &Instrument,
        group: Option<NodeId>,
        name: &str,
    ) -> Result<()> {
        if let Some(reason) = validate_name(name) {
            return Err(NexconError::InvalidName {
                name: name.to_string(),
                reason: reason.to_string(),
            });
        }
        if let Some(group) = group {
            if instrument.store().child(group, name).is_some() {
                return Err(NexconError::NodeAlreadyExists {
                    path: format!("{}/{}", instrument.store().absolute_path(group)?, name),
                });
            }
        }
        Ok(())
    }

    /// Remove one of this component's transforms
    ///
    /// Deletes the whole transformations group when `transform` is its only
    /// child.
    ///
    /// # Errors
    /// * `NotOwner` - the transform belongs to another component
    /// * `HasDependents` - something still points at the transform; lists the paths
    pub fn remove_transformation(
        &self,
        instrument: &mut Instrument,
        transform: Transform,
    ) -> Result<()> {
        let start = Instant::now();
        log_op_start!(
            "remove_transformation",
            node_path = %self.path_or_id(instrument),
            target_path = %transform.absolute_path(instrument).unwrap_or_default()
        );

        let result = self.remove_transformation_inner(instrument, transform);

        match &result {
            Ok(()) => log_op_end!("remove_transformation", duration_ms = elapsed_ms(start)),
            Err(e) => log_op_error!("remove_transformation", e, duration_ms = elapsed_ms(start)),
        }
        result
    }

    fn remove_transformation_inner(
        &self,
        instrument: &mut Instrument,
        transform: Transform,
    ) -> Result<()> {
        // Step 1: ownership
        let owner = transform.owner(instrument)?;
        if owner != *self {
            return Err(NexconError::NotOwner {
                transform: transform.absolute_path(instrument)?,
                component: self.absolute_path(instrument)?,
            });
        }

        // Step 2: nothing may still point at it
        let dependents = transform.dependent_paths(instrument)?;
        if !dependents.is_empty() {
            return Err(NexconError::HasDependents {
                path: transform.absolute_path(instrument)?,
                dependents,
            });
        }

        // Step 3: delete the node, or the group if it is the last transform
        let store = instrument.store();
        let group = store
            .parent_of(transform.id())?
            .ok_or_else(|| NexconError::Internal {
                message: format!("transform {} has no parent", transform.id()),
            })?;
        let doomed = if store.children_of(group)?.len() == 1 {
            group
        } else {
            transform.id()
        };
        instrument.store_mut().delete_node(doomed)?;

        // Step 4: drop its own outgoing edge
        instrument.registry_mut().forget(transform.id());
        Ok(())
    }

    fn path_or_id(&self, instrument: &Instrument) -> String {
        instrument
            .store()
            .absolute_path(self.0)
            .unwrap_or_else(|_| self.0.to_string())
    }
}

/// First `translation_N` / `rotation_N` not used in the group
fn next_free_name(instrument: &Instrument, group: Option<NodeId>, kind: TransformKind) -> String {
    let mut n = 1;
    loop {
        let candidate = format!("{}_{}", kind.name_prefix(), n);
        let taken = group
            .map(|g| instrument.store().child(g, &candidate).is_some())
            .unwrap_or(false);
        if !taken {
            return candidate;
        }
        n += 1;
    }
}

impl From<Component> for NodeId {
    fn from(c: Component) -> Self {
        c.0
    }
}
