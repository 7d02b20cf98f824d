//! depends_on reads and writes
//!
//! Components keep their pointer in a `depends_on` dataset; transforms keep it
//! in a `depends_on` attribute. Every write goes through [`set_depends_on`] so
//! the registry edge moves in the same call as the stored value.

use std::collections::BTreeSet;
use std::time::Instant;

use super::Instrument;
use crate::errors::{NexconError, Result};
use crate::logging_facility::elapsed_ms;
use crate::model::classes::DEPENDS_ON;
use crate::model::{classify, EntityKind, Transform};
use crate::store::{DependsOn, NodeId, Value, ORIGIN_SENTINEL};
use crate::{log_op_end, log_op_error, log_op_start};

/// Where an entity stores its pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Field,
    Attribute,
}

fn slot_for(instrument: &Instrument, owner: NodeId) -> Result<Slot> {
    match classify(instrument.store(), owner)? {
        Some(EntityKind::Component) => Ok(Slot::Field),
        Some(EntityKind::Translation) | Some(EntityKind::Rotation) => Ok(Slot::Attribute),
        _ => Err(NexconError::WrongNodeKind {
            path: instrument.store().absolute_path(owner)?,
            expected: "component or transform".to_string(),
        }),
    }
}

fn stored_value(instrument: &Instrument, owner: NodeId, slot: Slot) -> Result<Option<Value>> {
    let store = instrument.store();
    let value = match slot {
        Slot::Field => store.get_field(owner, DEPENDS_ON)?,
        Slot::Attribute => store.get_attribute(owner, DEPENDS_ON)?,
    };
    Ok(value.cloned())
}

/// Typed pointer stored on `owner`
///
/// A missing value and `"."` both mean the origin. A legacy path string is
/// resolved through the store.
///
/// # Errors
/// * `DanglingReference` - a legacy path string names no node
/// * `InvalidValue` - the stored value is neither a reference nor a string
pub fn stored_reference(instrument: &Instrument, owner: NodeId) -> Result<DependsOn> {
    let slot = slot_for(instrument, owner)?;
    let store = instrument.store();
    match stored_value(instrument, owner, slot)? {
        None => Ok(DependsOn::Origin),
        Some(Value::Reference(reference)) => Ok(reference),
        Some(Value::Str(path)) if path == ORIGIN_SENTINEL || path.is_empty() => {
            Ok(DependsOn::Origin)
        }
        Some(Value::Str(path)) => store.find(&path).map(DependsOn::Node).ok_or_else(|| {
            NexconError::DanglingReference {
                owner: owner_path(instrument, owner),
                target: path,
            }
        }),
        Some(other) => Err(NexconError::InvalidValue {
            path: owner_path(instrument, owner),
            name: DEPENDS_ON.to_string(),
            reason: format!("expected a reference, found {}", other.type_name()),
        }),
    }
}

/// Resolve the pointer on `owner` to a live transform
///
/// # Errors
/// * `DanglingReference` - the target node no longer exists
/// * `WrongNodeKind` - the target exists but is not a transform
pub fn resolve_depends_on(instrument: &Instrument, owner: NodeId) -> Result<Option<Transform>> {
    match stored_reference(instrument, owner)? {
        DependsOn::Origin => Ok(None),
        DependsOn::Node(target) => {
            if !instrument.store().contains(target) {
                return Err(NexconError::DanglingReference {
                    owner: owner_path(instrument, owner),
                    target: target.to_string(),
                });
            }
            Transform::from_node(instrument, target).map(Some)
        }
    }
}

/// Re-point `owner` (a component or transform) at `target`
///
/// All checks run before the stored value changes; on error neither the store
/// nor the registry is touched.
///
/// # Arguments
/// * `instrument` - The instrument holding the store and registry
/// * `owner` - Component or transform whose pointer is written
/// * `target` - New target, `None` for the origin
///
/// # Errors
/// * `WrongNodeKind` - owner is not a component or transform, or target is not a transform
/// * `UnknownNode` - owner or target no longer exists
/// * `CycleDetected` - target already (transitively) depends on owner
pub fn set_depends_on(
    instrument: &mut Instrument,
    owner: NodeId,
    target: Option<Transform>,
) -> Result<()> {
    let start = Instant::now();
    log_op_start!("set_depends_on", node_path = %owner_path(instrument, owner));

    let result = set_depends_on_inner(instrument, owner, target);

    match &result {
        Ok(()) => log_op_end!("set_depends_on", duration_ms = elapsed_ms(start)),
        Err(e) => log_op_error!("set_depends_on", e, duration_ms = elapsed_ms(start)),
    }
    result
}

fn set_depends_on_inner(
    instrument: &mut Instrument,
    owner: NodeId,
    target: Option<Transform>,
) -> Result<()> {
    // Step 1: owner must carry a pointer
    let slot = slot_for(instrument, owner)?;

    // Step 2: target must be a live transform that does not lead back to owner
    if let Some(t) = target {
        Transform::from_node(instrument, t.id())?;
        if chain_reaches(instrument, t.id(), owner) {
            return Err(NexconError::CycleDetected {
                path: owner_path(instrument, owner),
            });
        }
    }

    // Step 3: previous edge; a dangling previous pointer has no registry edge
    let previous = stored_reference(instrument, owner)
        .ok()
        .and_then(|r| r.target());

    // Step 4: write, then move the edge
    let reference = DependsOn::from(target.map(|t| t.id()));
    write_slot(instrument, owner, slot, reference)?;

    let registry = instrument.registry_mut();
    if let Some(prev) = previous {
        registry.deregister(prev, owner);
    }
    if let Some(t) = target {
        registry.register(t.id(), owner);
    }
    Ok(())
}

fn write_slot(
    instrument: &mut Instrument,
    owner: NodeId,
    slot: Slot,
    reference: DependsOn,
) -> Result<()> {
    let store = instrument.store_mut();
    match slot {
        Slot::Field => store
            .set_field(owner, DEPENDS_ON, Value::Reference(reference))
            .map(|_| ()),
        Slot::Attribute => store.set_attribute(owner, DEPENDS_ON, Value::Reference(reference)),
    }
}

/// True if following depends_on from `from` reaches `needle`
///
/// Stops at the origin, at a dangling pointer, or when a node repeats.
fn chain_reaches(instrument: &Instrument, from: NodeId, needle: NodeId) -> bool {
    let mut visited = BTreeSet::new();
    let mut current = Some(from);
    while let Some(id) = current {
        if id == needle {
            return true;
        }
        if !visited.insert(id) || !instrument.store().contains(id) {
            return false;
        }
        current = stored_reference(instrument, id)
            .ok()
            .and_then(|r| r.target());
    }
    false
}

/// Re-apply the stored pointer of `owner` during a registry rebuild
///
/// Legacy path strings are rewritten as typed references. Dangling pointers are
/// left in place and skipped; [`crate::rules::validation`] reports them.
/// Returns whether an edge was registered.
pub(crate) fn reapply_stored(instrument: &mut Instrument, owner: NodeId) -> Result<bool> {
    let slot = slot_for(instrument, owner)?;
    let raw = stored_value(instrument, owner, slot)?;

    let reference = match stored_reference(instrument, owner) {
        Ok(reference) => reference,
        Err(NexconError::DanglingReference { target, .. }) => {
            tracing::warn!(
                node_path = %owner_path(instrument, owner),
                target_path = %target,
                "skipping dangling depends_on during rebuild"
            );
            return Ok(false);
        }
        Err(e) => return Err(e),
    };

    if matches!(raw, Some(Value::Str(_))) {
        write_slot(instrument, owner, slot, reference)?;
    }

    match reference.target() {
        Some(target) if instrument.store().contains(target) => {
            Ok(instrument.registry_mut().register(target, owner))
        }
        Some(target) => {
            tracing::warn!(
                node_path = %owner_path(instrument, owner),
                target = %target,
                "skipping dangling depends_on during rebuild"
            );
            Ok(false)
        }
        None => Ok(false),
    }
}

fn owner_path(instrument: &Instrument, owner: NodeId) -> String {
    instrument
        .store()
        .absolute_path(owner)
        .unwrap_or_else(|_| owner.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Vector3;

    fn detector_with_rotation() -> (Instrument, crate::model::Component, Transform) {
        let mut inst = Instrument::new();
        let det = inst
            .create_component("detector", "NXdetector", "")
            .unwrap();
        let rot = det
            .add_rotation(&mut inst, Vector3::new(0.0, 0.0, 1.0), 90.0, None, None)
            .unwrap();
        (inst, det, rot)
    }

    #[test]
    fn test_missing_pointer_is_origin() {
        let (inst, det, rot) = detector_with_rotation();
        assert_eq!(stored_reference(&inst, det.id()).unwrap(), DependsOn::Origin);
        assert_eq!(resolve_depends_on(&inst, rot.id()).unwrap(), None);
    }

    #[test]
    fn test_set_moves_registry_edge() {
        let (mut inst, det, rot) = detector_with_rotation();
        let tr = det
            .add_translation(&mut inst, Vector3::new(1.0, 0.0, 0.0), None, None)
            .unwrap();

        set_depends_on(&mut inst, det.id(), Some(rot)).unwrap();
        assert!(inst.registry().dependents_of(rot.id()).contains(&det.id()));

        set_depends_on(&mut inst, det.id(), Some(tr)).unwrap();
        assert!(!inst.registry().has_dependents(rot.id()));
        assert!(inst.registry().dependents_of(tr.id()).contains(&det.id()));

        set_depends_on(&mut inst, det.id(), None).unwrap();
        assert_eq!(inst.registry().edge_count(), 0);
        assert_eq!(stored_reference(&inst, det.id()).unwrap(), DependsOn::Origin);
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let (mut inst, _det, rot) = detector_with_rotation();
        let err = set_depends_on(&mut inst, rot.id(), Some(rot)).unwrap_err();
        assert!(matches!(err, NexconError::CycleDetected { .. }));
        assert_eq!(inst.registry().edge_count(), 0);
    }

    #[test]
    fn test_two_node_cycle_rejected_without_writes() {
        let (mut inst, det, rot) = detector_with_rotation();
        let tr = det
            .add_translation(&mut inst, Vector3::new(1.0, 0.0, 0.0), None, Some(rot))
            .unwrap();
        inst.take_events();

        let err = set_depends_on(&mut inst, rot.id(), Some(tr)).unwrap_err();

        assert!(matches!(err, NexconError::CycleDetected { .. }));
        assert!(inst.take_events().is_empty());
        assert_eq!(resolve_depends_on(&inst, rot.id()).unwrap(), None);
    }

    #[test]
    fn test_target_must_be_transform() {
        let (mut inst, det, rot) = detector_with_rotation();
        let bogus = Transform::from_id(det.id());
        let err = set_depends_on(&mut inst, rot.id(), Some(bogus)).unwrap_err();
        assert!(matches!(err, NexconError::WrongNodeKind { .. }));
    }

    #[test]
    fn test_legacy_string_resolved() {
        let (mut inst, det, rot) = detector_with_rotation();
        let path = rot.absolute_path(&inst).unwrap();
        inst.store_mut()
            .set_field(det.id(), DEPENDS_ON, Value::Str(path))
            .unwrap();

        assert_eq!(resolve_depends_on(&inst, det.id()).unwrap(), Some(rot));
        assert!(reapply_stored(&mut inst, det.id()).unwrap());
        assert_eq!(
            inst.store().get_field(det.id(), DEPENDS_ON).unwrap(),
            Some(&Value::Reference(DependsOn::Node(rot.id())))
        );
    }

    #[test]
    fn test_dangling_legacy_string() {
        let (mut inst, det, _rot) = detector_with_rotation();
        inst.store_mut()
            .set_field(det.id(), DEPENDS_ON, "/entry/nowhere".into())
            .unwrap();

        let err = resolve_depends_on(&inst, det.id()).unwrap_err();
        assert!(matches!(err, NexconError::DanglingReference { .. }));
        assert!(!reapply_stored(&mut inst, det.id()).unwrap());
    }
}
