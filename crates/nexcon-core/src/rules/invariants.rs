use std::collections::BTreeSet;

use crate::errors::NexconError;
use crate::model::{classify, EntityKind};
use crate::ops::{depends_on_ops, Instrument};
use crate::store::{DependsOn, NodeId};

/// Every node that carries a depends_on pointer, in tree order
pub fn depends_on_owners(instrument: &Instrument) -> Vec<NodeId> {
    let store = instrument.store();
    store
        .walk(store.root())
        .unwrap_or_default()
        .into_iter()
        .filter(|id| {
            classify(store, *id)
                .ok()
                .flatten()
                .map(|k| k.has_depends_on())
                .unwrap_or(false)
        })
        .collect()
}

/// Check if following depends_on from `start` revisits a node
pub fn has_cycle(instrument: &Instrument, start: NodeId) -> bool {
    let mut visited = BTreeSet::new();
    let mut current = Some(start);

    while let Some(id) = current {
        if !visited.insert(id) {
            return true;
        }
        if !instrument.store().contains(id) {
            break;
        }
        current = depends_on_ops::stored_reference(instrument, id)
            .ok()
            .and_then(|r| r.target());
    }

    false
}

/// Find pointers whose target does not exist
///
/// Returns list of (owner_path, target) tuples
pub fn find_dangling_references(instrument: &Instrument) -> Vec<(String, String)> {
    let store = instrument.store();
    let mut dangling = Vec::new();

    for owner in depends_on_owners(instrument) {
        match depends_on_ops::stored_reference(instrument, owner) {
            Err(NexconError::DanglingReference { owner, target }) => {
                dangling.push((owner, target));
            }
            Ok(DependsOn::Node(target)) if !store.contains(target) => {
                let owner = store.absolute_path(owner).unwrap_or_default();
                dangling.push((owner, target.to_string()));
            }
            _ => {}
        }
    }

    dangling
}

/// Find pointers whose target exists but is not a transform
///
/// Returns list of (owner_path, target_path) tuples
pub fn find_non_transform_targets(instrument: &Instrument) -> Vec<(String, String)> {
    let store = instrument.store();
    let mut wrong = Vec::new();

    for owner in depends_on_owners(instrument) {
        let Ok(DependsOn::Node(target)) = depends_on_ops::stored_reference(instrument, owner)
        else {
            continue;
        };
        if !store.contains(target) {
            continue; // handled by find_dangling_references
        }
        let is_transform = classify(store, target)
            .ok()
            .flatten()
            .map(|k| k.is_transform())
            .unwrap_or(false);
        if !is_transform {
            wrong.push((
                store.absolute_path(owner).unwrap_or_default(),
                store.absolute_path(target).unwrap_or_default(),
            ));
        }
    }

    wrong
}

/// Find transformations groups with no children
pub fn find_empty_transformation_groups(instrument: &Instrument) -> Vec<String> {
    let store = instrument.store();
    store
        .walk(store.root())
        .unwrap_or_default()
        .into_iter()
        .filter(|id| {
            matches!(
                classify(store, *id),
                Ok(Some(EntityKind::TransformationsGroup))
            )
        })
        .filter(|id| store.children_of(*id).map(<[_]>::is_empty).unwrap_or(false))
        .filter_map(|id| store.absolute_path(id).ok())
        .collect()
}

/// Edges the registry should hold, derived from the stored pointers
pub fn derive_edges(instrument: &Instrument) -> BTreeSet<(NodeId, NodeId)> {
    depends_on_owners(instrument)
        .into_iter()
        .filter_map(|owner| {
            let target = depends_on_ops::stored_reference(instrument, owner)
                .ok()?
                .target()?;
            instrument
                .store()
                .contains(target)
                .then_some((target, owner))
        })
        .collect()
}

/// Find edges present in only one of the registry and the stored pointers
///
/// Returns list of (target, dependent) tuples
pub fn find_registry_mismatches(instrument: &Instrument) -> Vec<(NodeId, NodeId)> {
    let expected = derive_edges(instrument);
    let actual: BTreeSet<(NodeId, NodeId)> = instrument.registry().edges().collect();
    expected.symmetric_difference(&actual).copied().collect()
}
