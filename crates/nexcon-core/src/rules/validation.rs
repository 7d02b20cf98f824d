use crate::errors::{NexconError, Result};
use crate::ops::Instrument;

use super::invariants;

/// Validate the whole instrument document
///
/// Runs all invariant checks and returns an error if any violations are found:
///
/// 1. Every depends_on pointer names an existing node
/// 2. Every target is a transform
/// 3. No depends_on chain revisits a node
/// 4. No transformations group is empty
/// 5. The dependency registry matches the stored pointers
///
/// # Errors
/// Returns the first violation encountered. For exhaustive reporting, call the
/// individual invariant functions directly.
pub fn validate_instrument(instrument: &Instrument) -> Result<()> {
    let store = instrument.store();

    if let Some((owner, target)) = invariants::find_dangling_references(instrument).first() {
        return Err(NexconError::DanglingReference {
            owner: owner.clone(),
            target: target.clone(),
        });
    }

    if let Some((owner, _target)) = invariants::find_non_transform_targets(instrument).first() {
        return Err(NexconError::WrongNodeKind {
            path: owner.clone(),
            expected: "component or transform pointing at a transform".to_string(),
        });
    }

    for owner in invariants::depends_on_owners(instrument) {
        if invariants::has_cycle(instrument, owner) {
            return Err(NexconError::CycleDetected {
                path: store.absolute_path(owner)?,
            });
        }
    }

    if let Some(path) = invariants::find_empty_transformation_groups(instrument).first() {
        return Err(NexconError::InvariantViolation {
            reason: format!("transformations group {} has no transforms", path),
        });
    }

    if let Some((target, dependent)) = invariants::find_registry_mismatches(instrument).first() {
        return Err(NexconError::InvariantViolation {
            reason: format!(
                "registry out of step with depends_on: {} -> {}",
                store.absolute_path(*dependent)?,
                store.absolute_path(*target)?
            ),
        });
    }

    Ok(())
}
