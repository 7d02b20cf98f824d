use std::collections::BTreeSet;

use crate::errors::{NexconError, Result};
use crate::model::{Component, Transform};
use crate::ops::Instrument;

/// How far a chain walk may go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainScope {
    /// Follow depends_on across component boundaries to the origin
    Full,
    /// Stop at the first transform not owned by this component
    LocalTo(Component),
}

/// Resolve the ordered chain of transforms starting at `start`
///
/// Follows depends_on pointers from `start` until the origin, nearest transform
/// first. Under [`ChainScope::LocalTo`] the walk stops (excluding the
/// transform) at the first transform outside the component's transformations
/// group.
///
/// # Arguments
/// * `instrument` - The instrument holding the store
/// * `start` - First transform of the chain; `None` yields an empty chain
/// * `scope` - Whether to cross component boundaries
///
/// # Errors
/// * `DanglingReference` - a pointer names a missing node
/// * `WrongNodeKind` - a pointer names a node that is not a transform
/// * `CycleDetected` - a transform is reached twice
pub fn resolve_chain(
    instrument: &Instrument,
    start: Option<Transform>,
    scope: ChainScope,
) -> Result<Vec<Transform>> {
    let mut chain = Vec::new();
    let mut visited = BTreeSet::new();
    let mut current = start;

    while let Some(transform) = current {
        if let ChainScope::LocalTo(component) = scope {
            if transform.owner(instrument)? != component {
                break;
            }
        }

        if !visited.insert(transform.id()) {
            return Err(NexconError::CycleDetected {
                path: transform.absolute_path(instrument)?,
            });
        }

        chain.push(transform);
        current = transform.depends_on(instrument)?;
    }

    tracing::debug!(chain_len = chain.len(), scope = ?scope, "chain resolved");
    Ok(chain)
}
