//! Nexcon Core - instrument geometry model
//!
//! This crate provides the in-memory model behind an instrument editor:
//! - A hierarchical attributed store (groups, datasets, attributes) with a
//!   typed change journal
//! - Components and transforms (translations, rotations) as typed handles
//! - `depends_on` pointers with an incrementally maintained dependency registry
//! - Chain resolution from a component back to the origin, with cycle detection
//! - Document invariants, an atomic command surface, and FileWriter JSON export

pub mod apply;
pub mod commands;
pub mod errors;
pub mod export;
pub mod logging_facility;
pub mod model;
pub mod ops;
pub mod registry;
pub mod rules;
pub mod store;
pub mod traversal;

pub use nexcon_core_types as core_types;

// Re-export commonly used types
pub use apply::apply;
pub use commands::{Command, CommandOutcome};
pub use errors::{ExError, ExErrorKind, NexconError, Result};
pub use model::{Component, Transform, TransformKind, TransformSnapshot, Vector3};
pub use ops::Instrument;
pub use registry::DependencyRegistry;
pub use store::{ChangeEvent, DependsOn, NodeId, Store, Value};
pub use traversal::{resolve_chain, ChainScope};
