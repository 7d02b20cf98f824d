//! Chain resolution over depends_on pointers

pub mod chain;

pub use chain::{resolve_chain, ChainScope};
