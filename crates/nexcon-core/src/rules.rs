//! Document invariants and validation

pub mod invariants;
pub mod validation;
