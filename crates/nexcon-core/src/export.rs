//! FileWriter JSON export
//!
//! Builds the `nexus_structure` tree mirroring the store and wraps it in the
//! `FileWriter_new` / `FileWriter_stop` commands understood by the remote
//! file writer.

pub mod nexus_structure;
pub mod writer_commands;

pub use nexus_structure::{nexus_structure, LinkTarget};
pub use writer_commands::{writer_commands, StopCommand, WriteCommand, WriterOptions};
