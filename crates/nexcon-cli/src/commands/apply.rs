//! Apply command
//!
//! Usage: nexcon apply <DOC> <COMMAND_JSON>
//!
//! `COMMAND_JSON` is a file holding one command, for example
//! `{"command":"create_component","name":"detector","nx_class":"NXdetector"}`.

use clap::Args;
use nexcon_core::Command;
use std::path::PathBuf;

use crate::document;

#[derive(Debug, Args)]
pub struct ApplyArgs {
    /// Document file, rewritten on success
    pub doc: PathBuf,

    /// File holding the command as JSON
    pub command: PathBuf,
}

/// Execute apply command
pub fn execute(args: ApplyArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut instrument = document::load(&args.doc)?;
    let text = std::fs::read_to_string(&args.command)
        .map_err(|e| format!("cannot read {}: {}", args.command.display(), e))?;
    let command: Command = serde_json::from_str(&text)?;

    let outcome = nexcon_core::apply(&mut instrument, command)?;
    document::save(&instrument, &args.doc)?;

    println!("✓ {} ({} changes)", outcome.path, outcome.events.len());
    Ok(())
}
