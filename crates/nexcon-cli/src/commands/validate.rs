//! Validate command
//!
//! Usage: nexcon validate <DOC>

use clap::Args;
use std::path::PathBuf;

use crate::document;

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Document file
    pub doc: PathBuf,
}

/// Execute validate command
pub fn execute(args: ValidateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let instrument = document::load(&args.doc)?;
    instrument.validate()?;
    println!(
        "✓ {} is valid ({} components, {} dependency edges)",
        args.doc.display(),
        instrument.get_component_list()?.len(),
        instrument.registry().edge_count()
    );
    Ok(())
}
