//! Init command
//!
//! Usage: nexcon init <DOC> [--force]

use clap::Args;
use nexcon_core::Instrument;
use std::path::PathBuf;

use crate::document;

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Document file to create
    pub doc: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

/// Execute init command
pub fn execute(args: InitArgs) -> Result<(), Box<dyn std::error::Error>> {
    if args.doc.exists() && !args.force {
        return Err(format!("{} already exists (use --force)", args.doc.display()).into());
    }

    document::save(&Instrument::new(), &args.doc)?;
    println!("✓ Created {}", args.doc.display());
    Ok(())
}
