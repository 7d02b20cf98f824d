//! Chain command
//!
//! Usage: nexcon chain <DOC> <COMPONENT_PATH> [--local]

use clap::Args;
use std::path::PathBuf;

use crate::document;

#[derive(Debug, Args)]
pub struct ChainArgs {
    /// Document file
    pub doc: PathBuf,

    /// Absolute path of the component
    pub component: String,

    /// Only the transforms owned by the component
    #[arg(long)]
    pub local: bool,

    /// Print the chain as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute chain command, nearest transform first
pub fn execute(args: ChainArgs) -> Result<(), Box<dyn std::error::Error>> {
    let instrument = document::load(&args.doc)?;
    let component = instrument.component_at(&args.component)?;

    let chain = if args.local {
        component.transforms(&instrument)?
    } else {
        component.transforms_full_chain(&instrument)?
    };
    let snapshots = chain
        .iter()
        .map(|t| t.describe(&instrument))
        .collect::<Result<Vec<_>, _>>()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshots)?);
        return Ok(());
    }

    for s in snapshots {
        println!(
            "{}\t{}\t{} {}\t[{}, {}, {}]",
            s.path, s.kind, s.magnitude, s.units, s.vector.x, s.vector.y, s.vector.z
        );
    }
    Ok(())
}
