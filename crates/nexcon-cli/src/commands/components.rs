//! Components command
//!
//! Usage: nexcon components <DOC>

use clap::Args;
use std::path::PathBuf;

use crate::document;

#[derive(Debug, Args)]
pub struct ComponentsArgs {
    /// Document file
    pub doc: PathBuf,
}

/// Execute components command: one `<path>\t<class>` line per component
pub fn execute(args: ComponentsArgs) -> Result<(), Box<dyn std::error::Error>> {
    let instrument = document::load(&args.doc)?;

    for component in instrument.get_component_list()? {
        println!(
            "{}\t{}",
            component.absolute_path(&instrument)?,
            component.nx_class(&instrument)?
        );
    }
    Ok(())
}
