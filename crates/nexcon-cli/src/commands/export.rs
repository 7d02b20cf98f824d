//! Export command
//!
//! Usage: nexcon export <DOC> [--output <FILE>] [--file-name <NXS>] [--broker <HOST:PORT>]
//!        [--streams <JSON>] [--links <JSON>] [--job-id <ID>]

use clap::Args;
use nexcon_core::export::{nexus_structure, writer_commands, LinkTarget, WriterOptions};
use serde_json::Value as Json;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::Settings;
use crate::document;

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Document file
    pub doc: PathBuf,

    /// Output file path (default: stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// NeXus file name for the writer (default: from settings)
    #[arg(long)]
    pub file_name: Option<String>,

    /// Broker address (default: from settings)
    #[arg(long)]
    pub broker: Option<String>,

    /// JSON object of stream settings keyed by group path; overrides the document's streams
    #[arg(long)]
    pub streams: Option<PathBuf>,

    /// JSON object of `{name, target}` links keyed by group path; overrides the document's links
    #[arg(long)]
    pub links: Option<PathBuf>,

    /// Job id (default: generated)
    #[arg(long)]
    pub job_id: Option<String>,
}

/// Execute export command
pub fn execute(args: ExportArgs, settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let instrument = document::load(&args.doc)?;

    // Entries from the flag files override the document's own
    let mut streams = instrument.get_streams()?;
    streams.extend(read_map::<Json>(args.streams.as_deref())?);
    let mut links = instrument.get_links()?;
    links.extend(read_map::<LinkTarget>(args.links.as_deref())?);
    let structure = nexus_structure(&instrument, &streams, &links)?;

    let options = WriterOptions {
        broker: args.broker.unwrap_or_else(|| settings.broker.clone()),
        job_id: args.job_id.unwrap_or_default(),
        ..WriterOptions::default()
    };
    let file_name = args
        .file_name
        .unwrap_or_else(|| settings.output_file_name.clone());
    let (write, _stop) = writer_commands(structure, &file_name, &options);
    let json = serde_json::to_string_pretty(&write)?;

    if let Some(output_path) = args.output {
        std::fs::write(&output_path, json)?;
        println!("✓ Exported to {} (job {})", output_path.display(), write.job_id);
    } else {
        println!("{}", json);
    }
    Ok(())
}

fn read_map<T: serde::de::DeserializeOwned>(
    path: Option<&Path>,
) -> Result<BTreeMap<String, T>, Box<dyn std::error::Error>> {
    match path {
        None => Ok(BTreeMap::new()),
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
            Ok(serde_json::from_str(&text)?)
        }
    }
}
