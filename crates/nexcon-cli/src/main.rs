//! Nexcon CLI
//!
//! Command-line interface for instrument geometry documents

use clap::{Parser, Subcommand};
use nexcon_core::logging_facility;
use nexcon_core_types::RequestContext;
use std::path::PathBuf;

mod commands;
mod config;
mod document;

use config::Settings;

#[derive(Debug, Parser)]
#[command(name = "nexcon")]
#[command(about = "Nexcon - instrument geometry documents", long_about = None)]
struct Cli {
    /// Settings file (default: ./nexcon.yaml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Write an empty instrument document
    Init(commands::init::InitArgs),
    /// List components with their classes
    Components(commands::components::ComponentsArgs),
    /// Print the transform chain of a component
    Chain(commands::chain::ChainArgs),
    /// Check document invariants
    Validate(commands::validate::ValidateArgs),
    /// Apply a JSON command to a document
    Apply(commands::apply::ApplyArgs),
    /// Produce a FileWriter write command
    Export(commands::export::ExportArgs),
}

fn main() {
    let cli = Cli::parse();

    let settings = match Settings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };
    logging_facility::init(settings.logging);

    let ctx = RequestContext::new().with_origin("cli");
    let _span = tracing::info_span!("cli", request_id = %ctx.request_id).entered();

    let result = match cli.command {
        Commands::Init(args) => commands::init::execute(args),
        Commands::Components(args) => commands::components::execute(args),
        Commands::Chain(args) => commands::chain::execute(args),
        Commands::Validate(args) => commands::validate::execute(args),
        Commands::Apply(args) => commands::apply::execute(args),
        Commands::Export(args) => commands::export::execute(args, &settings),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
