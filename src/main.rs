//! Command-line entry point for the spot proximity classifier.

mod cli;

use anyhow::Result;
use clap::Parser;
use log::info;

use cli::{run_cli, Cli};

/// Main function: parses arguments and runs the classification workflow.
fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    // Configure Rayon thread pool (0 = let rayon pick).
    rayon::ThreadPoolBuilder::new()
        .num_threads(cli.threads)
        .build_global()?;
    info!("Starting spot proximity classification: {:?}", cli.input);

    run_cli(cli)
}
