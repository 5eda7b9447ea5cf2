//! binphi: optimal binning CLI tool

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use binphi::cli::{run_fit, run_transform, Cli, Commands};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "binphi=warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Fit(args) => run_fit(args),
        Commands::Transform(args) => run_transform(args),
    }
}
