pub mod convert;
pub mod npy;

use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "rnaprep")]
#[command(about = "Prepare RNA structure and chemical probing datasets")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Convert(convert::ConvertArgs),
    Npy(npy::NpyArgs),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Convert(args) => convert::run(args),
        Commands::Npy(args) => npy::run(args),
    }
}

/// Explicit config file, else the environment.
fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_json_file(path)
            .with_context(|| format!("failed to read config {}", path.display())),
        None => Ok(Config::from_env()),
    }
}
