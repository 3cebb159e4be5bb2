use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use crate::list_datapoints::ListOfDatapoints;

#[derive(Args, Debug)]
#[command(about = "Write the NumPy arrays of a datafolder's data.json")]
pub struct NpyArgs {
    /// A data.json file, or the datafolder holding it
    pub input: PathBuf,

    /// Output directory (defaults to the folder of data.json)
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

pub fn run(args: NpyArgs) -> Result<()> {
    let data_json = if args.input.is_dir() {
        args.input.join("data.json")
    } else {
        args.input.clone()
    };
    let out = match args.out {
        Some(out) => out,
        None => data_json
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".")),
    };

    let datapoints = ListOfDatapoints::from_json(&data_json)
        .with_context(|| format!("failed to read {}", data_json.display()))?;
    let written = datapoints
        .to_npy(&out)
        .with_context(|| format!("failed to write arrays to {}", out.display()))?;

    info!("Wrote {} arrays for {} datapoints", written.len(), datapoints.len());
    Ok(())
}
