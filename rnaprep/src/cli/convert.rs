use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use crate::data_handling::Prediction;
use crate::datafolder::{convert, ConvertOptions};
use crate::filter::{DualSignalPolicy, FilterConfig, DEFAULT_MIN_AUROC};
use crate::models::Format;
use crate::prediction_tools::rnastructure::RnaStructure;
use crate::prediction_tools::StructurePredictor;

#[derive(Args, Debug)]
#[command(about = "Convert an input file or folder into a filtered datafolder")]
pub struct ConvertArgs {
    /// Input format
    #[arg(value_enum)]
    pub format: Format,

    /// Input file, or folder of ct / bpseq files
    pub input: PathBuf,

    /// Datafolder name (defaults to the input file name)
    #[arg(short, long)]
    pub name: Option<String>,

    /// Root directory for datafolders (defaults to DATA_FOLDER)
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Predict missing structures with RNAstructure
    #[arg(long)]
    pub predict_structure: bool,

    /// Use RNAstructure pairing probabilities as DMS signal
    #[arg(long)]
    pub predict_dms: bool,

    /// Only drop invalid records, skip the other filters
    #[arg(long)]
    pub no_filter: bool,

    /// Records whose signal scores below this AUROC are dropped
    #[arg(long, default_value_t = DEFAULT_MIN_AUROC)]
    pub min_auroc: f64,

    /// Handling of records with both a DMS and a SHAPE signal
    #[arg(long, value_enum, default_value_t = DualSignalPolicy::Exempt)]
    pub dual_signal: DualSignalPolicy,

    /// Score DMS on A and C bases only
    #[arg(long)]
    pub dms_ac_only: bool,

    /// Also write the NumPy arrays
    #[arg(long)]
    pub npy: bool,
}

impl ConvertArgs {
    fn filter_config(&self) -> Option<FilterConfig> {
        (!self.no_filter).then(|| FilterConfig {
            min_auroc: self.min_auroc,
            dual_signal: self.dual_signal,
            dms_ac_only: self.dms_ac_only,
            ..FilterConfig::default()
        })
    }
}

pub fn run(args: ConvertArgs) -> Result<()> {
    let config = super::load_config(args.config.as_deref())?;

    let prediction = Prediction {
        structure: args.predict_structure,
        dms: args.predict_dms,
    };
    let predictor = if prediction.any() {
        Some(RnaStructure::from_config(&config).context("structure prediction needs RNAstructure")?)
    } else {
        None
    };

    let options = ConvertOptions {
        name: args.name.clone(),
        prediction,
        filter: args.filter_config(),
        generate_npy: args.npy,
        ..ConvertOptions::new(
            args.format,
            &args.input,
            args.out.clone().unwrap_or_else(|| config.data_folder.clone()),
        )
    };

    let conversion = convert(
        &options,
        predictor.as_ref().map(|p| p as &dyn StructurePredictor),
    )
    .with_context(|| format!("failed to convert {}", args.input.display()))?;

    info!(
        "Wrote {} datapoints to {}",
        conversion.datapoints.len(),
        conversion.datafolder.path().display()
    );
    println!("{}", conversion.report);
    Ok(())
}
