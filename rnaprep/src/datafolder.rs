//! On-disk layout of one converted dataset and the conversion pipeline.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::analysis::roc::save_auroc_values;
use crate::data_handling::bpseq::BpseqDataset;
use crate::data_handling::ct::CtDataset;
use crate::data_handling::dreem_output::{experiment_metadata, DreemOutputDataset};
use crate::data_handling::fasta::FastaDataset;
use crate::data_handling::json_dump::JsonDataset;
use crate::data_handling::{reference_from_path, Prediction};
use crate::error::{Error, Result};
use crate::filter::{FilterConfig, FilterReport, FilterStep};
use crate::list_datapoints::ListOfDatapoints;
use crate::models::{Dataset, Format, Origin, Provides};
use crate::prediction_tools::StructurePredictor;

/// `<root>/<name>/` and the files inside it.
#[derive(Debug, Clone, PartialEq)]
pub struct Datafolder {
    pub name: String,
    pub root: PathBuf,
}

impl Datafolder {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.root.join(&self.name)
    }

    pub fn data_json(&self) -> PathBuf {
        self.path().join("data.json")
    }

    pub fn info_json(&self) -> PathBuf {
        self.path().join("info.json")
    }

    pub fn readme(&self) -> PathBuf {
        self.path().join("README.md")
    }

    pub fn conversion_report(&self) -> PathBuf {
        self.path().join("conversion_report.md")
    }

    pub fn auroc_csv(&self) -> PathBuf {
        self.path().join("auroc.csv")
    }

    pub fn source_dir(&self) -> PathBuf {
        self.path().join("source")
    }

    pub fn make(&self) -> Result<()> {
        fs::create_dir_all(self.source_dir())?;
        Ok(())
    }

    /// Copies the input file, or the top-level files of an input folder, into `source/`.
    pub fn copy_source(&self, input: &Path) -> Result<()> {
        let target = self.source_dir();
        if input.is_dir() {
            for entry in fs::read_dir(input)? {
                let path = entry?.path();
                if let (true, Some(name)) = (path.is_file(), path.file_name()) {
                    fs::copy(&path, target.join(name))?;
                }
            }
        } else if let Some(name) = input.file_name() {
            fs::copy(input, target.join(name))?;
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Info file and README
// ─────────────────────────────────────────────────────────────────────────────

fn describe(origin: Origin, format: Format, what: &str) -> Option<(&'static str, String)> {
    match origin {
        Origin::Absent => None,
        Origin::Source if format == Format::Seismic => Some((
            "source",
            format!("Measured experimentally, {what} normalized by the 97.5th percentile."),
        )),
        Origin::Source => Some(("source", "Read from source.".to_string())),
        Origin::Predicted => Some(("RNAstructure", "Predicted using RNAstructure.".to_string())),
    }
}

/// Contents of `info.json`: dataset name, source, where the structure and
/// DMS columns come from, experiment metadata and the filtering report.
pub fn info(
    name: &str,
    format: Format,
    input: &Path,
    provides: Provides,
    metadata: Map<String, Value>,
    filtering_report: Option<&str>,
) -> Map<String, Value> {
    let mut info = Map::new();
    info.insert("name".to_string(), Value::from(name));
    let file_name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    info.insert(
        "source".to_string(),
        Value::from(format!("`{}` ({} format)", file_name, format.name())),
    );
    for (key, value) in metadata {
        info.entry(key).or_insert(value);
    }
    if let Some((from, about)) = describe(provides.structure, format, "structure") {
        info.insert("structure".to_string(), Value::from(from));
        info.insert("about structure".to_string(), Value::from(about));
    }
    if let Some((from, about)) = describe(provides.dms, format, "mutation rates") {
        info.insert("DMS".to_string(), Value::from(from));
        info.insert("about DMS".to_string(), Value::from(about));
    }
    if let Some(report) = filtering_report {
        info.insert("filtering_report".to_string(), Value::from(report));
    }
    info
}

const README_HIDDEN_KEYS: [&str; 6] = [
    "name",
    "structure",
    "about structure",
    "DMS",
    "about DMS",
    "filtering_report",
];

pub fn readme(info: &Map<String, Value>) -> String {
    let name = info.get("name").and_then(Value::as_str).unwrap_or_default();
    let mut text = format!("---\npretty_name: {name}\ntags:\n  - chemistry\n  - biology\n---\n\n# {name}\n");

    for (key, value) in info.iter().filter(|(k, _)| !README_HIDDEN_KEYS.contains(&k.as_str())) {
        let value = value.as_str().map_or_else(|| value.to_string(), str::to_string);
        let _ = writeln!(text, "\t{key}: {value}");
    }

    text.push_str("\n\tData types:");
    for (column, about) in [("structure", "about structure"), ("DMS", "about DMS")] {
        if let Some(about) = info.get(about).and_then(Value::as_str) {
            let _ = write!(text, "\n\t- {column} ({about})");
        }
    }
    if let Some(report) = info.get("filtering_report").and_then(Value::as_str) {
        let _ = write!(text, "\n\n\tFiltering report: \n\t{report}");
    }
    text.push('\n');
    text
}

/// `conversion_report.md`: the filtering report, then the groups of
/// records that share a sequence.
pub fn conversion_report(report: &FilterReport) -> String {
    let mut text = format!("# Conversion report\n\n{report}\n");
    if !report.conflicts.is_empty() {
        text.push_str("\n## Sequences with conflicting data\n\n");
        for conflict in &report.conflicts {
            let _ = writeln!(
                text,
                "- {}: {}",
                conflict.sequence,
                conflict.references.join(", ")
            );
        }
    }
    text
}

// ─────────────────────────────────────────────────────────────────────────────
// Conversion
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub format: Format,
    pub input: PathBuf,
    /// Defaults to the input file name up to its first `.`.
    pub name: Option<String>,
    pub output_root: PathBuf,
    pub prediction: Prediction,
    /// `None` only drops the invalid candidates.
    pub filter: Option<FilterConfig>,
    pub generate_npy: bool,
}

impl ConvertOptions {
    pub fn new(format: Format, input: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            format,
            input: input.into(),
            name: None,
            output_root: output_root.into(),
            prediction: Prediction::default(),
            filter: Some(FilterConfig::default()),
            generate_npy: false,
        }
    }

    pub fn name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| reference_from_path(&self.input))
    }

    pub fn dataset(&self) -> Box<dyn Dataset> {
        let input = self.input.as_path();
        match self.format {
            Format::Fasta => Box::new(FastaDataset::new(input).with_prediction(self.prediction)),
            Format::Ct => Box::new(CtDataset {
                predict_dms: self.prediction.dms,
                ..CtDataset::new(vec![input.to_path_buf()])
            }),
            Format::Bpseq => Box::new(BpseqDataset::new(vec![input.to_path_buf()])),
            Format::Json => Box::new(JsonDataset {
                predict_structure: self.prediction.structure,
                ..JsonDataset::new(input)
            }),
            Format::Seismic => Box::new(DreemOutputDataset {
                predict_structure: self.prediction.structure,
                ..DreemOutputDataset::new(input)
            }),
        }
    }
}

#[derive(Debug)]
pub struct Conversion {
    pub datafolder: Datafolder,
    pub datapoints: ListOfDatapoints,
    pub report: FilterReport,
}

/// Loads, filters and writes one dataset into its datafolder.
pub fn convert(
    options: &ConvertOptions,
    predictor: Option<&dyn StructurePredictor>,
) -> Result<Conversion> {
    if !options.input.exists() {
        return Err(Error::MissingInput(options.input.clone()));
    }
    let datafolder = Datafolder::new(options.name(), &options.output_root);
    datafolder.make()?;
    info!("Converting {} into {}", options.input.display(), datafolder.path().display());

    // 1) load
    let dataset = options.dataset();
    let mut datapoints = dataset.load(predictor)?;

    // 2) filter
    let config = options.filter.clone().unwrap_or_else(|| FilterConfig {
        steps: vec![FilterStep::DropInvalid],
        ..FilterConfig::default()
    });
    let report = datapoints.filter_with(&config).clone();
    info!("\n{}", report);
    if !report.auroc_scores.is_empty() {
        save_auroc_values(&datafolder.auroc_csv(), &report.auroc_scores)?;
    }
    fs::write(datafolder.conversion_report(), conversion_report(&report))?;

    // 3) data and metadata
    datapoints.to_json(&datafolder.data_json())?;
    datafolder.copy_source(&options.input)?;

    let metadata = match options.format {
        Format::Seismic => experiment_metadata(&options.input).unwrap_or_else(|e| {
            warn!("Could not read experiment metadata: {}", e);
            Map::new()
        }),
        _ => Map::new(),
    };
    let report_text = report.to_string();
    let info = info(
        &datafolder.name,
        options.format,
        &options.input,
        dataset.provides(),
        metadata,
        Some(&report_text),
    );
    fs::write(datafolder.info_json(), serde_json::to_string_pretty(&info)?)?;
    fs::write(datafolder.readme(), readme(&info))?;

    // 4) arrays
    if options.generate_npy {
        datapoints.to_npy(&datafolder.path())?;
    }

    info!("Datafolder {} ready with {} datapoints", datafolder.name, datapoints.len());
    Ok(Conversion {
        datafolder,
        datapoints,
        report,
    })
}
