pub mod bpseq;
pub mod ct;
pub mod dreem_output;
pub mod fasta;
pub mod json_dump;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::datapoint::RawDatapoint;
use crate::error::{Error, Result};
use crate::prediction_tools::StructurePredictor;

/// What a loader should ask the structure predictor for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Prediction {
    pub structure: bool,
    /// Pairing probabilities stored as the DMS signal.
    pub dms: bool,
}

impl Prediction {
    pub fn any(self) -> bool {
        self.structure || self.dms
    }
}

/// Fills the predicted fields of a candidate. Candidates that will be
/// rejected anyway are left untouched and the predictor is not called.
pub(crate) fn apply_prediction(
    raw: &mut RawDatapoint,
    prediction: Prediction,
    predictor: Option<&dyn StructurePredictor>,
) -> Result<()> {
    if !prediction.any() || raw.reference.as_deref().map_or(true, str::is_empty) {
        return Ok(());
    }
    let Some(sequence) = raw.normalized_sequence() else {
        return Ok(());
    };
    if !raw.signals_match(&sequence) {
        debug!("{:?}: signal length differs from sequence, not predicted", raw.reference);
        return Ok(());
    }

    if prediction.structure && raw.structure.is_none() && raw.dotbracket.is_none() {
        let predictor = predictor.ok_or(Error::PredictorRequired("structure"))?;
        raw.dotbracket = Some(predictor.predict_structure(&sequence, raw.dms.as_deref())?);
    }
    if prediction.dms && raw.dms.is_none() {
        let predictor = predictor.ok_or(Error::PredictorRequired("dms"))?;
        let probabilities = predictor.predict_pairing_probabilities(&sequence, None)?;
        if probabilities.len() != sequence.len() {
            return Err(Error::SignalLength {
                sequence: sequence.len(),
                signal: probabilities.len(),
            });
        }
        raw.dms = Some(probabilities);
    }
    Ok(())
}

/// Expands folders into the files they hold with the given extension, in
/// sorted order. Plain files are kept whatever their extension.
pub(crate) fn collect_files(paths: &[PathBuf], extension: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if !path.exists() {
            return Err(Error::MissingInput(path.clone()));
        }
        if path.is_dir() {
            let mut found: Vec<PathBuf> = fs::read_dir(path)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && p.extension().is_some_and(|e| e == extension))
                .collect();
            found.sort();
            debug!("{} .{} files in {}", found.len(), extension, path.display());
            files.extend(found);
        } else {
            files.push(path.clone());
        }
    }
    info!("Collected {} .{} files", files.len(), extension);
    Ok(files)
}

/// File name up to its first `.`.
pub(crate) fn reference_from_path(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.split('.').next())
        .unwrap_or_default()
        .to_string()
}

/// Parses the pairing lines shared by CT and bpseq files: 1-based index,
/// base, 1-based partner (0 when unpaired). Each pair is emitted once.
pub(crate) fn parse_pairing_lines<'a>(
    lines: impl Iterator<Item = &'a str>,
    base_column: usize,
    partner_column: usize,
    n_columns: usize,
) -> std::result::Result<RawFields, String> {
    let mut fields = RawFields::default();

    for line in lines {
        if line.trim().is_empty() {
            break;
        }
        let columns: Vec<&str> = line.split_whitespace().collect();
        if columns.len() != n_columns {
            return Err(format!(
                "expected {} columns, found {} in {:?}",
                n_columns,
                columns.len(),
                line
            ));
        }
        let index: usize = columns[0]
            .parse()
            .map_err(|_| format!("bad index {:?}", columns[0]))?;
        let partner: usize = columns[partner_column]
            .parse()
            .map_err(|_| format!("bad partner {:?}", columns[partner_column]))?;
        if index == 0 {
            return Err("indices are 1-based".to_string());
        }

        fields.sequence.push_str(columns[base_column]);
        if partner != 0 && partner > index {
            fields.pairs.push((index - 1, partner - 1));
        }
    }
    Ok(fields)
}

#[derive(Debug, Default, PartialEq)]
pub(crate) struct RawFields {
    pub sequence: String,
    pub pairs: Vec<(usize, usize)>,
}
