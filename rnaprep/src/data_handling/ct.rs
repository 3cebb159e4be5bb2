use std::fs;
use std::path::PathBuf;

use tracing::{info, warn};

use crate::data_handling::{
    apply_prediction, collect_files, parse_pairing_lines, reference_from_path, Prediction,
};
use crate::datapoint::{InvalidDatapoint, RawDatapoint, Rejection};
use crate::error::Result;
use crate::list_datapoints::ListOfDatapoints;
use crate::models::{Dataset, Origin, Provides};
use crate::prediction_tools::StructurePredictor;

/// Connectivity-table files, one record per file. Only the first structure
/// of a file is read.
pub struct CtDataset {
    /// Files or folders of `.ct` files.
    pub paths: Vec<PathBuf>,
    pub predict_dms: bool,
}

impl CtDataset {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            predict_dms: false,
        }
    }
}

/// Header line, then `index base prev next partner natural` per base.
pub fn parse_ct(text: &str) -> std::result::Result<(String, Vec<(usize, usize)>), String> {
    let fields = parse_pairing_lines(text.lines().skip(1), 1, 4, 6)?;
    Ok((fields.sequence, fields.pairs))
}

impl Dataset for CtDataset {
    fn source(&self) -> String {
        format!("{} ct input(s)", self.paths.len())
    }

    fn provides(&self) -> Provides {
        Provides {
            structure: Origin::Source,
            dms: if self.predict_dms { Origin::Predicted } else { Origin::Absent },
        }
    }

    fn load(&self, predictor: Option<&dyn StructurePredictor>) -> Result<ListOfDatapoints> {
        let files = collect_files(&self.paths, "ct")?;
        let prediction = Prediction {
            structure: false,
            dms: self.predict_dms,
        };
        let mut list = ListOfDatapoints::new();

        for file in &files {
            let reference = reference_from_path(file);
            let text = fs::read_to_string(file)?;
            match parse_ct(&text) {
                Ok((sequence, pairs)) => {
                    let mut raw = RawDatapoint::new(reference, sequence).with_structure(pairs);
                    apply_prediction(&mut raw, prediction, predictor)?;
                    list.push_raw(raw);
                }
                Err(message) => {
                    warn!("Skipping {}: {}", file.display(), message);
                    list.reject(Rejection {
                        reference: Some(reference),
                        reason: InvalidDatapoint::Malformed(message),
                    });
                }
            }
        }

        info!("Parsed {} ct files", files.len());
        Ok(list)
    }
}
