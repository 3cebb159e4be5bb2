use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::info;

use crate::data_handling::{apply_prediction, Prediction};
use crate::datapoint::{InvalidDatapoint, RawDatapoint, Rejection};
use crate::error::{Error, Result};
use crate::list_datapoints::ListOfDatapoints;
use crate::models::{BasePair, Dataset, Origin, Provides};
use crate::prediction_tools::StructurePredictor;
use crate::UNKNOWN;

/// `{"reference": {"sequence": ..., "structure" | "paired_bases": ..., "dms": ..., "shape": ...}}`
pub struct JsonDataset {
    pub path: PathBuf,
    pub predict_structure: bool,
}

impl JsonDataset {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            predict_structure: false,
        }
    }
}

fn parse_pairs(value: &Value) -> std::result::Result<Vec<BasePair>, String> {
    let pairs = value
        .as_array()
        .ok_or_else(|| format!("expected a list of pairs, found {value}"))?;
    pairs
        .iter()
        .map(|pair| match pair.as_array().map(Vec::as_slice) {
            Some([i, j]) => match (i.as_u64(), j.as_u64()) {
                (Some(i), Some(j)) => Ok((i as usize, j as usize)),
                _ => Err(format!("pair indices must be non-negative integers, found {pair}")),
            },
            _ => Err(format!("expected a pair, found {pair}")),
        })
        .collect()
}

fn parse_signal(value: &Value) -> std::result::Result<Vec<f64>, String> {
    let values = value
        .as_array()
        .ok_or_else(|| format!("expected a list of numbers, found {value}"))?;
    values
        .iter()
        .map(|v| match v {
            Value::Null => Ok(UNKNOWN),
            other => other
                .as_f64()
                .ok_or_else(|| format!("expected a number, found {other}")),
        })
        .collect()
}

/// Reads one entry; the error is the reason the entry cannot be used at all.
pub fn parse_entry(reference: &str, entry: &Value) -> std::result::Result<RawDatapoint, String> {
    let fields: &Map<String, Value> = entry
        .as_object()
        .ok_or_else(|| format!("expected an object, found {entry}"))?;

    let mut raw = RawDatapoint {
        reference: Some(reference.to_string()),
        sequence: fields
            .get("sequence")
            .and_then(Value::as_str)
            .map(str::to_string),
        ..RawDatapoint::default()
    };

    match fields.get("structure") {
        Some(Value::String(db)) => raw.dotbracket = Some(db.clone()),
        Some(Value::Null) | None => {}
        Some(pairs) => raw.structure = Some(parse_pairs(pairs)?),
    }
    if let Some(pairs) = fields.get("paired_bases").filter(|v| !v.is_null()) {
        raw.structure = Some(parse_pairs(pairs)?);
    }
    if let Some(dms) = fields.get("dms").filter(|v| !v.is_null()) {
        raw.dms = Some(parse_signal(dms)?);
    }
    if let Some(shape) = fields.get("shape").filter(|v| !v.is_null()) {
        raw.shape = Some(parse_signal(shape)?);
    }
    Ok(raw)
}

impl Dataset for JsonDataset {
    fn source(&self) -> String {
        format!("json file {}", self.path.display())
    }

    fn provides(&self) -> Provides {
        Provides {
            structure: if self.predict_structure { Origin::Predicted } else { Origin::Source },
            dms: Origin::Source,
        }
    }

    fn load(&self, predictor: Option<&dyn StructurePredictor>) -> Result<ListOfDatapoints> {
        if !self.path.exists() {
            return Err(Error::MissingInput(self.path.clone()));
        }
        info!("Reading data from {}", self.path.display());

        let data: Value = serde_json::from_reader(BufReader::new(File::open(&self.path)?))?;
        let entries = data.as_object().ok_or_else(|| Error::MalformedInput {
            path: self.path.clone(),
            message: "top level must be an object keyed by reference".to_string(),
        })?;

        let prediction = Prediction {
            structure: self.predict_structure,
            dms: false,
        };
        let mut list = ListOfDatapoints::new();
        for (reference, entry) in entries {
            match parse_entry(reference, entry) {
                Ok(mut raw) => {
                    apply_prediction(&mut raw, prediction, predictor)?;
                    list.push_raw(raw);
                }
                Err(message) => list.reject(Rejection {
                    reference: Some(reference.clone()),
                    reason: InvalidDatapoint::Malformed(message),
                }),
            }
        }

        info!("Parsed {} entries from {}", entries.len(), self.path.display());
        Ok(list)
    }
}
