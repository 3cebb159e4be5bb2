use std::path::{Path, PathBuf};

use bio::io::fasta;
use tracing::info;

use crate::data_handling::{apply_prediction, Prediction};
use crate::datapoint::RawDatapoint;
use crate::error::{Error, Result};
use crate::list_datapoints::ListOfDatapoints;
use crate::models::{Dataset, Origin, Provides};
use crate::prediction_tools::StructurePredictor;

/// Plain or compressed FASTA; the full header line is the reference.
pub struct FastaDataset {
    pub path: PathBuf,
    pub prediction: Prediction,
}

impl FastaDataset {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            prediction: Prediction::default(),
        }
    }

    pub fn with_prediction(mut self, prediction: Prediction) -> Self {
        self.prediction = prediction;
        self
    }
}

fn header(record: &fasta::Record) -> String {
    match record.desc() {
        Some(desc) => format!("{} {}", record.id(), desc),
        None => record.id().to_string(),
    }
}

impl Dataset for FastaDataset {
    fn source(&self) -> String {
        format!("fasta file {}", self.path.display())
    }

    fn provides(&self) -> Provides {
        let predicted = |on: bool| if on { Origin::Predicted } else { Origin::Absent };
        Provides {
            structure: predicted(self.prediction.structure),
            dms: predicted(self.prediction.dms),
        }
    }

    fn load(&self, predictor: Option<&dyn StructurePredictor>) -> Result<ListOfDatapoints> {
        if !self.path.exists() {
            return Err(Error::MissingInput(self.path.clone()));
        }
        info!("Reading data from {}", self.path.display());

        let (reader, _format) = niffler::from_path(&self.path)?;
        let mut list = ListOfDatapoints::new();

        for record in fasta::Reader::new(reader).records() {
            let record = record.map_err(|e| Error::Fasta {
                path: self.path.clone(),
                message: e.to_string(),
            })?;
            let mut raw = RawDatapoint::new(
                header(&record),
                String::from_utf8_lossy(record.seq()).into_owned(),
            );
            apply_prediction(&mut raw, self.prediction, predictor)?;
            list.push_raw(raw);
        }

        info!(
            "Parsed {} records from {} ({} rejected)",
            list.n_candidates(),
            self.path.display(),
            list.rejected().len()
        );
        Ok(list)
    }
}
