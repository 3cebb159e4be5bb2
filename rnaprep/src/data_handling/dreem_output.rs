use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use statrs::statistics::{Data, OrderStatistics};
use tracing::{debug, info, warn};

use crate::data_handling::{apply_prediction, Prediction};
use crate::datapoint::RawDatapoint;
use crate::error::{Error, Result};
use crate::list_datapoints::ListOfDatapoints;
use crate::models::{Dataset, Origin, Provides};
use crate::prediction_tools::StructurePredictor;
use crate::UNKNOWN;

pub const DEFAULT_MAX_MUTATION: f64 = 0.5;
const NORMALIZATION_QUANTILE: f64 = 0.975;

/// DREEM / seismic experiment output: sample, then reference, then section,
/// then cluster, each level holding scalar fields next to the nested ones.
pub struct DreemOutputDataset {
    pub path: PathBuf,
    /// Rows whose highest mutation rate reaches this value are dropped.
    pub max_mutation: f64,
    pub drop_duplicates: bool,
    pub predict_structure: bool,
}

impl DreemOutputDataset {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            max_mutation: DEFAULT_MAX_MUTATION,
            drop_duplicates: true,
            predict_structure: false,
        }
    }
}

/// One flattened `(reference, sequence, sub_rate)` row.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationProfile {
    pub reference: Option<String>,
    pub sequence: Option<String>,
    pub sub_rate: Option<Vec<f64>>,
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Array(_) => 1,
        Value::Object(_) => 2,
        _ => 0,
    }
}

/// Entries ordered scalars first, then lists, then objects, each group by key.
pub fn sorted_entries(map: &Map<String, Value>) -> Vec<(&String, &Value)> {
    let mut entries: Vec<(&String, &Value)> = map.iter().collect();
    entries.sort_by(|a, b| (type_rank(a.1), a.0).cmp(&(type_rank(b.1), b.0)));
    entries
}

/// One row per cluster. Scalar fields met on the way down are carried into
/// every row below them, and stay set for later siblings.
pub fn flatten_experiment(experiment: &Map<String, Value>) -> Vec<Map<String, Value>> {
    let mut rows = Vec::new();
    let mut row = Map::new();

    for (key, value) in sorted_entries(experiment) {
        let Value::Object(reference) = value else {
            row.insert(key.clone(), value.clone());
            continue;
        };
        row.insert("reference".to_string(), Value::String(key.clone()));

        for (key, value) in sorted_entries(reference) {
            let Value::Object(section) = value else {
                row.insert(key.clone(), value.clone());
                continue;
            };
            row.insert("section".to_string(), Value::String(key.clone()));

            for (key, value) in sorted_entries(section) {
                row.insert("cluster".to_string(), Value::String(key.clone()));
                let Value::Object(cluster) = value else {
                    row.insert(key.clone(), value.clone());
                    continue;
                };
                for (key, value) in sorted_entries(cluster) {
                    row.insert(key.clone(), value.clone());
                }
                rows.push(row.clone());
            }
        }
    }
    rows
}

fn rates(value: &Value) -> Option<Vec<f64>> {
    value
        .as_array()?
        .iter()
        .map(|v| if v.is_null() { Some(UNKNOWN) } else { v.as_f64() })
        .collect()
}

fn measured(rates: &[f64]) -> impl Iterator<Item = f64> + '_ {
    rates.iter().copied().filter(|&v| v != UNKNOWN && v.is_finite())
}

impl From<&Map<String, Value>> for MutationProfile {
    fn from(row: &Map<String, Value>) -> Self {
        let text = |key: &str| row.get(key).and_then(Value::as_str).map(str::to_string);
        Self {
            reference: text("reference"),
            sequence: text("sequence"),
            sub_rate: row.get("sub_rate").and_then(rates),
        }
    }
}

/// Top-level scalar fields of an experiment file, `user` renamed to `experimenter`.
pub fn experiment_metadata(path: &Path) -> Result<Map<String, Value>> {
    let data: Value = serde_json::from_reader(BufReader::new(File::open(path)?))?;
    let mut metadata = Map::new();
    for (key, value) in data.as_object().into_iter().flatten() {
        if value.is_object() {
            continue;
        }
        let key = if key == "user" { "experimenter" } else { key.as_str() };
        metadata.insert(key.to_string(), value.clone());
    }
    Ok(metadata)
}

impl DreemOutputDataset {
    /// Flattened rows after the mutation-rate filter, deduplication and
    /// percentile normalization.
    pub fn profiles(&self, experiment: &Map<String, Value>) -> Vec<MutationProfile> {
        let mut profiles: Vec<MutationProfile> = flatten_experiment(experiment)
            .iter()
            .map(MutationProfile::from)
            .collect();

        // 1. drop highly mutated rows
        let before = profiles.len();
        profiles.retain(|p| {
            p.sub_rate
                .as_deref()
                .map_or(true, |r| measured(r).fold(f64::MIN, f64::max) < self.max_mutation)
        });
        debug!("{} rows above max mutation rate {}", before - profiles.len(), self.max_mutation);

        // 2. keep the first row per sequence
        if self.drop_duplicates {
            let mut seen = HashSet::new();
            profiles.retain(|p| seen.insert(p.sequence.clone()));
        }

        // 3. normalize by the 97.5th percentile of every rate
        let all_rates: Vec<f64> = profiles
            .iter()
            .filter_map(|p| p.sub_rate.as_deref())
            .flat_map(measured)
            .collect();
        if all_rates.is_empty() {
            return profiles;
        }
        let percentile = Data::new(all_rates).quantile(NORMALIZATION_QUANTILE);
        if percentile <= 0.0 || !percentile.is_finite() {
            warn!("Percentile of mutation rates is {}, rates left as is", percentile);
            return profiles;
        }

        for rates in profiles.iter_mut().filter_map(|p| p.sub_rate.as_mut()) {
            for rate in rates.iter_mut().filter(|r| **r != UNKNOWN) {
                *rate = (*rate / percentile).min(1.0);
            }
        }
        profiles
    }
}

impl Dataset for DreemOutputDataset {
    fn source(&self) -> String {
        format!("dreem output {}", self.path.display())
    }

    fn provides(&self) -> Provides {
        Provides {
            structure: if self.predict_structure { Origin::Predicted } else { Origin::Absent },
            dms: Origin::Source,
        }
    }

    fn load(&self, predictor: Option<&dyn StructurePredictor>) -> Result<ListOfDatapoints> {
        if !self.path.exists() {
            return Err(Error::MissingInput(self.path.clone()));
        }
        info!("Reading data from {}", self.path.display());

        let data: Value = serde_json::from_reader(BufReader::new(File::open(&self.path)?))?;
        let experiment = data.as_object().ok_or_else(|| Error::MalformedInput {
            path: self.path.clone(),
            message: "top level must be an object".to_string(),
        })?;

        let prediction = Prediction {
            structure: self.predict_structure,
            dms: false,
        };
        let mut list = ListOfDatapoints::new();
        for profile in self.profiles(experiment) {
            let mut raw = RawDatapoint {
                reference: profile.reference,
                sequence: profile.sequence,
                dms: profile.sub_rate,
                ..RawDatapoint::default()
            };
            apply_prediction(&mut raw, prediction, predictor)?;
            list.push_raw(raw);
        }

        info!("Parsed {} mutation profiles", list.n_candidates());
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn experiment() -> Value {
        json!({
            "sample": "S1",
            "user": "lab",
            "ref_b": {
                "num_aligned": 100,
                "full": {
                    "sequence": "GGCC",
                    "pop_avg": {"sub_rate": [0.1, 0.2, 0.0, 0.4], "cov": [1, 1, 1, 1]}
                }
            },
            "ref_a": {
                "full": {
                    "sequence": "ACGU",
                    "pop_avg": {"sub_rate": [0.9, 0.1, 0.1, 0.1]}
                },
                "part": {
                    "sequence": "AAAA",
                    "pop_avg": {"sub_rate": [0.2, null, 0.2, 0.2]}
                }
            }
        })
    }

    #[test]
    fn scalars_come_first() {
        let data = experiment();
        let keys: Vec<&str> = sorted_entries(data.as_object().unwrap())
            .into_iter()
            .map(|(k, _)| k.as_str())
            .collect();
        assert_eq!(keys, vec!["sample", "user", "ref_a", "ref_b"]);
    }

    #[test]
    fn one_row_per_cluster() {
        let data = experiment();
        let rows = flatten_experiment(data.as_object().unwrap());
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["reference"], "ref_a");
        assert_eq!(rows[0]["section"], "full");
        assert_eq!(rows[0]["cluster"], "pop_avg");
        assert_eq!(rows[0]["sample"], "S1");
        assert_eq!(rows[2]["num_aligned"], 100);
        assert_eq!(rows[2]["sequence"], "GGCC");
    }

    #[test]
    fn filters_and_normalizes() {
        let data = experiment();
        let dataset = DreemOutputDataset::new(Path::new("unused.json"));
        let profiles = dataset.profiles(data.as_object().unwrap());

        // ACGU has a rate of 0.9
        let sequences: Vec<&str> = profiles
            .iter()
            .filter_map(|p| p.sequence.as_deref())
            .collect();
        assert_eq!(sequences, vec!["AAAA", "GGCC"]);

        let rates: Vec<f64> = profiles
            .iter()
            .flat_map(|p| p.sub_rate.clone().unwrap())
            .collect();
        assert!(rates.iter().all(|&r| r == UNKNOWN || (0.0..=1.0).contains(&r)));
        assert_eq!(profiles[0].sub_rate.as_ref().unwrap()[1], UNKNOWN);
        assert_eq!(profiles[1].sub_rate.as_ref().unwrap()[3], 1.0);
    }

    #[test]
    fn metadata_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        serde_json::to_writer(&mut file, &experiment()).unwrap();

        let metadata = experiment_metadata(file.path()).unwrap();
        let keys: Vec<&str> = metadata.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["sample", "experimenter"]);
    }

    #[test]
    fn loads_datapoints() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        serde_json::to_writer(&mut file, &experiment()).unwrap();

        let list = DreemOutputDataset::new(file.path()).load(None).unwrap();
        assert_eq!(list.len(), 2);
        assert!(list.iter().all(|dp| dp.dms().is_some() && dp.structure().is_none()));
    }
}
