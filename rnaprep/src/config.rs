use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;
use crate::helper_functions::project_root;

/// Where external tools and data live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the RNAstructure binaries; looked up on `PATH` when unset.
    pub rnastructure_path: Option<PathBuf>,
    /// Scratch space for predictor input / output files.
    pub temp_dir: PathBuf,
    /// Root under which datafolders are created.
    pub data_folder: PathBuf,
    /// Folding temperature passed to `partition`.
    pub temperature_k: Option<f64>,
}

impl Default for Config {
    fn default() -> Self {
        let root = project_root();
        Self {
            rnastructure_path: None,
            temp_dir: root.join("temp"),
            data_folder: root.join("data"),
            temperature_k: None,
        }
    }
}

impl Config {
    /// `RNASTRUCTURE_PATH`, `RNASTRUCTURE_TEMP_PATH` and `DATA_FOLDER` override the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(path) = env::var_os("RNASTRUCTURE_PATH") {
            config.rnastructure_path = Some(PathBuf::from(path));
        }
        if let Some(path) = env::var_os("RNASTRUCTURE_TEMP_PATH") {
            config.temp_dir = PathBuf::from(path);
        }
        if let Some(path) = env::var_os("DATA_FOLDER") {
            config.data_folder = PathBuf::from(path);
        }
        debug!("Configuration from environment: {:?}", config);
        config
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        info!("Reading configuration from {}", path.display());
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"temperature_k": 310.15, "temp_dir": "/scratch"}"#).unwrap();

        let config = Config::from_json_file(&path).unwrap();
        assert_eq!(config.temperature_k, Some(310.15));
        assert_eq!(config.temp_dir, PathBuf::from("/scratch"));
        assert_eq!(config.rnastructure_path, None);
        assert_eq!(config.data_folder, Config::default().data_folder);
    }

    #[test]
    fn json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = Config {
            rnastructure_path: Some(PathBuf::from("/opt/RNAstructure/exe")),
            ..Config::default()
        };
        config.write_json(&path).unwrap();
        assert_eq!(Config::from_json_file(&path).unwrap(), config);
    }
}
