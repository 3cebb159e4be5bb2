use std::path::PathBuf;
use thiserror::Error;

/// Failures of the environment around a conversion (files, external tools).
///
/// Defects of a single record never end up here, they are turned into an
/// [`InvalidDatapoint`](crate::datapoint::InvalidDatapoint) and tallied.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not (de)serialize JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Tabular export failed: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Could not open compressed input: {0}")]
    Compression(#[from] niffler::Error),

    #[error("Could not read FASTA record in {path}: {message}")]
    Fasta { path: PathBuf, message: String },

    #[error("Input {0} does not exist")]
    MissingInput(PathBuf),

    #[error("Input {path} is malformed: {message}")]
    MalformedInput { path: PathBuf, message: String },

    #[error("Could not locate RNAstructure binary `{name}`: {source}")]
    MissingBinary {
        name: String,
        #[source]
        source: which::Error,
    },

    #[error("`{tool}` exited with {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("`{tool}` produced unexpected output: {message}")]
    ToolOutput { tool: String, message: String },

    #[error("Prediction of {0} was requested but no structure predictor is configured")]
    PredictorRequired(&'static str),

    #[error("Signal length {signal} does not match sequence length {sequence}")]
    SignalLength { sequence: usize, signal: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
