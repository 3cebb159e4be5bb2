pub mod analysis;
pub mod cli;
pub mod config;
pub mod data_handling;
pub mod datafolder;
pub mod datapoint;
pub mod error;
pub mod export;
pub mod filter;
pub mod helper_functions;
pub mod list_datapoints;
pub mod models;
pub mod prediction_tools;

pub use datapoint::{Datapoint, InvalidDatapoint, RawDatapoint};
pub use error::{Error, Result};
pub use filter::{filter, FilterConfig, FilterReport, FilterStep};
pub use list_datapoints::ListOfDatapoints;

/// Signal value marking a position without measurement.
pub const UNKNOWN: f64 = -1000.0;
