use std::fmt;

use crate::error::Result;
use crate::list_datapoints::ListOfDatapoints;
use crate::prediction_tools::StructurePredictor;

/// Zero-based indices of two paired bases.
pub type BasePair = (usize, usize);

/// Chemical-probing signal families carried by a datapoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SignalKind {
    Dms,
    Shape,
}

impl SignalKind {
    pub const ALL: [SignalKind; 2] = [SignalKind::Dms, SignalKind::Shape];

    pub fn name(self) -> &'static str {
        match self {
            SignalKind::Dms => "dms",
            SignalKind::Shape => "shape",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Input formats understood by the bulk constructors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    Fasta,
    Ct,
    Bpseq,
    Json,
    /// DREEM / seismic experiment output
    Seismic,
}

impl Format {
    pub fn name(self) -> &'static str {
        match self {
            Format::Fasta => "fasta",
            Format::Ct => "ct",
            Format::Bpseq => "bpseq",
            Format::Json => "json",
            Format::Seismic => "seismic",
        }
    }
}

/// A source of raw records that can be turned into datapoints.
pub trait Dataset {
    /// Short description of the input, used in logs and info files.
    fn source(&self) -> String;

    /// Whether the loaded records carry a structure / a DMS signal.
    fn provides(&self) -> Provides;

    /// Parses every record. Single bad records end up as rejections in the
    /// returned collection; only environment failures are errors.
    fn load(&self, predictor: Option<&dyn StructurePredictor>) -> Result<ListOfDatapoints>;
}

/// Where the structure / DMS columns of a dataset come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Provides {
    pub structure: Origin,
    pub dms: Origin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Origin {
    #[default]
    Absent,
    Source,
    Predicted,
}
