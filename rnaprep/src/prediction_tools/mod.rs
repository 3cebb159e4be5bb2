pub mod rnastructure;

use crate::error::Result;

/// Secondary-structure prediction backend.
pub trait StructurePredictor {
    /// Minimum free energy structure as dot-bracket, optionally guided by a
    /// DMS signal.
    fn predict_structure(&self, sequence: &str, dms: Option<&[f64]>) -> Result<String>;

    /// Per-base probability of being paired, one value per base in `[0, 1]`.
    fn predict_pairing_probabilities(&self, sequence: &str, signal: Option<&[f64]>)
        -> Result<Vec<f64>>;
}
