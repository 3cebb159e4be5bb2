//! A single RNA record and the factory deciding whether a candidate becomes one.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::helper_functions::{
    bracket_counts, dotbracket_to_pairs, embed_dotbracket, embed_sequence, format_signal,
    irregular_characters, is_valid_alphabet, pairs_to_dotbracket, standardize_sequence,
    validate_pairs,
};
use crate::models::{BasePair, SignalKind};

/// Why a candidate record did not become a [`Datapoint`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidDatapoint {
    #[error("missing or empty sequence")]
    MissingSequence,
    #[error("missing or empty reference")]
    MissingReference,
    #[error("unbalanced dot-bracket structure ({open} opening vs {close} closing brackets)")]
    UnbalancedDotBracket { open: usize, close: usize },
    #[error("sequence contains characters other than ACGTU: {0:?}")]
    IrregularCharacters(String),
    #[error("{signal} signal has {found} values for a sequence of length {expected}")]
    SignalLength {
        signal: SignalKind,
        expected: usize,
        found: usize,
    },
    #[error("malformed record: {0}")]
    Malformed(String),
}

/// First signal that does not hold one value per base.
fn mismatched_signal(
    dms: Option<&[f64]>,
    shape: Option<&[f64]>,
    expected: usize,
) -> Option<InvalidDatapoint> {
    [(SignalKind::Dms, dms), (SignalKind::Shape, shape)]
        .into_iter()
        .find_map(|(signal, values)| {
            let found = values?.len();
            (found != expected).then_some(InvalidDatapoint::SignalLength {
                signal,
                expected,
                found,
            })
        })
}

/// A candidate that was dropped at construction time.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub reference: Option<String>,
    pub reason: InvalidDatapoint,
}

/// Unvalidated fields of a record, as parsed from a source file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawDatapoint {
    pub reference: Option<String>,
    pub sequence: Option<String>,
    pub dotbracket: Option<String>,
    pub structure: Option<Vec<BasePair>>,
    pub dms: Option<Vec<f64>>,
    pub shape: Option<Vec<f64>>,
}

impl RawDatapoint {
    pub fn new(reference: impl Into<String>, sequence: impl Into<String>) -> Self {
        Self {
            reference: Some(reference.into()),
            sequence: Some(sequence.into()),
            ..Self::default()
        }
    }

    pub fn with_dotbracket(mut self, dotbracket: impl Into<String>) -> Self {
        self.dotbracket = Some(dotbracket.into());
        self
    }

    pub fn with_structure(mut self, structure: Vec<BasePair>) -> Self {
        self.structure = Some(structure);
        self
    }

    pub fn with_dms(mut self, dms: Vec<f64>) -> Self {
        self.dms = Some(dms);
        self
    }

    pub fn with_shape(mut self, shape: Vec<f64>) -> Self {
        self.shape = Some(shape);
        self
    }

    /// The sequence as it will be stored, if it passes the alphabet gate.
    pub fn normalized_sequence(&self) -> Option<String> {
        let sequence = standardize_sequence(self.sequence.as_deref()?);
        (!sequence.is_empty() && is_valid_alphabet(&sequence)).then_some(sequence)
    }

    /// Whether every signal carries one value per base of `sequence`.
    pub fn signals_match(&self, sequence: &str) -> bool {
        mismatched_signal(self.dms.as_deref(), self.shape.as_deref(), sequence.len()).is_none()
    }
}

/// One validated RNA record. Fields are read-only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Datapoint {
    reference: String,
    sequence: String,
    structure: Option<Vec<BasePair>>,
    dms: Option<Vec<f64>>,
    shape: Option<Vec<f64>>,
}

impl TryFrom<RawDatapoint> for Datapoint {
    type Error = InvalidDatapoint;

    fn try_from(raw: RawDatapoint) -> Result<Self, Self::Error> {
        let sequence = match raw.sequence {
            Some(s) if !s.trim().is_empty() => s,
            _ => return Err(InvalidDatapoint::MissingSequence),
        };
        let reference = match raw.reference {
            Some(r) if !r.is_empty() => r,
            _ => return Err(InvalidDatapoint::MissingReference),
        };

        if let Some(db) = raw.dotbracket.as_deref() {
            let counts = bracket_counts(db);
            if counts.open != counts.close {
                return Err(InvalidDatapoint::UnbalancedDotBracket {
                    open: counts.open,
                    close: counts.close,
                });
            }
        }

        let sequence = standardize_sequence(&sequence);
        if !is_valid_alphabet(&sequence) {
            return Err(InvalidDatapoint::IrregularCharacters(irregular_characters(
                &sequence,
            )));
        }
        if let Some(invalid) =
            mismatched_signal(raw.dms.as_deref(), raw.shape.as_deref(), sequence.len())
        {
            return Err(invalid);
        }

        let structure = match (raw.structure, raw.dotbracket) {
            (Some(pairs), _) => Some(pairs),
            (None, Some(db)) => Some(dotbracket_to_pairs(&db).map_err(|c| {
                InvalidDatapoint::UnbalancedDotBracket {
                    open: c.open,
                    close: c.close,
                }
            })?),
            (None, None) => None,
        };

        Ok(Self {
            reference,
            sequence,
            structure,
            dms: raw.dms.as_deref().map(format_signal),
            shape: raw.shape.as_deref().map(format_signal),
        })
    }
}

#[derive(Serialize)]
struct Payload<'a> {
    sequence: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    structure: Option<&'a [BasePair]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dms: Option<&'a [f64]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    shape: Option<&'a [f64]>,
}

#[derive(Serialize)]
struct FlatDatapoint<'a> {
    reference: &'a str,
    #[serde(flatten)]
    payload: Payload<'a>,
}

impl Datapoint {
    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn sequence(&self) -> &str {
        &self.sequence
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub fn structure(&self) -> Option<&[BasePair]> {
        self.structure.as_deref()
    }

    pub fn dms(&self) -> Option<&[f64]> {
        self.dms.as_deref()
    }

    pub fn shape(&self) -> Option<&[f64]> {
        self.shape.as_deref()
    }

    pub fn signal(&self, kind: SignalKind) -> Option<&[f64]> {
        match kind {
            SignalKind::Dms => self.dms(),
            SignalKind::Shape => self.shape(),
        }
    }

    /// Re-checks pairing well-formedness. Structures handed in as pairs skip
    /// this check at construction time.
    pub fn assert_structure(&self) -> bool {
        self.structure
            .as_deref()
            .map_or(true, |pairs| validate_pairs(pairs, self.len()))
    }

    pub(crate) fn rename(&mut self, reference: String) {
        self.reference = reference;
    }

    pub fn dotbracket(&self) -> Option<String> {
        self.structure()
            .map(|pairs| pairs_to_dotbracket(pairs, self.len()))
    }

    pub fn embed_sequence(&self) -> Vec<i64> {
        embed_sequence(&self.sequence)
    }

    pub fn embed_structure(&self) -> Option<Vec<i64>> {
        self.dotbracket().map(|db| embed_dotbracket(&db))
    }

    fn payload(&self) -> Payload<'_> {
        Payload {
            sequence: &self.sequence,
            structure: self.structure(),
            dms: self.dms(),
            shape: self.shape(),
        }
    }

    /// `{"reference": ..., "sequence": ..., ...}` with absent fields left out.
    pub fn to_flat_value(&self) -> serde_json::Value {
        let flat = FlatDatapoint {
            reference: &self.reference,
            payload: self.payload(),
        };
        serde_json::to_value(flat).unwrap_or(serde_json::Value::Null)
    }

    /// `"reference": {...}` on a single line, the unit of the incremental JSON writer.
    pub fn to_json_entry(&self) -> serde_json::Result<String> {
        Ok(format!(
            "{}:{}",
            serde_json::to_string(&self.reference)?,
            serde_json::to_string(&self.payload())?
        ))
    }
}

impl fmt::Display for Datapoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entry = self.to_json_entry().map_err(|_| fmt::Error)?;
        f.write_str(&entry)
    }
}
