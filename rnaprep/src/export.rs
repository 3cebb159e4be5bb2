//! Tabular and NumPy views of a collection.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use ndarray::Array2;
use npyz::WriterBuilder;
use polars::prelude::*;
use tracing::info;

use crate::helper_functions::PAD_CODE;
use crate::list_datapoints::ListOfDatapoints;
use crate::models::SignalKind;
use crate::UNKNOWN;

pub const REFERENCES_NPY: &str = "references.npy";
pub const SEQUENCES_NPY: &str = "sequences.npy";
pub const BASE_PAIRS_NPY: &str = "base_pairs.npy";

pub fn signal_npy(kind: SignalKind) -> String {
    format!("{}.npy", kind.name())
}

fn max_len(list: &ListOfDatapoints) -> usize {
    list.iter().map(|dp| dp.len()).max().unwrap_or(0)
}

/// UTF-8 bytes of every reference, zero padded.
pub fn references_matrix(list: &ListOfDatapoints) -> Array2<u8> {
    let width = list.iter().map(|dp| dp.reference().len()).max().unwrap_or(0);
    let mut matrix = Array2::zeros((list.len(), width));
    for (mut row, dp) in matrix.rows_mut().into_iter().zip(list) {
        for (cell, byte) in row.iter_mut().zip(dp.reference().bytes()) {
            *cell = byte;
        }
    }
    matrix
}

/// Integer-encoded sequences, padded with the pad code.
pub fn sequences_matrix(list: &ListOfDatapoints) -> Array2<i64> {
    let mut matrix = Array2::from_elem((list.len(), max_len(list)), PAD_CODE);
    for (mut row, dp) in matrix.rows_mut().into_iter().zip(list) {
        for (cell, code) in row.iter_mut().zip(dp.embed_sequence()) {
            *cell = code;
        }
    }
    matrix
}

/// One `(record, i, j)` row per base pair.
pub fn base_pairs_matrix(list: &ListOfDatapoints) -> Array2<i64> {
    let rows: Vec<i64> = list
        .iter()
        .enumerate()
        .flat_map(|(record, dp)| {
            dp.structure()
                .unwrap_or_default()
                .iter()
                .flat_map(move |&(i, j)| [record as i64, i as i64, j as i64])
        })
        .collect();
    let n_pairs = rows.len() / 3;
    Array2::from_shape_vec((n_pairs, 3), rows).unwrap_or_else(|_| Array2::zeros((0, 3)))
}

/// Signal values padded with [`UNKNOWN`]; `None` when no record has the signal.
pub fn signal_matrix(list: &ListOfDatapoints, kind: SignalKind) -> Option<Array2<f32>> {
    if !list.has_signal(kind) {
        return None;
    }
    let mut matrix = Array2::from_elem((list.len(), max_len(list)), UNKNOWN as f32);
    for (mut row, dp) in matrix.rows_mut().into_iter().zip(list) {
        if let Some(values) = dp.signal(kind) {
            for (cell, &value) in row.iter_mut().zip(values) {
                *cell = value as f32;
            }
        }
    }
    Some(matrix)
}

fn write_npy<T>(path: &Path, matrix: &Array2<T>) -> std::io::Result<()>
where
    T: npyz::AutoSerialize + Copy,
{
    let shape: Vec<u64> = matrix.shape().iter().map(|&d| d as u64).collect();
    let file = File::create(path)?;
    let mut writer = npyz::WriteOptions::new()
        .default_dtype()
        .shape(&shape)
        .writer(BufWriter::new(file))
        .begin_nd()?;
    writer.extend(matrix.iter().copied())?;
    writer.finish()
}

impl ListOfDatapoints {
    /// Writes the NumPy arrays into `dir` and returns the files written.
    pub fn to_npy(&self, dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;
        let mut written = Vec::new();

        let path = dir.join(REFERENCES_NPY);
        write_npy(&path, &references_matrix(self))?;
        written.push(path);

        let path = dir.join(SEQUENCES_NPY);
        write_npy(&path, &sequences_matrix(self))?;
        written.push(path);

        if self.has_structure() {
            let path = dir.join(BASE_PAIRS_NPY);
            write_npy(&path, &base_pairs_matrix(self))?;
            written.push(path);
        }

        for kind in SignalKind::ALL {
            if let Some(matrix) = signal_matrix(self, kind) {
                let path = dir.join(signal_npy(kind));
                write_npy(&path, &matrix)?;
                written.push(path);
            }
        }

        info!("Wrote {} npy files to {}", written.len(), dir.display());
        Ok(written)
    }

    /// One row per datapoint; the structure is given as dot-bracket and the
    /// signals as list columns.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let signal_column = |kind: SignalKind| -> Column {
            let values: ListChunked = self
                .iter()
                .map(|dp| {
                    dp.signal(kind)
                        .map(|v| Series::new(PlSmallStr::EMPTY, v.to_vec()))
                })
                .collect();
            values.with_name(kind.name().into()).into_series().into_column()
        };

        DataFrame::new(vec![
            Column::new(
                "reference".into(),
                self.iter().map(|dp| dp.reference()).collect::<Vec<_>>(),
            ),
            Column::new(
                "sequence".into(),
                self.iter().map(|dp| dp.sequence()).collect::<Vec<_>>(),
            ),
            Column::new(
                "structure".into(),
                self.iter().map(|dp| dp.dotbracket()).collect::<Vec<_>>(),
            ),
            signal_column(SignalKind::Dms),
            signal_column(SignalKind::Shape),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datapoint::RawDatapoint;

    fn sample() -> ListOfDatapoints {
        ListOfDatapoints::from_raw(vec![
            RawDatapoint::new("ab", "GGAACC")
                .with_dotbracket("((..))")
                .with_dms(vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6]),
            RawDatapoint::new("c", "ACG"),
        ])
    }

    #[test]
    fn matrices_are_padded() {
        let list = sample();

        let references = references_matrix(&list);
        assert_eq!(references.shape(), &[2, 2]);
        assert_eq!(references.row(1).to_vec(), vec![b'c', 0]);

        let sequences = sequences_matrix(&list);
        assert_eq!(sequences.shape(), &[2, 6]);
        assert_eq!(sequences.row(1).to_vec(), vec![1, 2, 3, 0, 0, 0]);

        let pairs = base_pairs_matrix(&list);
        assert_eq!(pairs.shape(), &[2, 3]);
        assert_eq!(pairs.row(0).to_vec(), vec![0, 1, 4]);

        let dms = signal_matrix(&list, SignalKind::Dms).unwrap();
        assert_eq!(dms[[0, 5]], 0.6f32);
        assert_eq!(dms[[1, 0]], UNKNOWN as f32);
        assert!(signal_matrix(&list, SignalKind::Shape).is_none());
    }

    #[test]
    fn npy_files() {
        let dir = tempfile::tempdir().unwrap();
        let written = sample().to_npy(dir.path()).unwrap();
        let names: Vec<String> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec!["references.npy", "sequences.npy", "base_pairs.npy", "dms.npy"]
        );

        let bytes = std::fs::read(dir.path().join(SEQUENCES_NPY)).unwrap();
        let npy = npyz::NpyFile::new(&bytes[..]).unwrap();
        assert_eq!(npy.shape(), &[2, 6]);
        let values: Vec<i64> = npy.into_vec().unwrap();
        assert_eq!(&values[6..9], &[1, 2, 3]);
    }

    #[test]
    fn dataframe_view() {
        let df = sample().to_dataframe().unwrap();
        let expected = df!(
            "reference" => ["ab", "c"],
            "sequence" => ["GGAACC", "ACG"],
        )
        .unwrap();
        assert!(df
            .select(["reference", "sequence"])
            .unwrap()
            .equals(&expected));
        assert_eq!(df.column("structure").unwrap().null_count(), 1);
        assert_eq!(df.column("dms").unwrap().null_count(), 1);
        assert_eq!(df.width(), 5);
    }
}
