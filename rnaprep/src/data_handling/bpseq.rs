use std::fs;
use std::path::PathBuf;

use tracing::{info, warn};

use crate::data_handling::{collect_files, parse_pairing_lines, reference_from_path};
use crate::datapoint::{InvalidDatapoint, RawDatapoint, Rejection};
use crate::error::Result;
use crate::list_datapoints::ListOfDatapoints;
use crate::models::{Dataset, Origin, Provides};
use crate::prediction_tools::StructurePredictor;

pub struct BpseqDataset {
    /// Files or folders of `.bpseq` files.
    pub paths: Vec<PathBuf>,
}

impl BpseqDataset {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }
}

/// `index base partner` per base; comment and header lines before the first
/// base line are skipped.
pub fn parse_bpseq(text: &str) -> std::result::Result<(String, Vec<(usize, usize)>), String> {
    let body = text.lines().skip_while(|line| {
        line.split_whitespace()
            .next()
            .map_or(true, |first| first.parse::<usize>().is_err())
    });
    let fields = parse_pairing_lines(body, 1, 2, 3)?;
    if fields.sequence.is_empty() {
        return Err("no base lines".to_string());
    }
    Ok((fields.sequence, fields.pairs))
}

impl Dataset for BpseqDataset {
    fn source(&self) -> String {
        format!("{} bpseq input(s)", self.paths.len())
    }

    fn provides(&self) -> Provides {
        Provides {
            structure: Origin::Source,
            dms: Origin::Absent,
        }
    }

    fn load(&self, _predictor: Option<&dyn StructurePredictor>) -> Result<ListOfDatapoints> {
        let files = collect_files(&self.paths, "bpseq")?;
        let mut list = ListOfDatapoints::new();

        for file in &files {
            let reference = reference_from_path(file);
            match parse_bpseq(&fs::read_to_string(file)?) {
                Ok((sequence, pairs)) => {
                    list.push_raw(RawDatapoint::new(reference, sequence).with_structure(pairs));
                }
                Err(message) => {
                    warn!("Skipping {}: {}", file.display(), message);
                    list.reject(Rejection {
                        reference: Some(reference),
                        reason: InvalidDatapoint::Malformed(message),
                    });
                }
            }
        }

        info!("Parsed {} bpseq files", files.len());
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_header_lines() {
        let text = "# File example.bpseq\nFilename: example\n1 G 5\n2 C 0\n3 A 0\n4 U 0\n5 C 1\n";
        let (sequence, pairs) = parse_bpseq(text).unwrap();
        assert_eq!(sequence, "GCAUC");
        assert_eq!(pairs, vec![(0, 4)]);
    }

    #[test]
    fn single_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rna_1.bpseq");
        fs::write(&path, "1 G 4\n2 A 0\n3 A 0\n4 C 1\n").unwrap();

        let list = BpseqDataset::new(vec![path]).load(None).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list.datapoints()[0].reference(), "rna_1");
        assert_eq!(list.datapoints()[0].structure(), Some(&[(0, 3)][..]));
    }

    #[test]
    fn empty_file_is_rejected() {
        assert!(parse_bpseq("# nothing here\n").is_err());
    }
}
