use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::prediction_tools::StructurePredictor;
use crate::UNKNOWN;

/// Probabilities summed over partners may overshoot 1 slightly; beyond this
/// the tool output is considered broken.
const MAX_PROBABILITY_SUM: f64 = 1.05;

/// Wrapper around the RNAstructure command line programs.
#[derive(Debug, Clone)]
pub struct RnaStructure {
    fold: PathBuf,
    ct2dot: PathBuf,
    partition: PathBuf,
    probability_plot: PathBuf,
    temp_dir: PathBuf,
    temperature_k: Option<f64>,
}

fn locate(dir: Option<&Path>, name: &str) -> Result<PathBuf> {
    let found = match dir {
        Some(dir) => which::which(dir.join(name)),
        None => which::which(name),
    };
    found.map_err(|source| Error::MissingBinary {
        name: name.to_string(),
        source,
    })
}

impl RnaStructure {
    pub fn from_config(config: &Config) -> Result<Self> {
        let dir = config.rnastructure_path.as_deref();
        let rna = Self {
            fold: locate(dir, "Fold")?,
            ct2dot: locate(dir, "ct2dot")?,
            partition: locate(dir, "partition")?,
            probability_plot: locate(dir, "ProbabilityPlot")?,
            temp_dir: config.temp_dir.clone(),
            temperature_k: config.temperature_k,
        };
        info!("Using RNAstructure from {}", rna.fold.display());
        Ok(rna)
    }

    /// `--temperature <K>` when a folding temperature is configured.
    fn temperature_args(&self) -> Vec<String> {
        self.temperature_k
            .map(|t| vec!["--temperature".to_string(), t.to_string()])
            .unwrap_or_default()
    }

    fn workspace(&self) -> Result<tempfile::TempDir> {
        fs::create_dir_all(&self.temp_dir)?;
        Ok(tempfile::Builder::new()
            .prefix("rnastructure")
            .tempdir_in(&self.temp_dir)?)
    }
}

fn run(binary: &Path, args: &[&Path], extra: &[String]) -> Result<()> {
    let tool = binary
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    debug!("Running {} {:?} {:?}", tool, args, extra);

    let output = Command::new(binary).args(args).args(extra).output()?;
    if !output.status.success() {
        return Err(Error::ToolFailed {
            tool,
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

fn write_fasta(path: &Path, sequence: &str) -> Result<()> {
    fs::write(path, format!(">reference\n{sequence}\n"))?;
    Ok(())
}

/// `index<TAB>value` lines (1-based) for the A and C bases with a measurement.
pub fn signal_file_contents(sequence: &str, signal: &[f64]) -> Result<String> {
    if signal.len() != sequence.len() {
        return Err(Error::SignalLength {
            sequence: sequence.len(),
            signal: signal.len(),
        });
    }
    Ok(sequence
        .bytes()
        .zip(signal)
        .enumerate()
        .filter(|(_, (base, value))| matches!(base, b'A' | b'C') && **value != UNKNOWN)
        .map(|(idx, (_, value))| format!("{}\t{}\n", idx + 1, value))
        .collect())
}

/// The dot-bracket line of a `ct2dot` output file.
pub fn parse_dot_file(text: &str) -> Result<String> {
    text.lines()
        .nth(2)
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .ok_or_else(|| Error::ToolOutput {
            tool: "ct2dot".to_string(),
            message: "no structure line".to_string(),
        })
}

/// Per-base pairing probability from a `ProbabilityPlot -t` table, whose rows
/// after the two header lines are `i  j  -log10(p)`.
pub fn parse_probability_plot(text: &str, length: usize) -> Result<Vec<f64>> {
    let bad_output = |message: String| Error::ToolOutput {
        tool: "ProbabilityPlot".to_string(),
        message,
    };
    let mut probabilities = vec![0.0; length];

    for line in text.lines().skip(2).filter(|l| !l.trim().is_empty()) {
        let columns: Vec<&str> = line.split_whitespace().collect();
        let [i, j, log_p] = columns[..] else {
            return Err(bad_output(format!("unexpected row {line:?}")));
        };
        let parse_index = |s: &str| {
            s.parse::<usize>()
                .ok()
                .filter(|&idx| idx >= 1 && idx <= length)
                .ok_or_else(|| bad_output(format!("index {s:?} out of range")))
        };
        let (i, j) = (parse_index(i)?, parse_index(j)?);
        let log_p: f64 = log_p
            .parse()
            .map_err(|_| bad_output(format!("bad probability {log_p:?}")))?;

        let p = 10f64.powf(-log_p);
        probabilities[i - 1] += p;
        probabilities[j - 1] += p;
    }

    if let Some(p) = probabilities
        .iter()
        .find(|p| !(0.0..=MAX_PROBABILITY_SUM).contains(*p))
    {
        return Err(bad_output(format!("pairing probability {p} out of bounds")));
    }
    Ok(probabilities.into_iter().map(|p| p.min(1.0)).collect())
}

impl StructurePredictor for RnaStructure {
    fn predict_structure(&self, sequence: &str, dms: Option<&[f64]>) -> Result<String> {
        let workspace = self.workspace()?;
        let fasta = workspace.path().join("temp.fasta");
        let ct = workspace.path().join("temp.ct");
        let dot = workspace.path().join("temp_dot.txt");
        write_fasta(&fasta, sequence)?;

        // 1) fold, guided by the signal when there is one
        let mut extra = self.temperature_args();
        if let Some(dms) = dms {
            let signal = workspace.path().join("temp.shape");
            fs::write(&signal, signal_file_contents(sequence, dms)?)?;
            extra.push("--dms".to_string());
            extra.push(signal.to_string_lossy().into_owned());
        }
        run(&self.fold, &[fasta.as_path(), ct.as_path()], &extra)?;

        // 2) first structure of the ct file to dot-bracket
        run(&self.ct2dot, &[ct.as_path(), Path::new("0"), dot.as_path()], &[])?;
        parse_dot_file(&fs::read_to_string(&dot)?)
    }

    fn predict_pairing_probabilities(
        &self,
        sequence: &str,
        signal: Option<&[f64]>,
    ) -> Result<Vec<f64>> {
        let workspace = self.workspace()?;
        let fasta = workspace.path().join("temp.fasta");
        let pfs = workspace.path().join("temp.pfs");
        let prob = workspace.path().join("temp_prob.txt");
        write_fasta(&fasta, sequence)?;

        // 1) partition function
        let mut extra = self.temperature_args();
        if let Some(signal) = signal {
            let path = workspace.path().join("temp.shape");
            fs::write(&path, signal_file_contents(sequence, signal)?)?;
            extra.push("--shape".to_string());
            extra.push(path.to_string_lossy().into_owned());
        }
        run(&self.partition, &[fasta.as_path(), pfs.as_path()], &extra)?;

        // 2) pair probabilities as text
        run(&self.probability_plot, &[pfs.as_path(), Path::new("-t"), prob.as_path()], &[])?;
        parse_probability_plot(&fs::read_to_string(&prob)?, sequence.len())
    }
}
