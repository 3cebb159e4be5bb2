use std::cmp::Ordering;
use std::fs::File;
use std::path::Path;

use polars::prelude::*;
use tracing::{debug, info};

use crate::datapoint::Datapoint;
use crate::models::SignalKind;
use crate::UNKNOWN;

/// One scored record, as kept by the AUROC filter step.
#[derive(Debug, Clone, PartialEq)]
pub struct AurocScore {
    pub reference: String,
    pub signal: SignalKind,
    pub auroc: f64,
    pub kept: bool,
}

/// Calculate ROC curve points (FPR and TPR), one point per distinct score.
///
/// Returns `None` when all instances are in one class, every score is the
/// same or some score is NaN.
pub fn calculate_roc(labels: &[bool], scores: &[f64]) -> Option<(Vec<f64>, Vec<f64>)> {
    let n = labels.len().min(scores.len());
    if scores[..n].iter().any(|s| s.is_nan()) {
        debug!("NaN score. ROC curve is undefined.");
        return None;
    }
    let positive_count = labels[..n].iter().filter(|&&x| x).count();
    let negative_count = n - positive_count;

    if positive_count == 0 || negative_count == 0 {
        debug!("All instances are in one class. ROC curve is degenerate.");
        return None;
    }

    // Pair predictions with actual labels and sort by prediction (descending)
    let mut paired_data: Vec<(f64, bool)> = scores[..n]
        .iter()
        .cloned()
        .zip(labels[..n].iter().cloned())
        .collect();
    paired_data.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

    if paired_data.first().map(|p| p.0) == paired_data.last().map(|p| p.0) {
        debug!("Constant score. ROC curve is degenerate.");
        return None;
    }

    let mut tpr_values = vec![0.0];
    let mut fpr_values = vec![0.0];
    let mut tp = 0usize;
    let mut fp = 0usize;

    // tied scores move the curve diagonally in a single step
    let mut i = 0;
    while i < paired_data.len() {
        let threshold = paired_data[i].0;
        while i < paired_data.len() && paired_data[i].0 == threshold {
            if paired_data[i].1 {
                tp += 1;
            } else {
                fp += 1;
            }
            i += 1;
        }
        tpr_values.push(tp as f64 / positive_count as f64);
        fpr_values.push(fp as f64 / negative_count as f64);
    }

    Some((fpr_values, tpr_values))
}

/// Calculate Area Under ROC Curve using trapezoidal rule
pub fn calculate_auc(fpr: &[f64], tpr: &[f64]) -> f64 {
    if fpr.len() != tpr.len() || fpr.len() < 2 {
        return 0.0;
    }

    let mut auc = 0.0;
    for i in 1..fpr.len() {
        let width = fpr[i] - fpr[i - 1];
        let height = (tpr[i] + tpr[i - 1]) / 2.0;
        auc += width * height;
    }

    auc
}

/// AUROC with a degenerate curve scored as 0.
pub fn auroc(labels: &[bool], scores: &[f64]) -> f64 {
    match calculate_roc(labels, scores) {
        Some((fpr, tpr)) => calculate_auc(&fpr, &tpr),
        None => 0.0,
    }
}

/// How well `signal` separates unpaired (positive) from paired bases.
///
/// `None` when the record has no structure or no such signal. Positions
/// holding [`UNKNOWN`] are skipped, and so are G/U positions of a DMS signal
/// when `dms_ac_only` is set.
pub fn datapoint_auroc(dp: &Datapoint, signal: SignalKind, dms_ac_only: bool) -> Option<f64> {
    let pairs = dp.structure()?;
    let values = dp.signal(signal)?;

    let mut unpaired = vec![true; dp.len()];
    for &(i, j) in pairs {
        for idx in [i, j] {
            if let Some(slot) = unpaired.get_mut(idx) {
                *slot = false;
            }
        }
    }

    let (labels, scores): (Vec<bool>, Vec<f64>) = dp
        .sequence()
        .bytes()
        .zip(unpaired)
        .zip(values.iter().copied())
        .filter(|((base, _), value)| {
            *value != UNKNOWN
                && !value.is_nan()
                && !(dms_ac_only && signal == SignalKind::Dms && matches!(base, b'G' | b'U'))
        })
        .map(|((_, is_unpaired), value)| (is_unpaired, value))
        .unzip();

    Some(auroc(&labels, &scores))
}

/// Save AUROC values to a CSV file
pub fn save_auroc_values(path: &Path, scores: &[AurocScore]) -> PolarsResult<()> {
    let mut df = DataFrame::new(vec![
        Column::new(
            "reference".into(),
            scores.iter().map(|s| s.reference.as_str()).collect::<Vec<_>>(),
        ),
        Column::new(
            "signal".into(),
            scores.iter().map(|s| s.signal.name()).collect::<Vec<_>>(),
        ),
        Column::new(
            "auroc".into(),
            scores.iter().map(|s| s.auroc).collect::<Vec<f64>>(),
        ),
        Column::new(
            "kept".into(),
            scores.iter().map(|s| s.kept).collect::<Vec<bool>>(),
        ),
    ])?;

    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut df)?;

    info!("AUROC values saved to: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datapoint::RawDatapoint;

    fn datapoint(raw: RawDatapoint) -> Datapoint {
        Datapoint::try_from(raw).unwrap()
    }

    #[test]
    fn perfect_separation() {
        let labels = [true, false, false, true];
        let scores = [0.9, 0.1, 0.2, 0.8];
        assert_eq!(auroc(&labels, &scores), 1.0);
        assert_eq!(auroc(&labels, &[0.1, 0.9, 0.8, 0.2]), 0.0);
    }

    #[test]
    fn ties_count_half() {
        // positives {0, 0, 1} vs negatives {0, 0}: 2 wins + 4 ties out of 6
        let labels = [true, false, false, true, true];
        let scores = [0.0, 0.0, 0.0, 0.0, 1.0];
        assert!((auroc(&labels, &scores) - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn degenerate_inputs_score_zero() {
        assert_eq!(auroc(&[true, true], &[0.1, 0.2]), 0.0);
        assert_eq!(auroc(&[true, false, true], &[0.5, 0.5, 0.5]), 0.0);
        assert_eq!(auroc(&[], &[]), 0.0);
        assert_eq!(auroc(&[true, false, true], &[0.9, f64::NAN, 0.1]), 0.0);
    }

    #[test]
    fn datapoint_scores() {
        let dp = datapoint(
            RawDatapoint::new("ref", "AACCGG")
                .with_structure(vec![(1, 2), (3, 4)])
                .with_dms(vec![1.0, 0.0, 0.0, 0.0, 0.0, 1.0]),
        );
        assert_eq!(datapoint_auroc(&dp, SignalKind::Dms, false), Some(1.0));
        assert_eq!(datapoint_auroc(&dp, SignalKind::Dms, true), Some(1.0));
        assert_eq!(datapoint_auroc(&dp, SignalKind::Shape, false), None);
    }

    #[test]
    fn unknown_positions_are_masked() {
        let dp = datapoint(
            RawDatapoint::new("ref", "AACCGG")
                .with_structure(vec![(1, 2), (3, 4)])
                .with_dms(vec![1.0, 0.0, 0.0, 0.0, 0.0, UNKNOWN]),
        );
        assert_eq!(datapoint_auroc(&dp, SignalKind::Dms, false), Some(1.0));

        // only unpaired position left once the A/C mask is applied
        let dp = datapoint(
            RawDatapoint::new("ref", "AUGGC")
                .with_structure(vec![(1, 2)])
                .with_dms(vec![0.0, 0.0, 0.0, 0.0, 1.0]),
        );
        assert_eq!(datapoint_auroc(&dp, SignalKind::Dms, true), Some(0.0));
        let unmasked = datapoint_auroc(&dp, SignalKind::Dms, false).unwrap();
        assert!((unmasked - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn no_structure_is_not_scored() {
        let dp = datapoint(RawDatapoint::new("ref", "AACCGG").with_dms(vec![0.0; 6]));
        assert_eq!(datapoint_auroc(&dp, SignalKind::Dms, false), None);
    }

    #[test]
    fn auroc_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auroc.csv");
        let scores = vec![AurocScore {
            reference: "ref".to_string(),
            signal: SignalKind::Dms,
            auroc: 0.5,
            kept: false,
        }];
        save_auroc_values(&path, &scores).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("reference,signal,auroc,kept"));
        assert!(written.contains("ref,dms,0.5,false"));
    }
}
