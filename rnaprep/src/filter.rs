//! Validation, deduplication and quality filtering of a collection.
//!
//! The rule set is an ordered list of [`FilterStep`]s held by a
//! [`FilterConfig`]. Each step is a plain function over the collection, so a
//! single rule can be run and tested on its own.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;

use tracing::{debug, info};

use crate::analysis::roc::{datapoint_auroc, AurocScore};
use crate::datapoint::Datapoint;
use crate::list_datapoints::ListOfDatapoints;
use crate::models::{BasePair, SignalKind};

pub const DEFAULT_MIN_AUROC: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterStep {
    /// Remove candidates that failed construction.
    DropInvalid,
    /// Remove records whose pairing is not well formed.
    DropBadStructures,
    /// Rename repeated references to `<reference>_<n>`.
    RenameSameReference,
    /// Keep the first record per (sequence, structure) and per (sequence, signal).
    DropDuplicates,
    /// Report, without removing, records sharing a sequence with another one.
    CountSameSequence,
    /// Remove records whose signal disagrees with their structure.
    DropLowAuroc,
}

impl FilterStep {
    pub const DEFAULT_ORDER: [FilterStep; 6] = [
        FilterStep::DropInvalid,
        FilterStep::DropBadStructures,
        FilterStep::RenameSameReference,
        FilterStep::DropDuplicates,
        FilterStep::CountSameSequence,
        FilterStep::DropLowAuroc,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FilterStep::DropInvalid => "drop_invalid",
            FilterStep::DropBadStructures => "drop_bad_structures",
            FilterStep::RenameSameReference => "rename_same_reference",
            FilterStep::DropDuplicates => "drop_duplicates",
            FilterStep::CountSameSequence => "count_same_sequence",
            FilterStep::DropLowAuroc => "drop_low_auroc",
        }
    }

    fn apply(self, list: &mut ListOfDatapoints, config: &FilterConfig, report: &mut FilterReport) {
        match self {
            FilterStep::DropInvalid => report.n_invalid += drop_invalid(list),
            FilterStep::DropBadStructures => report.n_bad_structure += drop_bad_structures(list),
            FilterStep::RenameSameReference => {
                report.n_same_reference += rename_same_reference(list)
            }
            FilterStep::DropDuplicates => report.n_duplicates += drop_duplicates(list),
            FilterStep::CountSameSequence => {
                let conflicts = count_same_sequence(list);
                report.n_same_sequence = conflicts.iter().map(|c| c.references.len() - 1).sum();
                report.conflicts = conflicts;
            }
            FilterStep::DropLowAuroc => {
                let before = list.len();
                report.auroc_scores = drop_low_auroc(list, config);
                report.n_low_auroc += before - list.len();
            }
        }
        debug!("filter step {} done, {} datapoints left", self.name(), list.len());
    }
}

/// What to do with a record that carries both a DMS and a SHAPE signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum DualSignalPolicy {
    /// Keep the record without scoring it.
    #[default]
    Exempt,
    /// Score the DMS signal only.
    PreferDms,
    /// Score both signals, keep the record only if both pass.
    RequireBoth,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterConfig {
    pub steps: Vec<FilterStep>,
    pub min_auroc: f64,
    pub dual_signal: DualSignalPolicy,
    /// Score DMS on A/C bases only.
    pub dms_ac_only: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            steps: FilterStep::DEFAULT_ORDER.to_vec(),
            min_auroc: DEFAULT_MIN_AUROC,
            dual_signal: DualSignalPolicy::default(),
            dms_ac_only: false,
        }
    }
}

impl FilterConfig {
    pub fn with_min_auroc(min_auroc: f64) -> Self {
        Self {
            min_auroc,
            ..Self::default()
        }
    }
}

/// Records that share a sequence but differ in structure or signal.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceConflict {
    pub sequence: String,
    /// References in collection order; the first one is the earliest record.
    pub references: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterReport {
    pub n_input: usize,
    pub n_output: usize,
    pub n_invalid: usize,
    pub n_bad_structure: usize,
    pub n_same_reference: usize,
    pub n_duplicates: usize,
    pub n_same_sequence: usize,
    pub n_low_auroc: usize,
    pub min_auroc: f64,
    pub conflicts: Vec<SequenceConflict>,
    pub auroc_scores: Vec<AurocScore>,
    pub steps: Vec<FilterStep>,
}

impl FilterReport {
    fn ran(&self, step: FilterStep) -> bool {
        self.steps.contains(&step)
    }
}

impl fmt::Display for FilterReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Over a total of {} datapoints, there are:", self.n_input)?;
        writeln!(f, "### OUTPUT")?;
        writeln!(f, "- {} valid datapoints", self.n_output)?;
        writeln!(f, "### MODIFIED")?;
        if self.ran(FilterStep::RenameSameReference) {
            writeln!(
                f,
                "- {} multiple sequences with the same reference (renamed reference)",
                self.n_same_reference
            )?;
        }
        if self.ran(FilterStep::CountSameSequence) {
            writeln!(
                f,
                "- {} duplicate sequences with different structure / dms / shape",
                self.n_same_sequence
            )?;
        }
        write!(f, "### FILTERED OUT")?;
        if self.ran(FilterStep::DropInvalid) {
            write!(
                f,
                "\n- {} invalid datapoints (ex: sequence with non-regular characters)",
                self.n_invalid
            )?;
        }
        if self.ran(FilterStep::DropBadStructures) {
            write!(f, "\n- {} datapoints with bad structures", self.n_bad_structure)?;
        }
        if self.ran(FilterStep::DropDuplicates) {
            write!(
                f,
                "\n- {} duplicate sequences with the same structure / dms / shape",
                self.n_duplicates
            )?;
        }
        if self.ran(FilterStep::DropLowAuroc) {
            write!(
                f,
                "\n- {} datapoints removed because of low AUROC (<{})",
                self.n_low_auroc, self.min_auroc
            )?;
        }
        Ok(())
    }
}

/// Runs every configured step in order and reports what each one did.
pub fn filter(list: &mut ListOfDatapoints, config: &FilterConfig) -> FilterReport {
    let mut report = FilterReport {
        n_input: list.n_candidates(),
        min_auroc: config.min_auroc,
        steps: config.steps.clone(),
        ..FilterReport::default()
    };

    for step in &config.steps {
        step.apply(list, config, &mut report);
    }
    report.n_output = list.len();

    info!(
        "Filtered {} candidates down to {} datapoints",
        report.n_input, report.n_output
    );
    report
}

// ─────────────────────────────────────────────────────────────────────────────
// Steps
// ─────────────────────────────────────────────────────────────────────────────

pub fn drop_invalid(list: &mut ListOfDatapoints) -> usize {
    list.take_rejected().len()
}

pub fn drop_bad_structures(list: &mut ListOfDatapoints) -> usize {
    let before = list.len();
    list.retain(|dp| dp.assert_structure());
    before - list.len()
}

/// Returns the number of renamed records. The first occurrence of a
/// reference keeps it; later ones get the smallest free `_<n>` suffix
/// starting from their occurrence count.
pub fn rename_same_reference(list: &mut ListOfDatapoints) -> usize {
    let mut taken: HashSet<String> = list.iter().map(|dp| dp.reference().to_string()).collect();
    let mut occurrences: HashMap<String, usize> = HashMap::new();
    let mut renamed = 0;

    for dp in list.iter_mut() {
        let reference = dp.reference().to_string();
        let count = occurrences.entry(reference.clone()).or_insert(0);
        if *count > 0 {
            let mut n = *count;
            let mut candidate = format!("{reference}_{n}");
            while taken.contains(&candidate) {
                n += 1;
                candidate = format!("{reference}_{n}");
            }
            debug!("renaming repeated reference {} to {}", reference, candidate);
            taken.insert(candidate.clone());
            dp.rename(candidate);
            renamed += 1;
        }
        *count += 1;
    }
    renamed
}

fn structure_key(dp: &Datapoint) -> Option<Vec<BasePair>> {
    dp.structure().map(|pairs| {
        let mut pairs: Vec<BasePair> = pairs
            .iter()
            .map(|&(i, j)| if i <= j { (i, j) } else { (j, i) })
            .collect();
        pairs.sort_unstable();
        pairs
    })
}

fn signal_key(dp: &Datapoint, kind: SignalKind) -> Option<Vec<u64>> {
    dp.signal(kind)
        .map(|values| values.iter().map(|v| v.to_bits()).collect())
}

/// Keeps the first record for every `(sequence, key)`; returns how many went.
fn dedup_by<K, F>(list: &mut ListOfDatapoints, key: F) -> usize
where
    K: Hash + Eq,
    F: Fn(&Datapoint) -> K,
{
    let before = list.len();
    let mut seen = HashSet::new();
    list.retain(|dp| seen.insert((dp.sequence().to_string(), key(dp))));
    before - list.len()
}

/// Absent fields compare equal, so a collection without any structure or
/// signal is deduplicated on the sequence alone.
pub fn drop_duplicates(list: &mut ListOfDatapoints) -> usize {
    let has_structure = list.has_structure();
    let signals: Vec<SignalKind> = SignalKind::ALL
        .into_iter()
        .filter(|&kind| list.has_signal(kind))
        .collect();

    let mut removed = 0;
    if has_structure || signals.is_empty() {
        removed += dedup_by(list, structure_key);
    }
    for kind in signals {
        removed += dedup_by(list, |dp| signal_key(dp, kind));
    }
    removed
}

pub fn count_same_sequence(list: &ListOfDatapoints) -> Vec<SequenceConflict> {
    let mut groups: Vec<SequenceConflict> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for dp in list.iter() {
        match index.get(dp.sequence()) {
            Some(&i) => groups[i].references.push(dp.reference().to_string()),
            None => {
                index.insert(dp.sequence(), groups.len());
                groups.push(SequenceConflict {
                    sequence: dp.sequence().to_string(),
                    references: vec![dp.reference().to_string()],
                });
            }
        }
    }

    groups.retain(|g| g.references.len() > 1);
    groups
}

fn signals_to_score(dp: &Datapoint, policy: DualSignalPolicy) -> Vec<SignalKind> {
    match (dp.dms().is_some(), dp.shape().is_some()) {
        (true, true) => match policy {
            DualSignalPolicy::Exempt => vec![],
            DualSignalPolicy::PreferDms => vec![SignalKind::Dms],
            DualSignalPolicy::RequireBoth => SignalKind::ALL.to_vec(),
        },
        (true, false) => vec![SignalKind::Dms],
        (false, true) => vec![SignalKind::Shape],
        (false, false) => vec![],
    }
}

/// Removes records scoring below `config.min_auroc` and returns every score computed.
pub fn drop_low_auroc(list: &mut ListOfDatapoints, config: &FilterConfig) -> Vec<AurocScore> {
    let mut scores = Vec::new();

    list.retain(|dp| {
        let computed: Vec<(SignalKind, f64)> = signals_to_score(dp, config.dual_signal)
            .into_iter()
            .filter_map(|kind| datapoint_auroc(dp, kind, config.dms_ac_only).map(|a| (kind, a)))
            .collect();

        let kept = computed.iter().all(|&(_, auroc)| auroc >= config.min_auroc);
        scores.extend(computed.into_iter().map(|(signal, auroc)| AurocScore {
            reference: dp.reference().to_string(),
            signal,
            auroc,
            kept,
        }));
        kept
    });
    scores
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datapoint::RawDatapoint;

    fn raw(reference: &str, sequence: &str) -> RawDatapoint {
        RawDatapoint::new(reference, sequence)
    }

    /// The mixed collection used across several tests.
    fn mixed() -> ListOfDatapoints {
        ListOfDatapoints::from_raw(vec![
            raw("ref1", "AACCGG")
                .with_structure(vec![(1, 2), (3, 4)])
                .with_dms(vec![1.0, 0.0, 0.0, 0.0, 0.0, 1.0]),
            raw("ref2", "AACCGG")
                .with_structure(vec![(1, 2), (3, 4)])
                .with_dms(vec![1.0, 0.0, 0.0, 0.0, 0.0, 1.0]),
            raw("ref2", "AACCGG")
                .with_structure(vec![(1, 2), (3, 4)])
                .with_dms(vec![1.0, 0.0, 0.0, 0.0, 0.0, 1.0]),
            raw("ref4", "AUGGC")
                .with_structure(vec![(1, 2)])
                .with_dms(vec![0.0, 0.0, 0.0, 0.0, 1.0]),
            raw("ref5", "AUGGC")
                .with_structure(vec![(0, 4), (2, 3)])
                .with_dms(vec![0.0, 0.0, 0.0, 0.0, 0.0]),
            raw("ref6", "not a regular sequence")
                .with_structure(vec![(0, 4)])
                .with_dms(vec![0.0, 0.0, 0.0, 0.0, 0.0]),
        ])
    }

    fn references(list: &ListOfDatapoints) -> Vec<&str> {
        list.iter().map(|dp| dp.reference()).collect()
    }

    #[test]
    fn full_report_without_auroc_threshold() {
        let mut list = mixed();
        let report = filter(&mut list, &FilterConfig::with_min_auroc(0.0));

        assert_eq!(report.n_input, 6);
        assert_eq!(report.n_output, 3);
        assert_eq!(report.n_invalid, 1);
        assert_eq!(report.n_bad_structure, 0);
        assert_eq!(report.n_same_reference, 1);
        assert_eq!(report.n_duplicates, 2);
        assert_eq!(report.n_same_sequence, 1);
        assert_eq!(report.n_low_auroc, 0);
        assert_eq!(references(&list), vec!["ref1", "ref4", "ref5"]);
        assert_eq!(
            report.conflicts,
            vec![SequenceConflict {
                sequence: "AUGGC".to_string(),
                references: vec!["ref4".to_string(), "ref5".to_string()],
            }]
        );

        let text = report.to_string();
        assert!(text.starts_with("Over a total of 6 datapoints, there are:"));
        assert!(text.contains("- 3 valid datapoints"));
        assert!(text.contains("- 2 duplicate sequences with the same structure / dms / shape"));
        assert!(text.contains("- 0 datapoints removed because of low AUROC (<0)"));
    }

    #[test]
    fn default_threshold_drops_poor_pairs() {
        let mut list = mixed();
        let report = filter(&mut list, &FilterConfig::default());
        // ref4 scores 2/3, ref5 has a constant signal
        assert_eq!(report.n_low_auroc, 2);
        assert_eq!(references(&list), vec!["ref1"]);
        assert!(report
            .auroc_scores
            .iter()
            .any(|s| s.reference == "ref1" && s.auroc == 1.0 && s.kept));
    }

    #[test]
    fn empty_collection() {
        let mut list = ListOfDatapoints::default();
        let report = filter(&mut list, &FilterConfig::default());
        assert_eq!(
            (report.n_input, report.n_output, report.n_invalid, report.n_duplicates),
            (0, 0, 0, 0)
        );
        assert!(report.to_string().contains("- 0 valid datapoints"));
    }

    #[test]
    fn wrong_length_signals_are_invalid() {
        let mut list = ListOfDatapoints::from_raw(vec![
            raw("ok", "AACCGG")
                .with_structure(vec![(1, 2), (3, 4)])
                .with_dms(vec![1.0, 0.0, 0.0, 0.0, 0.0, 1.0]),
            raw("long", "AACCGG")
                .with_structure(vec![(1, 2), (3, 4)])
                .with_dms(vec![1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0]),
        ]);
        let report = filter(&mut list, &FilterConfig::default());
        assert_eq!(report.n_invalid, 1);
        assert_eq!(references(&list), vec!["ok"]);
        assert!(report.auroc_scores.iter().all(|s| s.reference == "ok"));
    }

    #[test]
    fn bad_structures_are_dropped() {
        let mut list = ListOfDatapoints::from_raw(vec![
            raw("ok", "AACCGG").with_structure(vec![(0, 5)]),
            raw("shared", "AACCGG").with_structure(vec![(0, 5), (0, 4)]),
            raw("range", "AACCGG").with_structure(vec![(0, 6)]),
        ]);
        assert_eq!(drop_bad_structures(&mut list), 2);
        assert_eq!(references(&list), vec!["ok"]);
    }

    #[test]
    fn repeated_references_are_renamed() {
        let mut list = ListOfDatapoints::from_raw(vec![
            raw("r", "AAAA"),
            raw("r", "CCCC"),
            raw("r_1", "GGGG"),
            raw("r", "UUUU"),
        ]);
        assert_eq!(rename_same_reference(&mut list), 2);
        assert_eq!(references(&list), vec!["r", "r_2", "r_1", "r_3"]);
    }

    #[test]
    fn collision_keeps_both_records() {
        let mut list = ListOfDatapoints::from_raw(vec![raw("r", "AAAA"), raw("r", "CCCC")]);
        let report = filter(&mut list, &FilterConfig::default());
        assert_eq!(report.n_output, 2);
        assert_eq!(report.n_same_reference, 1);
        assert_eq!(references(&list), vec!["r", "r_1"]);
    }

    #[test]
    fn first_duplicate_wins() {
        let mut list = ListOfDatapoints::from_raw(vec![
            raw("first", "AACCGG").with_dotbracket("((..))"),
            raw("second", "AACCGG").with_structure(vec![(0, 5), (1, 4)]),
            raw("third", "AACCGG").with_dotbracket("(....)"),
        ]);
        assert_eq!(drop_duplicates(&mut list), 1);
        assert_eq!(references(&list), vec!["first", "third"]);
    }

    #[test]
    fn signal_duplicates_are_counted_per_signal() {
        let mut list = ListOfDatapoints::from_raw(vec![
            raw("a", "ACGU").with_dms(vec![0.1, 0.2, 0.3, 0.4]),
            raw("b", "ACGU").with_dms(vec![0.1, 0.2, 0.3, 0.4]),
            raw("c", "ACGU").with_shape(vec![0.5, 0.5, 0.5, 0.5]),
            raw("d", "ACGU").with_shape(vec![0.5, 0.5, 0.5, 0.5]),
        ]);
        // b repeats a's dms, d repeats c's missing dms
        assert_eq!(drop_duplicates(&mut list), 2);
        assert_eq!(references(&list), vec!["a", "c"]);
    }

    #[test]
    fn plain_sequences_dedup_on_sequence() {
        let mut list = ListOfDatapoints::from_raw(vec![raw("x", "ACGU"), raw("y", "acgt")]);
        assert_eq!(drop_duplicates(&mut list), 1);
        assert_eq!(references(&list), vec!["x"]);
    }

    #[test]
    fn dual_signal_policies() {
        let both = || {
            ListOfDatapoints::from_raw(vec![raw("both", "AACCGG")
                .with_structure(vec![(1, 2), (3, 4)])
                .with_dms(vec![1.0, 0.0, 0.0, 0.0, 0.0, 1.0])
                .with_shape(vec![0.0, 1.0, 1.0, 1.0, 1.0, 0.0])])
        };
        let run = |policy| {
            let mut list = both();
            let config = FilterConfig {
                dual_signal: policy,
                ..FilterConfig::default()
            };
            drop_low_auroc(&mut list, &config);
            list.len()
        };

        assert_eq!(run(DualSignalPolicy::Exempt), 1);
        assert_eq!(run(DualSignalPolicy::PreferDms), 1);
        assert_eq!(run(DualSignalPolicy::RequireBoth), 0);
    }

    #[test]
    fn single_class_labels_fail() {
        let mut list = ListOfDatapoints::from_raw(vec![
            raw("all_unpaired", "ACGU")
                .with_structure(vec![])
                .with_dms(vec![0.1, 0.9, 0.2, 0.8]),
            raw("no_structure", "ACGUA").with_dms(vec![0.1, 0.9, 0.2, 0.8, 0.3]),
        ]);
        let scores = drop_low_auroc(&mut list, &FilterConfig::default());
        assert_eq!(references(&list), vec!["no_structure"]);
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].auroc, 0.0);
    }

    #[test]
    fn steps_can_be_disabled() {
        let mut list = mixed();
        let config = FilterConfig {
            steps: vec![FilterStep::DropInvalid, FilterStep::RenameSameReference],
            ..FilterConfig::default()
        };
        let report = filter(&mut list, &config);
        assert_eq!(report.n_output, 5);
        let text = report.to_string();
        assert!(!text.contains("AUROC"));
        assert!(!text.contains("bad structures"));
    }
}
