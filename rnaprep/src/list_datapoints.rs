use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::{debug, info};

use crate::data_handling::bpseq::BpseqDataset;
use crate::data_handling::ct::CtDataset;
use crate::data_handling::dreem_output::DreemOutputDataset;
use crate::data_handling::fasta::FastaDataset;
use crate::data_handling::json_dump::JsonDataset;
use crate::datapoint::{Datapoint, RawDatapoint, Rejection};
use crate::error::Result;
use crate::filter::{filter, FilterConfig, FilterReport};
use crate::models::{Dataset, SignalKind};

/// Ordered datapoints, the candidates rejected on the way in and the report
/// of the last filtering pass.
#[derive(Debug, Clone, Default)]
pub struct ListOfDatapoints {
    datapoints: Vec<Datapoint>,
    rejected: Vec<Rejection>,
    filtering_report: Option<FilterReport>,
}

impl ListOfDatapoints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_raw(candidates: impl IntoIterator<Item = RawDatapoint>) -> Self {
        let mut list = Self::new();
        for raw in candidates {
            list.push_raw(raw);
        }
        list
    }

    /// Builds a datapoint from `raw`, or records why it could not be built.
    pub fn push_raw(&mut self, raw: RawDatapoint) -> bool {
        let reference = raw.reference.clone();
        match Datapoint::try_from(raw) {
            Ok(dp) => {
                self.datapoints.push(dp);
                true
            }
            Err(reason) => {
                debug!("rejected {:?}: {}", reference, reason);
                self.rejected.push(Rejection { reference, reason });
                false
            }
        }
    }

    pub fn push(&mut self, dp: Datapoint) {
        self.datapoints.push(dp);
    }

    /// Records a candidate the loader could not even turn into raw fields.
    pub(crate) fn reject(&mut self, rejection: Rejection) {
        debug!("rejected {:?}: {}", rejection.reference, rejection.reason);
        self.rejected.push(rejection);
    }

    pub fn extend(&mut self, other: ListOfDatapoints) {
        self.datapoints.extend(other.datapoints);
        self.rejected.extend(other.rejected);
    }

    pub fn len(&self) -> usize {
        self.datapoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datapoints.is_empty()
    }

    /// Datapoints plus rejected candidates.
    pub fn n_candidates(&self) -> usize {
        self.datapoints.len() + self.rejected.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Datapoint> {
        self.datapoints.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> std::slice::IterMut<'_, Datapoint> {
        self.datapoints.iter_mut()
    }

    pub(crate) fn retain(&mut self, keep: impl FnMut(&Datapoint) -> bool) {
        self.datapoints.retain(keep);
    }

    pub fn datapoints(&self) -> &[Datapoint] {
        &self.datapoints
    }

    pub fn rejected(&self) -> &[Rejection] {
        &self.rejected
    }

    pub(crate) fn take_rejected(&mut self) -> Vec<Rejection> {
        std::mem::take(&mut self.rejected)
    }

    pub fn has_structure(&self) -> bool {
        self.iter().any(|dp| dp.structure().is_some())
    }

    pub fn has_signal(&self, kind: SignalKind) -> bool {
        self.iter().any(|dp| dp.signal(kind).is_some())
    }

    pub fn filtering_report(&self) -> Option<&FilterReport> {
        self.filtering_report.as_ref()
    }

    /// Runs the default rule set with the given AUROC threshold and returns
    /// the report as text.
    pub fn filter(&mut self, min_auroc: f64) -> String {
        self.filter_with(&FilterConfig::with_min_auroc(min_auroc))
            .to_string()
    }

    pub fn filter_with(&mut self, config: &FilterConfig) -> &FilterReport {
        let report = filter(self, config);
        self.filtering_report.insert(report)
    }

    // ─── Bulk constructors ───────────────────────────────────────────────────

    pub fn from_fasta(path: impl AsRef<Path>) -> Result<Self> {
        FastaDataset::new(path.as_ref()).load(None)
    }

    pub fn from_ct(paths: &[impl AsRef<Path>]) -> Result<Self> {
        CtDataset::new(paths.iter().map(|p| p.as_ref().to_path_buf()).collect()).load(None)
    }

    pub fn from_bpseq(paths: &[impl AsRef<Path>]) -> Result<Self> {
        BpseqDataset::new(paths.iter().map(|p| p.as_ref().to_path_buf()).collect()).load(None)
    }

    pub fn from_json(path: impl AsRef<Path>) -> Result<Self> {
        JsonDataset::new(path.as_ref()).load(None)
    }

    pub fn from_dreem_output(path: impl AsRef<Path>) -> Result<Self> {
        DreemOutputDataset::new(path.as_ref()).load(None)
    }

    // ─── JSON export ─────────────────────────────────────────────────────────

    /// Writes `{`, one `"reference": {...}` entry per line, `}`.
    pub fn write_json<W: Write>(&self, mut writer: W) -> Result<()> {
        writeln!(writer, "{{")?;
        let last = self.datapoints.len().saturating_sub(1);
        for (i, dp) in self.datapoints.iter().enumerate() {
            let separator = if i == last { "" } else { "," };
            writeln!(writer, "{}{}", dp.to_json_entry()?, separator)?;
        }
        write!(writer, "}}")?;
        writer.flush()?;
        Ok(())
    }

    pub fn to_json(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        self.write_json(BufWriter::new(file))?;
        info!("Wrote {} datapoints to {}", self.len(), path.display());
        Ok(())
    }

    /// Flat map view, one object per datapoint.
    pub fn to_dict(&self) -> Vec<serde_json::Value> {
        self.iter().map(Datapoint::to_flat_value).collect()
    }
}

impl<'a> IntoIterator for &'a ListOfDatapoints {
    type Item = &'a Datapoint;
    type IntoIter = std::slice::Iter<'a, Datapoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
