//! Append-only sample store

use super::SourceVersion;
use crate::error::Result;
use crate::models::{IngestRequest, PhaseTag, PowerFeatures, Sample};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, trace};

/// One persisted row. Columns: `t,totalPower,totalEnergy,L1_p,L2_p,L3_p`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub t: Option<String>,
    #[serde(rename = "totalPower")]
    pub total_power: Option<f64>,
    #[serde(rename = "totalEnergy")]
    pub total_energy: Option<f64>,
    #[serde(rename = "L1_p")]
    pub l1_p: Option<f64>,
    #[serde(rename = "L2_p")]
    pub l2_p: Option<f64>,
    #[serde(rename = "L3_p")]
    pub l3_p: Option<f64>,
}

impl SampleRecord {
    /// Outlier features with missing values treated as 0
    pub fn features(&self) -> PowerFeatures {
        [
            self.total_power.unwrap_or(0.0),
            self.l1_p.unwrap_or(0.0),
            self.l2_p.unwrap_or(0.0),
            self.l3_p.unwrap_or(0.0),
        ]
    }
}

impl From<&IngestRequest> for SampleRecord {
    fn from(req: &IngestRequest) -> Self {
        Self {
            t: req.t.clone(),
            total_power: req.total_power,
            total_energy: req.total_energy,
            l1_p: req.phase_power(PhaseTag::L1),
            l2_p: req.phase_power(PhaseTag::L2),
            l3_p: req.phase_power(PhaseTag::L3),
        }
    }
}

impl From<&Sample> for SampleRecord {
    fn from(sample: &Sample) -> Self {
        let [l1, l2, l3] = sample.phases.powers();
        Self {
            t: Some(sample.timestamp.clone()),
            total_power: Some(sample.total_power),
            total_energy: Some(sample.total_energy),
            l1_p: Some(l1),
            l2_p: Some(l2),
            l3_p: Some(l3),
        }
    }
}

/// CSV-backed sample store. Appends are serialised by an internal lock;
/// reads are unlocked and skip rows they cannot decode.
pub struct SampleStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl SampleStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record, writing the header first if the file is new
    pub fn append(&self, record: &SampleRecord) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());

        let is_new = match std::fs::metadata(&self.path) {
            Ok(meta) => meta.len() == 0,
            Err(_) => true,
        };
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(is_new)
            .from_writer(file);
        writer.serialize(record)?;
        writer.flush()?;

        trace!(path = %self.path.display(), header = is_new, "Appended sample");
        Ok(())
    }

    /// Every decodable record, oldest first. A missing file reads as empty.
    pub fn read_all(&self) -> Result<Vec<SampleRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(&self.path)?;

        let mut records = Vec::new();
        for (row, result) in reader.deserialize::<SampleRecord>().enumerate() {
            match result {
                Ok(record) => records.push(record),
                Err(e) if e.is_io_error() => return Err(e.into()),
                Err(e) => debug!(row = row, error = %e, "Skipping unreadable sample row"),
            }
        }
        Ok(records)
    }

    /// The most recent `n` records (all of them if fewer), oldest first
    pub fn read_recent(&self, n: usize) -> Result<Vec<SampleRecord>> {
        let mut records = self.read_all()?;
        let skip = records.len().saturating_sub(n);
        records.drain(..skip);
        Ok(records)
    }

    /// Staleness token of the backing file
    pub fn version(&self) -> Result<Option<SourceVersion>> {
        SourceVersion::of(&self.path)
    }
}
