//! Flat-file persistence for samples and daily history
//!
//! Samples are appended to a CSV file with a header row written once on
//! creation. Daily history is an externally maintained CSV read on demand.

mod history;
mod samples;

pub use history::{training_pairs, DailyHistory, PREDICTOR_WINDOW};
pub use samples::{SampleRecord, SampleStore};

use crate::error::Result;
use std::path::Path;
use std::time::SystemTime;

/// Staleness token of a backing file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceVersion {
    pub modified: SystemTime,
    pub len: u64,
}

impl SourceVersion {
    /// Current token of `path`, or `None` when the file does not exist
    pub fn of(path: &Path) -> Result<Option<Self>> {
        match std::fs::metadata(path) {
            Ok(meta) => Ok(Some(Self {
                modified: meta.modified()?,
                len: meta.len(),
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
