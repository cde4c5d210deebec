//! Daily energy history supplied out-of-band

use super::SourceVersion;
use crate::error::{MeterError, Result};
use crate::models::{parse_timestamp, DailyHistoryRecord};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Number of past days fed to the predictor
pub const PREDICTOR_WINDOW: usize = 7;

#[derive(Debug, Deserialize)]
struct HistoryRow {
    date: String,
    #[serde(rename = "totalEnergy")]
    total_energy: f64,
}

/// Read-only view over the `date,totalEnergy` history file
#[derive(Debug, Clone)]
pub struct DailyHistory {
    path: PathBuf,
}

impl DailyHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Staleness token, `None` when the file does not exist
    pub fn version(&self) -> Result<Option<SourceVersion>> {
        SourceVersion::of(&self.path)
    }

    /// Load every record sorted by date. Any malformed row fails the load.
    pub fn load(&self) -> Result<Vec<DailyHistoryRecord>> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&self.path)?;

        let mut records = Vec::new();
        for result in reader.deserialize::<HistoryRow>() {
            let row = result?;
            let date = parse_timestamp(&row.date)
                .ok_or_else(|| MeterError::InvalidRecord(format!("bad date '{}'", row.date)))?
                .date();
            records.push(DailyHistoryRecord {
                date,
                total_energy: row.total_energy,
            });
        }
        records.sort_by_key(|r| r.date);
        Ok(records)
    }

    /// Daily energy totals in date order
    pub fn series(&self) -> Result<Vec<f64>> {
        Ok(self.load()?.into_iter().map(|r| r.total_energy).collect())
    }
}

/// Slide a `PREDICTOR_WINDOW`-day window over the series. Pair `i` maps
/// `series[i-7..i]` to `series[i]`.
pub fn training_pairs(series: &[f64]) -> (Vec<Vec<f64>>, Vec<f64>) {
    (PREDICTOR_WINDOW..series.len())
        .map(|i| (series[i - PREDICTOR_WINDOW..i].to_vec(), series[i]))
        .unzip()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_sorts_by_date() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("daily_history.csv");
        std::fs::write(
            &path,
            "date,totalEnergy\n2026-01-03,3.0\n2026-01-01,1.0\n2026-01-02,2.0\n",
        )
        .unwrap();

        let history = DailyHistory::new(path);
        assert_eq!(history.series().unwrap(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_malformed_row_fails_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("daily_history.csv");
        std::fs::write(&path, "date,totalEnergy\n2026-01-01,1.0\nlast tuesday,2.0\n").unwrap();
        assert!(DailyHistory::new(path).load().is_err());
    }

    #[test]
    fn test_missing_file_has_no_version() {
        let dir = TempDir::new().unwrap();
        let history = DailyHistory::new(dir.path().join("none.csv"));
        assert!(history.version().unwrap().is_none());
        assert!(history.load().is_err());
    }

    #[test]
    fn test_training_pairs_windowing() {
        let series: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let (x, y) = training_pairs(&series);
        assert_eq!(x.len(), 3);
        assert_eq!(x[0], vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(y, vec![7.0, 8.0, 9.0]);
        assert!(training_pairs(&series[..7]).0.is_empty());
    }
}
