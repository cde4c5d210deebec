//! Staleness-aware cache of the trained daily-energy predictor

use super::{LinearRegression, Regressor};
use crate::error::Result;
use crate::slot::{ModelSlot, RefreshOutcome};
use crate::store::{training_pairs, DailyHistory, SourceVersion, PREDICTOR_WINDOW};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Minimum supervised pairs required before a model is fitted
pub const MIN_TRAINING_PAIRS: usize = 5;

/// A fitted predictor and the history version it was trained on
pub struct TrainedPredictor {
    pub regressor: Box<dyn Regressor>,
    pub source_version: SourceVersion,
    pub fitted_at: DateTime<Utc>,
    pub training_pairs: usize,
}

impl std::fmt::Debug for TrainedPredictor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrainedPredictor")
            .field("regressor", &self.regressor.name())
            .field("source_version", &self.source_version)
            .field("fitted_at", &self.fitted_at)
            .field("training_pairs", &self.training_pairs)
            .finish()
    }
}

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub fits: u64,
    pub hits: u64,
    pub failures: u64,
    pub valid: bool,
}

enum Retrain {
    Fitted(TrainedPredictor),
    /// Number of supervised pairs that were available
    TooFew(usize),
}

/// Holds the predictor trained from the daily history, retraining only when
/// the history file's version token changes.
pub struct ModelCache {
    history: DailyHistory,
    slot: ModelSlot<TrainedPredictor>,
    fits: AtomicU64,
    hits: AtomicU64,
    failures: AtomicU64,
}

impl ModelCache {
    pub fn new(history: DailyHistory) -> Self {
        Self {
            history,
            slot: ModelSlot::new(),
            fits: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Current model, retraining first if the history changed
    pub fn get(&self) -> Option<Arc<TrainedPredictor>> {
        self.refresh().model()
    }

    /// Revalidate against the history file and report what happened
    pub fn refresh(&self) -> RefreshOutcome<TrainedPredictor> {
        let version = match self.history.version() {
            Ok(Some(version)) => version,
            Ok(None) => {
                debug!(path = %self.history.path().display(), "Daily history not found");
                self.slot.invalidate();
                return RefreshOutcome::MissingSource;
            }
            Err(e) => return self.fail(e.to_string()),
        };

        if let Some(model) = self.slot.current() {
            if model.source_version == version {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return RefreshOutcome::Reused(model);
            }
        }

        match self.retrain(version) {
            Ok(Retrain::Fitted(model)) => RefreshOutcome::Retrained(self.slot.publish(model)),
            Ok(Retrain::TooFew(available)) => {
                self.slot.invalidate();
                RefreshOutcome::Insufficient {
                    available,
                    required: MIN_TRAINING_PAIRS,
                }
            }
            Err(e) => self.fail(e.to_string()),
        }
    }

    fn retrain(&self, version: SourceVersion) -> Result<Retrain> {
        let series = self.history.series()?;
        let (x, y) = training_pairs(&series);
        if x.len() < MIN_TRAINING_PAIRS {
            debug!(
                pairs = x.len(),
                required = MIN_TRAINING_PAIRS,
                "Not enough daily history to train predictor"
            );
            return Ok(Retrain::TooFew(x.len()));
        }

        let regressor = LinearRegression::fit(&x, &y)?;
        self.fits.fetch_add(1, Ordering::Relaxed);
        info!(
            pairs = x.len(),
            path = %self.history.path().display(),
            "Trained linear regression predictor from daily history"
        );

        Ok(Retrain::Fitted(TrainedPredictor {
            regressor: Box::new(regressor),
            source_version: version,
            fitted_at: Utc::now(),
            training_pairs: x.len(),
        }))
    }

    fn fail(&self, reason: String) -> RefreshOutcome<TrainedPredictor> {
        error!(error = %reason, "Predictor retraining failed");
        self.failures.fetch_add(1, Ordering::Relaxed);
        self.slot.invalidate();
        RefreshOutcome::Failed(reason)
    }

    /// Drop the published model after a refresh that did not finish
    pub fn invalidate(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        self.slot.invalidate();
    }

    /// Published model without revalidation
    pub fn current(&self) -> Option<Arc<TrainedPredictor>> {
        self.slot.current()
    }

    /// Forecast the next day's energy from the last seven history entries.
    /// `Ok(None)` when no model is published or the history is too short.
    pub fn predict_next(&self) -> Result<Option<f64>> {
        let Some(model) = self.slot.current() else {
            return Ok(None);
        };
        if !self.history.path().exists() {
            return Ok(None);
        }
        let series = self.history.series()?;
        if series.len() < PREDICTOR_WINDOW {
            return Ok(None);
        }
        let window = &series[series.len() - PREDICTOR_WINDOW..];
        model.regressor.predict(window).map(Some)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            fits: self.fits.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            valid: self.slot.is_valid(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_history(path: &Path, days: usize) {
        let mut content = String::from("date,totalEnergy\n");
        let start = chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        for i in 0..days {
            let date = start + chrono::Duration::days(i as i64);
            content.push_str(&format!("{},{}\n", date, 10.0 + i as f64));
        }
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_missing_history_is_invalid() {
        let dir = TempDir::new().unwrap();
        let cache = ModelCache::new(DailyHistory::new(dir.path().join("daily_history.csv")));
        assert!(matches!(cache.refresh(), RefreshOutcome::MissingSource));
        assert!(cache.get().is_none());
        assert_eq!(cache.predict_next().unwrap(), None);
    }

    #[test]
    fn test_too_few_pairs_is_invalid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("daily_history.csv");
        // 11 days -> 4 pairs
        write_history(&path, 11);
        let cache = ModelCache::new(DailyHistory::new(path));
        assert!(matches!(
            cache.refresh(),
            RefreshOutcome::Insufficient {
                available: 4,
                required: 5
            }
        ));
        assert!(!cache.stats().valid);
    }

    #[test]
    fn test_trains_with_enough_pairs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("daily_history.csv");
        write_history(&path, 12);
        let cache = ModelCache::new(DailyHistory::new(path));

        let model = cache.get().expect("model with five pairs");
        assert_eq!(model.training_pairs, 5);
        let next = cache.predict_next().unwrap().unwrap();
        assert!((next - 22.0).abs() < 1e-3, "predicted {next}");
    }

    #[test]
    fn test_refresh_is_idempotent_for_unchanged_history() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("daily_history.csv");
        write_history(&path, 20);
        let cache = ModelCache::new(DailyHistory::new(path));

        let first = cache.get().unwrap();
        let second = cache.get().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        let stats = cache.stats();
        assert_eq!(stats.fits, 1);
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn test_changed_history_triggers_retrain() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("daily_history.csv");
        write_history(&path, 20);
        let cache = ModelCache::new(DailyHistory::new(path.clone()));
        let first = cache.get().unwrap();

        write_history(&path, 30);
        let second = cache.get().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.training_pairs, 23);
        assert_eq!(cache.stats().fits, 2);
    }

    #[test]
    fn test_malformed_history_invalidates_cache() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("daily_history.csv");
        write_history(&path, 20);
        let cache = ModelCache::new(DailyHistory::new(path.clone()));
        assert!(cache.get().is_some());

        std::fs::write(&path, "date,totalEnergy\n2026-01-01,lots\n").unwrap();
        assert!(matches!(cache.refresh(), RefreshOutcome::Failed(_)));
        assert!(cache.current().is_none());
        assert_eq!(cache.stats().failures, 1);
    }

    #[test]
    fn test_invalidate_drops_model() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("daily_history.csv");
        write_history(&path, 20);
        let cache = ModelCache::new(DailyHistory::new(path));
        assert!(cache.get().is_some());

        cache.invalidate();
        assert!(cache.current().is_none());
        assert_eq!(cache.predict_next().unwrap(), None);
        // unchanged history is refitted rather than reused
        assert!(matches!(cache.refresh(), RefreshOutcome::Retrained(_)));
        assert_eq!(cache.stats().fits, 2);
    }
}
