//! Cache of the outlier model fitted over the rolling sample window
//!
//! Unlike the predictor cache there is no version short-circuit: the sample
//! window moves with every request, so each refresh refits from scratch.

use super::{IsolationForest, IsolationForestConfig, OutlierScorer, Verdict};
use crate::error::Result;
use crate::models::PowerFeatures;
use crate::slot::{ModelSlot, RefreshOutcome};
use crate::store::{SampleStore, SourceVersion};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Minimum stored samples before an outlier model is fitted
pub const ANOMALY_MIN_SAMPLES: usize = 50;

/// Most recent samples used for fitting
pub const ANOMALY_WINDOW: usize = 800;

pub struct TrainedAnomalyModel {
    pub scorer: Box<dyn OutlierScorer>,
    pub source_version: Option<SourceVersion>,
    pub fitted_at: DateTime<Utc>,
    pub samples: usize,
}

impl std::fmt::Debug for TrainedAnomalyModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrainedAnomalyModel")
            .field("scorer", &self.scorer.name())
            .field("source_version", &self.source_version)
            .field("fitted_at", &self.fitted_at)
            .field("samples", &self.samples)
            .finish()
    }
}

pub struct AnomalyModelCache {
    store: Arc<SampleStore>,
    config: IsolationForestConfig,
    slot: ModelSlot<TrainedAnomalyModel>,
    fits: AtomicU64,
    failures: AtomicU64,
}

impl AnomalyModelCache {
    pub fn new(store: Arc<SampleStore>) -> Self {
        Self::with_config(store, IsolationForestConfig::default())
    }

    pub fn with_config(store: Arc<SampleStore>, config: IsolationForestConfig) -> Self {
        Self {
            store,
            config,
            slot: ModelSlot::new(),
            fits: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Refit and return the new model, or `None` if the cache is invalid
    pub fn get(&self) -> Option<Arc<TrainedAnomalyModel>> {
        self.refresh().model()
    }

    /// Refit unconditionally from the most recent samples
    pub fn refresh(&self) -> RefreshOutcome<TrainedAnomalyModel> {
        if !self.store.path().exists() {
            debug!(path = %self.store.path().display(), "Sample store not created yet");
            self.slot.invalidate();
            return RefreshOutcome::MissingSource;
        }

        let records = match self.store.read_recent(ANOMALY_WINDOW) {
            Ok(records) => records,
            Err(e) => return self.fail(e.to_string()),
        };
        if records.len() < ANOMALY_MIN_SAMPLES {
            debug!(
                samples = records.len(),
                required = ANOMALY_MIN_SAMPLES,
                "Not enough samples to fit anomaly model"
            );
            self.slot.invalidate();
            return RefreshOutcome::Insufficient {
                available: records.len(),
                required: ANOMALY_MIN_SAMPLES,
            };
        }

        let features: Vec<PowerFeatures> = records.iter().map(|r| r.features()).collect();
        match IsolationForest::fit(&features, &self.config) {
            Ok(forest) => {
                self.fits.fetch_add(1, Ordering::Relaxed);
                info!(samples = features.len(), "Built anomaly model from samples");
                let model = TrainedAnomalyModel {
                    scorer: Box::new(forest),
                    source_version: self.store.version().ok().flatten(),
                    fitted_at: Utc::now(),
                    samples: features.len(),
                };
                RefreshOutcome::Retrained(self.slot.publish(model))
            }
            Err(e) => self.fail(e.to_string()),
        }
    }

    fn fail(&self, reason: String) -> RefreshOutcome<TrainedAnomalyModel> {
        error!(error = %reason, "Anomaly model rebuild failed");
        self.failures.fetch_add(1, Ordering::Relaxed);
        self.slot.invalidate();
        RefreshOutcome::Failed(reason)
    }

    /// Drop the published model after a refresh that did not finish
    pub fn invalidate(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        self.slot.invalidate();
    }

    pub fn current(&self) -> Option<Arc<TrainedAnomalyModel>> {
        self.slot.current()
    }

    /// Score with the published model; `Ok(None)` when none is cached
    pub fn score(&self, features: &PowerFeatures) -> Result<Option<Verdict>> {
        match self.slot.current() {
            Some(model) => model.scorer.score(features).map(Some),
            None => Ok(None),
        }
    }

    pub fn fits(&self) -> u64 {
        self.fits.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}
