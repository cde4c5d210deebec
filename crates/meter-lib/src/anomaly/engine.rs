//! Tiered anomaly verdict for an incoming sample

use super::{AnomalyModelCache, ZScoreDetector};
use crate::models::{AnomalyProvenance, AnomalyResult, PowerFeatures};
use crate::store::SampleStore;
use std::sync::Arc;
use tracing::{debug, warn};

/// Most recent stored powers considered by the z-score tier
pub const ZSCORE_WINDOW: usize = 200;

pub struct AnomalyEngine {
    cache: Arc<AnomalyModelCache>,
    store: Arc<SampleStore>,
    detector: ZScoreDetector,
}

impl AnomalyEngine {
    pub fn new(cache: Arc<AnomalyModelCache>, store: Arc<SampleStore>) -> Self {
        Self {
            cache,
            store,
            detector: ZScoreDetector::default(),
        }
    }

    /// `features` is `[totalPower, L1, L2, L3]` of the incoming sample.
    ///
    /// The z-score tier only runs when no outlier model is published. A
    /// scoring error on a published model yields an undetermined result.
    pub fn evaluate(&self, features: PowerFeatures) -> AnomalyResult {
        if self.cache.current().is_some() {
            return match self.cache.score(&features) {
                Ok(Some(verdict)) => AnomalyResult {
                    flag: verdict.is_outlier(),
                    provenance: AnomalyProvenance::IsolationForest,
                },
                Ok(None) => self.zscore(features[0]),
                Err(e) => {
                    warn!(error = %e, "Outlier scoring failed");
                    AnomalyResult::undetermined()
                }
            };
        }
        self.zscore(features[0])
    }

    fn zscore(&self, current_power: f64) -> AnomalyResult {
        let history: Vec<f64> = match self.store.read_recent(ZSCORE_WINDOW) {
            Ok(records) => records
                .iter()
                .map(|r| r.total_power.unwrap_or(0.0))
                .collect(),
            Err(e) => {
                warn!(error = %e, "Sample store unreadable, skipping z-score");
                return AnomalyResult::undetermined();
            }
        };

        match self.detector.evaluate(current_power, &history) {
            Some(flag) => AnomalyResult {
                flag,
                provenance: AnomalyProvenance::Zscore,
            },
            None => {
                debug!(samples = history.len(), "Too few samples for z-score");
                AnomalyResult::undetermined()
            }
        }
    }
}
