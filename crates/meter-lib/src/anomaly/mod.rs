//! Outlier detection for incoming power samples
//!
//! This module provides:
//! - An isolation forest fitted over a rolling window of stored samples
//! - A z-score fallback over recent total power when no forest is cached
//! - The tiered engine combining the two

mod cache;
mod engine;
mod isolation_forest;
mod zscore;

pub use cache::{AnomalyModelCache, TrainedAnomalyModel, ANOMALY_MIN_SAMPLES, ANOMALY_WINDOW};
pub use engine::{AnomalyEngine, ZSCORE_WINDOW};
pub use isolation_forest::{IsolationForest, IsolationForestConfig};
pub use zscore::{PowerStats, ZScoreDetector, ZSCORE_MIN_SAMPLES, ZSCORE_THRESHOLD};

use crate::error::Result;

/// Verdict of an outlier scorer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Outlier,
    Inlier,
}

impl Verdict {
    pub fn is_outlier(&self) -> bool {
        matches!(self, Verdict::Outlier)
    }
}

/// Fitted outlier scoring capability
pub trait OutlierScorer: Send + Sync {
    fn score(&self, features: &[f64]) -> Result<Verdict>;

    /// Short name for logs
    fn name(&self) -> &str;
}
