//! Next-day energy prediction
//!
//! A regressor trained on the daily history window is kept in a
//! staleness-aware cache; the engine falls back to sample-store heuristics
//! when no model is available.

mod cache;
mod engine;
mod regression;

pub use cache::{CacheStats, ModelCache, TrainedPredictor, MIN_TRAINING_PAIRS};
pub use engine::{daily_mean_power, moving_average_estimate, PredictionEngine, MOVING_AVG_DAYS};
pub use regression::LinearRegression;

use crate::error::Result;

/// Fitted regression capability: maps a feature window to one value
pub trait Regressor: Send + Sync {
    fn predict(&self, features: &[f64]) -> Result<f64>;

    /// Short name for logs
    fn name(&self) -> &str;
}
