//! Tiered resolution of the next-day energy forecast
//!
//! Tiers, first value wins:
//! 1. `model`: trained regressor over the last seven history days
//! 2. `moving_avg`: mean power of the last three sampled dates
//! 3. `last_sample`: power of the most recent stored sample
//! 4. `instant_estimate`: power reported by the request itself, used only
//!    when the sample store is empty

use super::ModelCache;
use crate::models::{
    daily_energy_kwh, parse_timestamp, PredictionProvenance, PredictionResult,
};
use crate::store::{SampleRecord, SampleStore};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Number of most recent dates averaged by the moving-average tier
pub const MOVING_AVG_DAYS: usize = 3;

pub struct PredictionEngine {
    cache: Arc<ModelCache>,
    store: Arc<SampleStore>,
}

impl PredictionEngine {
    pub fn new(cache: Arc<ModelCache>, store: Arc<SampleStore>) -> Self {
        Self { cache, store }
    }

    /// Resolve a forecast. `reported_power` is the request's own total power.
    pub fn predict(&self, reported_power: Option<f64>) -> PredictionResult {
        match self.cache.predict_next() {
            Ok(Some(value)) => {
                return PredictionResult::resolved(value, PredictionProvenance::Model)
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Model prediction failed, falling back"),
        }

        let samples = match self.store.read_all() {
            Ok(samples) => samples,
            Err(e) => {
                warn!(error = %e, "Sample store unreadable, no fallback forecast");
                return PredictionResult::unresolved();
            }
        };

        if samples.is_empty() {
            let power = reported_power.unwrap_or(0.0);
            return PredictionResult::resolved(
                daily_energy_kwh(power),
                PredictionProvenance::InstantEstimate,
            );
        }

        if let Some(value) = moving_average_estimate(&samples) {
            return PredictionResult::resolved(value, PredictionProvenance::MovingAvg);
        }

        match samples.last().and_then(|s| s.total_power) {
            Some(power) => {
                PredictionResult::resolved(daily_energy_kwh(power), PredictionProvenance::LastSample)
            }
            None => {
                debug!("Most recent sample has no power reading");
                PredictionResult::unresolved()
            }
        }
    }
}

/// Mean `totalPower` per calendar date, in date order. Rows without a
/// parseable timestamp or a power value are ignored.
pub fn daily_mean_power(samples: &[SampleRecord]) -> Vec<(NaiveDate, f64)> {
    let mut days: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for sample in samples {
        let (Some(t), Some(power)) = (sample.t.as_deref(), sample.total_power) else {
            continue;
        };
        let Some(at) = parse_timestamp(t) else {
            continue;
        };
        let entry = days.entry(at.date()).or_insert((0.0, 0));
        entry.0 += power;
        entry.1 += 1;
    }
    days.into_iter()
        .map(|(date, (sum, count))| (date, sum / count as f64))
        .collect()
}

/// Energy estimate from the last three dates' mean power, if at least three
/// distinct dates were sampled
pub fn moving_average_estimate(samples: &[SampleRecord]) -> Option<f64> {
    let daily = daily_mean_power(samples);
    if daily.len() < MOVING_AVG_DAYS {
        return None;
    }
    let recent = &daily[daily.len() - MOVING_AVG_DAYS..];
    let mean_power = recent.iter().map(|(_, p)| p).sum::<f64>() / MOVING_AVG_DAYS as f64;
    Some(daily_energy_kwh(mean_power))
}
