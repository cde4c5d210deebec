//! Z-score fallback detection over recent total power

/// Minimum stored values before the z-score tier runs
pub const ZSCORE_MIN_SAMPLES: usize = 30;

/// Standard deviations from the mean beyond which a sample is anomalous
pub const ZSCORE_THRESHOLD: f64 = 3.0;

/// Mean and population standard deviation of a window of values
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerStats {
    pub mean: f64,
    pub std_dev: f64,
    pub count: usize,
}

impl PowerStats {
    pub fn from_values(values: &[f64]) -> Self {
        let count = values.len();
        if count == 0 {
            return Self {
                mean: 0.0,
                std_dev: 0.0,
                count,
            };
        }
        let mean = values.iter().sum::<f64>() / count as f64;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;
        Self {
            mean,
            std_dev: variance.sqrt(),
            count,
        }
    }

    /// Distance from the mean in standard deviations, `None` when the
    /// window has no spread
    pub fn z_score(&self, value: f64) -> Option<f64> {
        (self.std_dev > 0.0).then(|| (value - self.mean) / self.std_dev)
    }
}

/// Flags values more than `threshold` standard deviations from the mean
#[derive(Debug, Clone)]
pub struct ZScoreDetector {
    pub threshold: f64,
    pub min_samples: usize,
}

impl Default for ZScoreDetector {
    fn default() -> Self {
        Self {
            threshold: ZSCORE_THRESHOLD,
            min_samples: ZSCORE_MIN_SAMPLES,
        }
    }
}

impl ZScoreDetector {
    /// Verdict for `current` against `history`, or `None` when there is not
    /// enough history for the tier to run
    pub fn evaluate(&self, current: f64, history: &[f64]) -> Option<bool> {
        if history.len() < self.min_samples {
            return None;
        }
        let stats = PowerStats::from_values(history);
        Some(
            stats
                .z_score(current)
                .map(|z| z.abs() > self.threshold)
                .unwrap_or(false),
        )
    }
}
