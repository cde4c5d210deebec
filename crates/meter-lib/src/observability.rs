//! Observability for the predictor service
//!
//! Provides:
//! - Prometheus metrics (request latency, appends, provenance counters, model state)
//! - Structured event logging with tracing

use crate::models::{AnomalyProvenance, PredictionProvenance};
use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_counter_vec,
    GaugeVec, Histogram, IntCounter, IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Latency buckets in seconds
const LATENCY_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
];

/// Model label for the next-day energy predictor
pub const PREDICTOR_MODEL: &str = "predictor";
/// Model label for the outlier detector
pub const ANOMALY_MODEL: &str = "anomaly";

static GLOBAL_METRICS: OnceLock<MeterMetricsInner> = OnceLock::new();

struct MeterMetricsInner {
    request_latency_seconds: Histogram,
    samples_appended: IntCounter,
    append_errors: IntCounter,
    predictions: IntCounterVec,
    anomalies: IntCounterVec,
    model_refreshes: IntCounterVec,
    model_valid: GaugeVec,
}

impl MeterMetricsInner {
    fn new() -> Self {
        Self {
            request_latency_seconds: register_histogram!(
                "energy_predictor_request_latency_seconds",
                "Time spent handling one prediction request",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register request_latency_seconds"),

            samples_appended: register_int_counter!(
                "energy_predictor_samples_appended_total",
                "Samples durably appended to the sample store"
            )
            .expect("Failed to register samples_appended_total"),

            append_errors: register_int_counter!(
                "energy_predictor_append_errors_total",
                "Sample appends that failed"
            )
            .expect("Failed to register append_errors_total"),

            predictions: register_int_counter_vec!(
                "energy_predictor_predictions_total",
                "Predictions served, by resolving tier",
                &["provenance"]
            )
            .expect("Failed to register predictions_total"),

            anomalies: register_int_counter_vec!(
                "energy_predictor_anomalies_total",
                "Samples flagged as anomalous, by detecting tier",
                &["provenance"]
            )
            .expect("Failed to register anomalies_total"),

            model_refreshes: register_int_counter_vec!(
                "energy_predictor_model_refreshes_total",
                "Model cache refreshes, by model and outcome",
                &["model", "outcome"]
            )
            .expect("Failed to register model_refreshes_total"),

            model_valid: register_gauge_vec!(
                "energy_predictor_model_valid",
                "1 when a trained model is published",
                &["model"]
            )
            .expect("Failed to register model_valid"),
        }
    }
}

/// Handle to the process-wide metrics. Clones share the same collectors.
#[derive(Clone)]
pub struct MeterMetrics {
    inner: &'static MeterMetricsInner,
}

impl Default for MeterMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MeterMetrics {
    pub fn new() -> Self {
        Self {
            inner: GLOBAL_METRICS.get_or_init(MeterMetricsInner::new),
        }
    }

    pub fn observe_request_latency(&self, duration_secs: f64) {
        self.inner.request_latency_seconds.observe(duration_secs);
    }

    pub fn inc_samples_appended(&self) {
        self.inner.samples_appended.inc();
    }

    pub fn inc_append_errors(&self) {
        self.inner.append_errors.inc();
    }

    pub fn inc_prediction(&self, provenance: PredictionProvenance) {
        self.inner
            .predictions
            .with_label_values(&[provenance.as_str()])
            .inc();
    }

    pub fn inc_anomaly(&self, provenance: AnomalyProvenance) {
        self.inner
            .anomalies
            .with_label_values(&[provenance.as_str()])
            .inc();
    }

    /// Record a refresh outcome and whether a model is published afterwards
    pub fn record_refresh(&self, model: &str, outcome: &str, valid: bool) {
        self.inner
            .model_refreshes
            .with_label_values(&[model, outcome])
            .inc();
        self.inner
            .model_valid
            .with_label_values(&[model])
            .set(if valid { 1.0 } else { 0.0 });
    }

    pub fn samples_appended(&self) -> u64 {
        self.inner.samples_appended.get()
    }
}

/// Structured logger for service events
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn log_startup(&self, version: &str, addr: &str) {
        info!(
            event = "service_started",
            instance = %self.instance,
            version = %version,
            addr = %addr,
            "Energy predictor started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Energy predictor shutting down"
        );
    }

    pub fn log_prediction(
        &self,
        prediction: Option<f64>,
        provenance: PredictionProvenance,
        elapsed_ms: f64,
    ) {
        info!(
            event = "prediction_served",
            instance = %self.instance,
            prediction = ?prediction,
            provenance = %provenance.as_str(),
            elapsed_ms = elapsed_ms,
            "Served energy prediction"
        );
    }

    pub fn log_anomaly(&self, provenance: AnomalyProvenance, total_power: Option<f64>) {
        warn!(
            event = "anomaly_detected",
            instance = %self.instance,
            provenance = %provenance.as_str(),
            total_power = ?total_power,
            "Anomalous power sample"
        );
    }

    pub fn log_model_refresh(&self, model: &str, outcome: &str) {
        info!(
            event = "model_refreshed",
            instance = %self.instance,
            model = %model,
            outcome = %outcome,
            "Model refreshed"
        );
    }

    pub fn log_model_invalidated(&self, model: &str, outcome: &str) {
        warn!(
            event = "model_invalidated",
            instance = %self.instance,
            model = %model,
            outcome = %outcome,
            "Model unavailable, serving fallbacks"
        );
    }

    pub fn log_append_failure(&self, error: &str) {
        warn!(
            event = "sample_append_failed",
            instance = %self.instance,
            error = %error,
            "Sample was not persisted"
        );
    }
}
