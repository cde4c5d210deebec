//! Per-request pipeline: persist the sample, then resolve a forecast and an
//! anomaly verdict for it

use crate::anomaly::AnomalyEngine;
use crate::health::{components, HealthRegistry};
use crate::models::{AnomalyProvenance, IngestRequest, PredictResponse};
use crate::observability::{MeterMetrics, StructuredLogger};
use crate::predictor::PredictionEngine;
use crate::refresh::RefreshScheduler;
use crate::store::{SampleRecord, SampleStore};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

/// Cheap to clone; all state is shared
#[derive(Clone)]
pub struct PredictionService {
    store: Arc<SampleStore>,
    prediction: Arc<PredictionEngine>,
    anomaly: Arc<AnomalyEngine>,
    scheduler: Arc<RefreshScheduler>,
    health: HealthRegistry,
    metrics: MeterMetrics,
    logger: StructuredLogger,
}

/// What the blocking part of a request produced
struct Processed {
    response: PredictResponse,
    append_error: Option<String>,
}

impl PredictionService {
    pub fn new(
        store: Arc<SampleStore>,
        scheduler: Arc<RefreshScheduler>,
        health: HealthRegistry,
        logger: StructuredLogger,
    ) -> Self {
        let prediction = PredictionEngine::new(
            Arc::clone(scheduler.predictor_cache()),
            Arc::clone(&store),
        );
        let anomaly = AnomalyEngine::new(Arc::clone(scheduler.anomaly_cache()), Arc::clone(&store));
        Self {
            store,
            prediction: Arc::new(prediction),
            anomaly: Arc::new(anomaly),
            scheduler,
            health,
            metrics: MeterMetrics::new(),
            logger,
        }
    }

    pub fn store(&self) -> &Arc<SampleStore> {
        &self.store
    }

    pub fn scheduler(&self) -> &Arc<RefreshScheduler> {
        &self.scheduler
    }

    /// Handle one inbound sample. `None` is a malformed payload: it is not
    /// stored and gets the worst-case response.
    pub async fn handle(&self, request: Option<IngestRequest>) -> PredictResponse {
        let Some(request) = request else {
            debug!("Dropping malformed sample payload");
            return PredictResponse::empty();
        };
        let started = Instant::now();

        if self.scheduler.claim_initial_refresh() {
            debug!("No refresh cycle yet, refreshing models on demand");
            self.scheduler.refresh_now().await;
        }

        let this = self.clone();
        let processed = match tokio::task::spawn_blocking(move || this.process(&request)).await {
            Ok(processed) => processed,
            Err(e) => {
                error!(error = %e, "Prediction task failed");
                return PredictResponse::empty();
            }
        };

        match &processed.append_error {
            Some(e) => {
                self.health
                    .set_degraded(components::SAMPLE_STORE, format!("append failed: {e}"))
                    .await
            }
            None => self.health.set_healthy(components::SAMPLE_STORE).await,
        }

        let elapsed = started.elapsed();
        self.metrics.observe_request_latency(elapsed.as_secs_f64());
        self.logger.log_prediction(
            processed.response.prediction,
            processed.response.prediction_source,
            elapsed.as_secs_f64() * 1000.0,
        );
        processed.response
    }

    fn process(&self, request: &IngestRequest) -> Processed {
        let append_error = match self.store.append(&SampleRecord::from(request)) {
            Ok(()) => {
                self.metrics.inc_samples_appended();
                None
            }
            Err(e) => {
                self.metrics.inc_append_errors();
                self.logger.log_append_failure(&e.to_string());
                Some(e.to_string())
            }
        };

        let prediction = self.prediction.predict(request.total_power);
        self.metrics.inc_prediction(prediction.provenance);

        let anomaly = self.anomaly.evaluate(request.features());
        if anomaly.flag && anomaly.provenance != AnomalyProvenance::None {
            self.metrics.inc_anomaly(anomaly.provenance);
            self.logger.log_anomaly(anomaly.provenance, request.total_power);
        }

        Processed {
            response: PredictResponse::from_results(prediction, anomaly),
            append_error,
        }
    }
}
