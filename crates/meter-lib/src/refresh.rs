//! Periodic revalidation of both model caches
//!
//! The scheduler is the only regular writer of the model slots. A request
//! may claim one on-demand refresh before the first cycle has completed.

use crate::anomaly::AnomalyModelCache;
use crate::health::{components, HealthRegistry};
use crate::observability::{MeterMetrics, StructuredLogger, ANOMALY_MODEL, PREDICTOR_MODEL};
use crate::predictor::ModelCache;
use crate::slot::RefreshOutcome;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Result of refreshing one cache within a cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRefresh {
    pub outcome: &'static str,
    pub valid: bool,
    pub detail: Option<String>,
}

impl CacheRefresh {
    fn from_outcome<T>(outcome: &RefreshOutcome<T>) -> Self {
        let detail = match outcome {
            RefreshOutcome::Insufficient { available, required } => {
                Some(format!("{available} of {required} required records"))
            }
            RefreshOutcome::MissingSource => Some("backing data not found".to_string()),
            RefreshOutcome::Failed(reason) => Some(reason.clone()),
            RefreshOutcome::Reused(_) | RefreshOutcome::Retrained(_) => None,
        };
        Self {
            outcome: outcome.label(),
            valid: outcome.model().is_some(),
            detail,
        }
    }

    fn panicked(err: tokio::task::JoinError) -> Self {
        Self {
            outcome: "failed",
            valid: false,
            detail: Some(format!("refresh task aborted: {err}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshReport {
    pub predictor: CacheRefresh,
    pub anomaly: CacheRefresh,
}

pub struct RefreshScheduler {
    predictor: Arc<ModelCache>,
    anomaly: Arc<AnomalyModelCache>,
    interval: Duration,
    cycles: AtomicU64,
    initial_claimed: AtomicBool,
    health: Option<HealthRegistry>,
    metrics: Option<MeterMetrics>,
    logger: Option<StructuredLogger>,
}

impl RefreshScheduler {
    pub fn new(predictor: Arc<ModelCache>, anomaly: Arc<AnomalyModelCache>) -> Self {
        Self {
            predictor,
            anomaly,
            interval: DEFAULT_REFRESH_INTERVAL,
            cycles: AtomicU64::new(0),
            initial_claimed: AtomicBool::new(false),
            health: None,
            metrics: None,
            logger: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn with_metrics(mut self, metrics: MeterMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn predictor_cache(&self) -> &Arc<ModelCache> {
        &self.predictor
    }

    pub fn anomaly_cache(&self) -> &Arc<AnomalyModelCache> {
        &self.anomaly
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn completed_cycles(&self) -> u64 {
        self.cycles.load(Ordering::Acquire)
    }

    /// True for exactly one caller, and only while no cycle has completed
    pub fn claim_initial_refresh(&self) -> bool {
        self.completed_cycles() == 0
            && self
                .initial_claimed
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
    }

    /// Run until a shutdown signal arrives. The first cycle starts immediately.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Starting model refresh scheduler"
        );
        if let Some(health) = &self.health {
            health.set_healthy(components::REFRESH_SCHEDULER).await;
        }

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.refresh_now().await;
                }
                _ = shutdown.recv() => {
                    info!("Shutting down model refresh scheduler");
                    break;
                }
            }
        }

        if let Some(health) = &self.health {
            health
                .set_degraded(components::REFRESH_SCHEDULER, "scheduler stopped")
                .await;
        }
    }

    /// Refresh both caches once. Each runs on its own blocking task, so a
    /// failure in one leaves the other untouched.
    pub async fn refresh_now(&self) -> RefreshReport {
        let predictor = Arc::clone(&self.predictor);
        let predictor = match tokio::task::spawn_blocking(move || {
            CacheRefresh::from_outcome(&predictor.refresh())
        })
        .await
        {
            Ok(refresh) => refresh,
            Err(e) => {
                error!(error = %e, "Predictor refresh task failed");
                self.predictor.invalidate();
                CacheRefresh::panicked(e)
            }
        };

        let anomaly = Arc::clone(&self.anomaly);
        let anomaly = match tokio::task::spawn_blocking(move || {
            CacheRefresh::from_outcome(&anomaly.refresh())
        })
        .await
        {
            Ok(refresh) => refresh,
            Err(e) => {
                error!(error = %e, "Anomaly refresh task failed");
                self.anomaly.invalidate();
                CacheRefresh::panicked(e)
            }
        };

        self.record(PREDICTOR_MODEL, components::PREDICTOR_MODEL, &predictor)
            .await;
        self.record(ANOMALY_MODEL, components::ANOMALY_MODEL, &anomaly)
            .await;

        let cycle = self.cycles.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(
            cycle,
            predictor = predictor.outcome,
            anomaly = anomaly.outcome,
            "Refresh cycle complete"
        );
        RefreshReport { predictor, anomaly }
    }

    async fn record(&self, model: &str, component: &str, refresh: &CacheRefresh) {
        if let Some(metrics) = &self.metrics {
            metrics.record_refresh(model, refresh.outcome, refresh.valid);
        }
        if let Some(logger) = &self.logger {
            if refresh.valid {
                logger.log_model_refresh(model, refresh.outcome);
            } else {
                logger.log_model_invalidated(model, refresh.outcome);
            }
        }
        if let Some(health) = &self.health {
            if refresh.valid {
                health.set_healthy(component).await;
            } else {
                let message = refresh.detail.as_deref().unwrap_or(refresh.outcome);
                health
                    .set_degraded(component, format!("no model: {message}"))
                    .await;
            }
        }
    }
}
