//! Energy Predictor - next-day energy forecasts and anomaly flags for a
//! three-phase meter
//!
//! Accepts samples on `POST /predict`, persists them, and keeps both models
//! fresh from a background refresh task.

use anyhow::Result;
use energy_predictor::{api, config::ServerConfig};
use meter_lib::{
    anomaly::AnomalyModelCache,
    health::{components, HealthRegistry},
    observability::{MeterMetrics, StructuredLogger},
    predictor::ModelCache,
    store::{DailyHistory, SampleStore},
    PredictionService, RefreshScheduler,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config = ServerConfig::load()?;
    info!(
        samples = %config.samples_path.display(),
        history = %config.daily_history_path.display(),
        "Energy predictor configured"
    );

    let health_registry = HealthRegistry::new();
    for name in components::ALL {
        health_registry.register(name).await;
    }
    let metrics = MeterMetrics::new();
    let logger = StructuredLogger::new(&config.instance_name);

    let store = Arc::new(SampleStore::new(&config.samples_path));
    let scheduler = Arc::new(
        RefreshScheduler::new(
            Arc::new(ModelCache::new(DailyHistory::new(&config.daily_history_path))),
            Arc::new(AnomalyModelCache::new(Arc::clone(&store))),
        )
        .with_interval(config.refresh_interval())
        .with_health(health_registry.clone())
        .with_metrics(metrics)
        .with_logger(logger.clone()),
    );
    let service = PredictionService::new(
        store,
        Arc::clone(&scheduler),
        health_registry.clone(),
        logger.clone(),
    );
    let app_state = Arc::new(api::AppState::new(health_registry.clone(), service));

    let (shutdown_tx, _) = broadcast::channel(1);
    let scheduler_handle = tokio::spawn(Arc::clone(&scheduler).run(shutdown_tx.subscribe()));
    let addr = config.bind_addr();
    let mut api_handle = tokio::spawn(api::serve(addr.clone(), app_state, shutdown_tx.subscribe()));

    health_registry.set_ready(true).await;
    logger.log_startup(SERVICE_VERSION, &addr);

    let api_finished = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            logger.log_shutdown("SIGINT received");
            None
        }
        result = &mut api_handle => {
            logger.log_shutdown("API server stopped");
            Some(result)
        }
    };
    health_registry.set_ready(false).await;
    let _ = shutdown_tx.send(());

    if let Err(e) = scheduler_handle.await {
        error!(error = %e, "Refresh scheduler task failed");
    }
    let api_result = match api_finished {
        Some(result) => result,
        None => api_handle.await,
    };
    match api_result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "API server exited with error"),
        Err(e) => error!(error = %e, "API server task failed"),
    }

    info!("Shutdown complete");
    Ok(())
}
