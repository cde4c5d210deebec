//! HTTP API: sample ingestion, health checks and Prometheus metrics

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use meter_lib::{
    health::{ComponentStatus, HealthRegistry},
    IngestRequest, PredictResponse, PredictionService,
};
use prometheus::{Encoder, TextEncoder};
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub service: PredictionService,
}

impl AppState {
    pub fn new(health_registry: HealthRegistry, service: PredictionService) -> Self {
        Self {
            health_registry,
            service,
        }
    }
}

async fn home() -> Html<&'static str> {
    Html(
        "<h3>Energy Predictor Backend Running</h3>\
         <p>POST JSON to <code>/predict</code></p>",
    )
}

/// Always answers 200; an unusable body gets the worst-case response
async fn predict(State(state): State<Arc<AppState>>, body: Bytes) -> Json<PredictResponse> {
    let request = IngestRequest::from_slice(&body);
    Json(state.service.handle(request).await)
}

/// 200 while operational (degraded included), 503 when a component failed
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;
    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;
    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Json(readiness))
}

async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, Vec::new()).into_response();
    }
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/predict", post(predict))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until a shutdown signal arrives
pub async fn serve(
    addr: String,
    state: Arc<AppState>,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let app = create_router(state);

    info!(addr = %addr, "Starting API server");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;

    Ok(())
}
