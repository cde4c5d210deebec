//! Integration tests for the predictor HTTP API

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use energy_predictor::api::{create_router, AppState};
use meter_lib::{
    anomaly::AnomalyModelCache,
    health::{components, HealthRegistry},
    predictor::ModelCache,
    store::{DailyHistory, SampleStore},
    PredictionService, RefreshScheduler, StructuredLogger,
};
use std::io::Write;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    state: Arc<AppState>,
    dir: TempDir,
}

impl TestApp {
    fn samples_path(&self) -> std::path::PathBuf {
        self.dir.path().join("samples.csv")
    }
}

async fn setup_test_app(dir: TempDir) -> TestApp {
    let health_registry = HealthRegistry::new();
    for name in components::ALL {
        health_registry.register(name).await;
    }

    let store = Arc::new(SampleStore::new(dir.path().join("samples.csv")));
    let history = DailyHistory::new(dir.path().join("daily_history.csv"));
    let scheduler = Arc::new(
        RefreshScheduler::new(
            Arc::new(ModelCache::new(history)),
            Arc::new(AnomalyModelCache::new(Arc::clone(&store))),
        )
        .with_health(health_registry.clone()),
    );
    let service = PredictionService::new(
        store,
        scheduler,
        health_registry.clone(),
        StructuredLogger::new("api-test"),
    );
    let state = Arc::new(AppState::new(health_registry, service));
    TestApp {
        router: create_router(Arc::clone(&state)),
        state,
        dir,
    }
}

fn post_predict(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/predict")
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn sample_json(power: f64) -> String {
    serde_json::json!({
        "t": "2026-05-04T12:30:00.000000Z",
        "totalPower": power,
        "totalEnergy": 2.25,
        "L1": {"v": 230.1, "c": 1.2, "p": power / 2.0},
        "L2": {"v": 229.8, "c": 0.6, "p": power / 4.0},
        "L3": {"v": 231.0, "c": 0.6, "p": power / 4.0},
        "cost": 18.0
    })
    .to_string()
}

#[tokio::test]
async fn test_home_banner() {
    let app = setup_test_app(TempDir::new().unwrap()).await;
    let response = app.router.oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let html = String::from_utf8(body.to_vec()).unwrap();
    assert!(html.contains("/predict"));
}

#[tokio::test]
async fn test_first_sample_is_stored_and_answered() {
    let app = setup_test_app(TempDir::new().unwrap()).await;

    let response = app
        .router
        .clone()
        .oneshot(post_predict(sample_json(500.0)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["prediction"], 12.0);
    assert_eq!(body["anomaly"], false);
    assert_eq!(body["reason"], "");
    assert_eq!(body["predictionSource"], "last_sample");

    let content = std::fs::read_to_string(app.samples_path()).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[0], "t,totalPower,totalEnergy,L1_p,L2_p,L3_p");
    assert_eq!(lines[1], "2026-05-04T12:30:00.000000Z,500.0,2.25,250.0,125.0,125.0");
}

#[tokio::test]
async fn test_malformed_payloads_are_dropped() {
    let app = setup_test_app(TempDir::new().unwrap()).await;

    for body in ["not json", "{}", "[1, 2]", ""] {
        let response = app
            .router
            .clone()
            .oneshot(post_predict(body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert!(json["prediction"].is_null(), "body {body:?}");
        assert_eq!(json["anomaly"], false);
        assert_eq!(json["reason"], "");
    }
    assert!(!app.samples_path().exists());
}

#[tokio::test]
async fn test_missing_fields_still_stored() {
    let app = setup_test_app(TempDir::new().unwrap()).await;
    let response = app
        .router
        .clone()
        .oneshot(post_predict(r#"{"totalPower": 250}"#))
        .await
        .unwrap();
    let json = json_body(response).await;
    assert_eq!(json["prediction"], 6.0);

    let records = app.state.service.store().read_all().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].l1_p, None);
}

#[tokio::test]
async fn test_model_tier_with_history() {
    let dir = TempDir::new().unwrap();
    let mut file = std::fs::File::create(dir.path().join("daily_history.csv")).unwrap();
    writeln!(file, "date,totalEnergy").unwrap();
    for day in 0..14 {
        writeln!(file, "2026-02-{:02},{}", day + 1, 10 + day).unwrap();
    }
    drop(file);

    let app = setup_test_app(dir).await;
    let response = app
        .router
        .clone()
        .oneshot(post_predict(sample_json(800.0)))
        .await
        .unwrap();
    let json = json_body(response).await;
    assert_eq!(json["predictionSource"], "model");
    let prediction = json["prediction"].as_f64().unwrap();
    assert!((prediction - 24.0).abs() < 1e-3, "prediction {prediction}");
}

#[tokio::test]
async fn test_concurrent_requests_append_every_sample() {
    let app = setup_test_app(TempDir::new().unwrap()).await;
    let workers = 24;

    let handles: Vec<_> = (0..workers)
        .map(|i| {
            let router = app.router.clone();
            tokio::spawn(async move {
                router
                    .oneshot(post_predict(sample_json(100.0 + i as f64)))
                    .await
                    .unwrap()
                    .status()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap(), StatusCode::OK);
    }

    let records = app.state.service.store().read_all().unwrap();
    assert_eq!(records.len(), workers);
    let content = std::fs::read_to_string(app.samples_path()).unwrap();
    assert_eq!(content.lines().count(), workers + 1);
}

#[tokio::test]
async fn test_healthz_degraded_without_models() {
    let app = setup_test_app(TempDir::new().unwrap()).await;
    app.router
        .clone()
        .oneshot(post_predict(sample_json(300.0)))
        .await
        .unwrap();

    let response = app.router.clone().oneshot(get("/healthz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let health = json_body(response).await;
    assert_eq!(health["status"], "degraded");
    assert_eq!(health["components"]["predictor_model"]["status"], "degraded");
    assert_eq!(health["components"]["sample_store"]["status"], "healthy");
}

#[tokio::test]
async fn test_healthz_unhealthy() {
    let app = setup_test_app(TempDir::new().unwrap()).await;
    app.state
        .health_registry
        .set_unhealthy(components::SAMPLE_STORE, "disk unavailable")
        .await;

    let response = app.router.oneshot(get("/healthz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_readyz_follows_startup() {
    let app = setup_test_app(TempDir::new().unwrap()).await;

    let response = app.router.clone().oneshot(get("/readyz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    app.state.health_registry.set_ready(true).await;
    let response = app.router.clone().oneshot(get("/readyz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["ready"], true);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup_test_app(TempDir::new().unwrap()).await;
    app.router
        .clone()
        .oneshot(post_predict(sample_json(300.0)))
        .await
        .unwrap();

    let response = app.router.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("energy_predictor_samples_appended_total"));
    assert!(text.contains("energy_predictor_predictions_total"));
}

#[tokio::test]
async fn test_cors_allows_any_origin() {
    let app = setup_test_app(TempDir::new().unwrap()).await;
    let request = Request::builder()
        .uri("/")
        .header("origin", "http://dashboard.local")
        .body(Body::empty())
        .unwrap();
    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );
}
