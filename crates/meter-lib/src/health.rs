//! Component health for the predictor service
//!
//! The service keeps answering through its fallback tiers when a model is
//! missing, so missing models report `degraded` rather than `unhealthy`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Operating on a fallback path
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Unix seconds of the last status change
    pub checked_at: i64,
}

impl ComponentHealth {
    fn with_status(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            checked_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn healthy() -> Self {
        Self::with_status(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Unhealthy, Some(message.into()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// Worst status across all components
    pub fn compute_status(components: &HashMap<String, ComponentHealth>) -> ComponentStatus {
        components
            .values()
            .map(|c| c.status)
            .fold(ComponentStatus::Healthy, |worst, status| match (worst, status) {
                (ComponentStatus::Unhealthy, _) | (_, ComponentStatus::Unhealthy) => {
                    ComponentStatus::Unhealthy
                }
                (ComponentStatus::Degraded, _) | (_, ComponentStatus::Degraded) => {
                    ComponentStatus::Degraded
                }
                _ => ComponentStatus::Healthy,
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Component names for health tracking
pub mod components {
    pub const SAMPLE_STORE: &str = "sample_store";
    pub const PREDICTOR_MODEL: &str = "predictor_model";
    pub const ANOMALY_MODEL: &str = "anomaly_model";
    pub const REFRESH_SCHEDULER: &str = "refresh_scheduler";

    pub const ALL: [&str; 4] = [SAMPLE_STORE, PREDICTOR_MODEL, ANOMALY_MODEL, REFRESH_SCHEDULER];
}

#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    components: Arc<RwLock<HashMap<String, ComponentHealth>>>,
    ready: Arc<RwLock<bool>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component as healthy
    pub async fn register(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn update(&self, name: &str, health: ComponentHealth) {
        self.components
            .write()
            .await
            .insert(name.to_string(), health);
    }

    pub async fn set_healthy(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn set_degraded(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::degraded(message)).await;
    }

    pub async fn set_unhealthy(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::unhealthy(message)).await;
    }

    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    pub async fn component(&self, name: &str) -> Option<ComponentHealth> {
        self.components.read().await.get(name).cloned()
    }

    pub async fn health(&self) -> HealthResponse {
        let components = self.components.read().await.clone();
        let status = HealthResponse::compute_status(&components);
        HealthResponse { status, components }
    }

    /// Ready once startup completed and no component is unhealthy
    pub async fn readiness(&self) -> ReadinessResponse {
        let ready = *self.ready.read().await;
        let reason = if !ready {
            Some("Service not yet started".to_string())
        } else if self.health().await.status == ComponentStatus::Unhealthy {
            Some("A component is unhealthy".to_string())
        } else {
            None
        };
        ReadinessResponse {
            ready: reason.is_none(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_registry_is_healthy() {
        let registry = HealthRegistry::new();
        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Healthy);
        assert!(health.components.is_empty());
    }

    #[tokio::test]
    async fn test_missing_model_degrades() {
        let registry = HealthRegistry::new();
        for name in components::ALL {
            registry.register(name).await;
        }
        registry
            .set_degraded(components::PREDICTOR_MODEL, "no trained model")
            .await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Degraded);
        assert_eq!(
            health.components[components::PREDICTOR_MODEL].message.as_deref(),
            Some("no trained model")
        );
    }

    #[tokio::test]
    async fn test_unhealthy_wins_over_degraded() {
        let registry = HealthRegistry::new();
        registry.set_degraded(components::ANOMALY_MODEL, "x").await;
        registry.set_unhealthy(components::SAMPLE_STORE, "y").await;
        assert_eq!(registry.health().await.status, ComponentStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_recovers_after_success() {
        let registry = HealthRegistry::new();
        registry.set_degraded(components::SAMPLE_STORE, "append failed").await;
        registry.set_healthy(components::SAMPLE_STORE).await;
        let store = registry.component(components::SAMPLE_STORE).await.unwrap();
        assert_eq!(store.status, ComponentStatus::Healthy);
        assert!(store.message.is_none());
    }

    #[tokio::test]
    async fn test_readiness() {
        let registry = HealthRegistry::new();
        assert!(!registry.readiness().await.ready);

        registry.set_ready(true).await;
        registry.set_degraded(components::ANOMALY_MODEL, "no model").await;
        assert!(registry.readiness().await.ready);

        registry.set_unhealthy(components::SAMPLE_STORE, "disk gone").await;
        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert!(readiness.reason.is_some());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&ComponentStatus::Degraded).unwrap();
        assert_eq!(json, "\"degraded\"");
    }
}
