//! Core of the energy predictor
//!
//! This crate provides:
//! - Frame assembly of raw meter lines into samples
//! - Flat-file sample and daily-history persistence
//! - Staleness-aware caches for the energy predictor and the outlier model
//! - Tiered prediction and anomaly resolution
//! - Periodic model refresh, health checks and observability

pub mod anomaly;
pub mod error;
pub mod frame;
pub mod health;
pub mod models;
pub mod observability;
pub mod predictor;
pub mod refresh;
pub mod service;
pub mod slot;
pub mod store;

pub use error::{MeterError, Result};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{MeterMetrics, StructuredLogger};
pub use refresh::{RefreshReport, RefreshScheduler, DEFAULT_REFRESH_INTERVAL};
pub use service::PredictionService;
