//! Error types for the meter core

use thiserror::Error;

/// Errors raised inside the core. None of them reach an HTTP caller: every
/// tier and refresh turns them into "no value" after logging.
#[derive(Debug, Error)]
pub enum MeterError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
    #[error("Model fit failed: {0}")]
    Fit(String),
    #[error("Model inference failed: {0}")]
    Inference(String),
}

pub type Result<T> = std::result::Result<T, MeterError>;
