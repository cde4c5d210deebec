//! Core data models for the energy predictor

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Energy in kWh of a mean power (watts) held for a whole day
pub fn daily_energy_kwh(mean_power_watts: f64) -> f64 {
    mean_power_watts * 24.0 / 1000.0
}

/// Billing rate applied when the meter did not report a cost line
pub const DEFAULT_COST_RATE: f64 = 8.0;

/// One of the three supply phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhaseTag {
    L1,
    L2,
    L3,
}

impl PhaseTag {
    pub const ALL: [PhaseTag; 3] = [PhaseTag::L1, PhaseTag::L2, PhaseTag::L3];

    /// Parse a tag, ignoring surrounding whitespace and case
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "L1" => Some(PhaseTag::L1),
            "L2" => Some(PhaseTag::L2),
            "L3" => Some(PhaseTag::L3),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseTag::L1 => "L1",
            PhaseTag::L2 => "L2",
            PhaseTag::L3 => "L3",
        }
    }
}

impl fmt::Display for PhaseTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single phase line as reported by the meter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseReading {
    pub tag: PhaseTag,
    pub voltage: f64,
    pub current: f64,
    pub power: f64,
}

/// The three phase readings of one completed frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseReadings {
    pub l1: PhaseReading,
    pub l2: PhaseReading,
    pub l3: PhaseReading,
}

impl PhaseReadings {
    pub fn get(&self, tag: PhaseTag) -> &PhaseReading {
        match tag {
            PhaseTag::L1 => &self.l1,
            PhaseTag::L2 => &self.l2,
            PhaseTag::L3 => &self.l3,
        }
    }

    /// Phase powers in L1, L2, L3 order
    pub fn powers(&self) -> [f64; 3] {
        [self.l1.power, self.l2.power, self.l3.power]
    }
}

/// A completed telemetry frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// ISO-8601 capture time
    pub timestamp: String,
    pub total_power: f64,
    pub total_energy: f64,
    pub phases: PhaseReadings,
    pub cost: f64,
}

/// Externally supplied daily energy total
#[derive(Debug, Clone, PartialEq)]
pub struct DailyHistoryRecord {
    pub date: NaiveDate,
    pub total_energy: f64,
}

/// Which prediction tier produced the forecast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionProvenance {
    Model,
    MovingAvg,
    LastSample,
    InstantEstimate,
    None,
}

impl PredictionProvenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionProvenance::Model => "model",
            PredictionProvenance::MovingAvg => "moving_avg",
            PredictionProvenance::LastSample => "last_sample",
            PredictionProvenance::InstantEstimate => "instant_estimate",
            PredictionProvenance::None => "none",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionResult {
    pub value: Option<f64>,
    pub provenance: PredictionProvenance,
}

impl PredictionResult {
    pub fn resolved(value: f64, provenance: PredictionProvenance) -> Self {
        Self {
            value: Some(value),
            provenance,
        }
    }

    pub fn unresolved() -> Self {
        Self {
            value: None,
            provenance: PredictionProvenance::None,
        }
    }
}

/// Which anomaly tier produced the verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyProvenance {
    IsolationForest,
    Zscore,
    None,
}

impl AnomalyProvenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyProvenance::IsolationForest => "isolation_forest",
            AnomalyProvenance::Zscore => "zscore",
            AnomalyProvenance::None => "none",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnomalyResult {
    pub flag: bool,
    pub provenance: AnomalyProvenance,
}

impl AnomalyResult {
    pub fn undetermined() -> Self {
        Self {
            flag: false,
            provenance: AnomalyProvenance::None,
        }
    }
}

/// Outlier feature vector: total power followed by the three phase powers
pub type PowerFeatures = [f64; 4];

/// Per-phase payload of an inbound sample
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PhasePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub c: Option<f64>,
    #[serde(default)]
    pub p: Option<f64>,
}

/// Inbound sample as posted to `/predict`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestRequest {
    #[serde(default)]
    pub t: Option<String>,
    #[serde(rename = "totalPower", default)]
    pub total_power: Option<f64>,
    #[serde(rename = "totalEnergy", default)]
    pub total_energy: Option<f64>,
    #[serde(rename = "L1", default)]
    pub l1: Option<PhasePayload>,
    #[serde(rename = "L2", default)]
    pub l2: Option<PhasePayload>,
    #[serde(rename = "L3", default)]
    pub l3: Option<PhasePayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
}

impl IngestRequest {
    /// Parse a request body. Anything other than a non-empty JSON object
    /// yields `None` and is dropped by the caller.
    pub fn from_slice(body: &[u8]) -> Option<Self> {
        let value: serde_json::Value = serde_json::from_slice(body).ok()?;
        match &value {
            serde_json::Value::Object(map) if !map.is_empty() => {}
            _ => return None,
        }
        serde_json::from_value(value).ok()
    }

    pub fn phase_power(&self, tag: PhaseTag) -> Option<f64> {
        let phase = match tag {
            PhaseTag::L1 => self.l1.as_ref(),
            PhaseTag::L2 => self.l2.as_ref(),
            PhaseTag::L3 => self.l3.as_ref(),
        };
        phase.and_then(|p| p.p)
    }

    /// Outlier features with absent values treated as 0
    pub fn features(&self) -> PowerFeatures {
        [
            self.total_power.unwrap_or(0.0),
            self.phase_power(PhaseTag::L1).unwrap_or(0.0),
            self.phase_power(PhaseTag::L2).unwrap_or(0.0),
            self.phase_power(PhaseTag::L3).unwrap_or(0.0),
        ]
    }
}

impl From<&Sample> for IngestRequest {
    fn from(sample: &Sample) -> Self {
        let phase = |tag: PhaseTag| {
            let reading = sample.phases.get(tag);
            Some(PhasePayload {
                v: Some(reading.voltage),
                c: Some(reading.current),
                p: Some(reading.power),
            })
        };
        Self {
            t: Some(sample.timestamp.clone()),
            total_power: Some(sample.total_power),
            total_energy: Some(sample.total_energy),
            l1: phase(PhaseTag::L1),
            l2: phase(PhaseTag::L2),
            l3: phase(PhaseTag::L3),
            cost: Some(sample.cost),
        }
    }
}

/// Response body of `/predict`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    pub prediction: Option<f64>,
    pub anomaly: bool,
    pub reason: String,
    #[serde(rename = "predictionSource", default = "default_source")]
    pub prediction_source: PredictionProvenance,
}

fn default_source() -> PredictionProvenance {
    PredictionProvenance::None
}

impl PredictResponse {
    pub fn from_results(prediction: PredictionResult, anomaly: AnomalyResult) -> Self {
        let reason = if anomaly.flag {
            anomaly.provenance.as_str().to_string()
        } else {
            String::new()
        };
        Self {
            prediction: prediction.value,
            anomaly: anomaly.flag,
            reason,
            prediction_source: prediction.provenance,
        }
    }

    /// Worst-case answer: no forecast, no anomaly
    pub fn empty() -> Self {
        Self::from_results(PredictionResult::unresolved(), AnomalyResult::undetermined())
    }
}

/// Format a capture time the way samples are stamped
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored sample timestamp. Accepts RFC 3339, naive ISO-8601
/// date-times (`T` or space separated) and bare dates.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
