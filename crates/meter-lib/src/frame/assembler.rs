//! Accumulate-and-flush state machine turning meter lines into samples

use super::parser::{parse_line, MeterLine};
use crate::models::{
    format_timestamp, PhaseReading, PhaseReadings, PhaseTag, Sample, DEFAULT_COST_RATE,
};
use chrono::{DateTime, Utc};
use tracing::{debug, trace};

/// In-progress frame. Every slot is overwritten by the latest matching line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryBlock {
    pub l1: Option<PhaseReading>,
    pub l2: Option<PhaseReading>,
    pub l3: Option<PhaseReading>,
    pub energy: Option<f64>,
    pub cost: Option<f64>,
}

impl TelemetryBlock {
    fn set_phase(&mut self, reading: PhaseReading) {
        let slot = match reading.tag {
            PhaseTag::L1 => &mut self.l1,
            PhaseTag::L2 => &mut self.l2,
            PhaseTag::L3 => &mut self.l3,
        };
        *slot = Some(reading);
    }

    /// All three phases and the energy reading are present
    pub fn is_complete(&self) -> bool {
        self.l1.is_some() && self.l2.is_some() && self.l3.is_some() && self.energy.is_some()
    }

    /// Build the sample if the block is complete
    fn to_sample(&self, captured_at: DateTime<Utc>) -> Option<Sample> {
        let phases = PhaseReadings {
            l1: self.l1?,
            l2: self.l2?,
            l3: self.l3?,
        };
        let energy = self.energy?;
        Some(Sample {
            timestamp: format_timestamp(captured_at),
            total_power: phases.powers().iter().sum(),
            total_energy: energy,
            phases,
            cost: self.cost.unwrap_or(energy * DEFAULT_COST_RATE),
        })
    }
}

/// Assembly state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblerState {
    Assembling,
    ReadyToFlush,
}

/// Converts a stream of raw lines into complete samples
#[derive(Debug, Default)]
pub struct FrameAssembler {
    block: TelemetryBlock,
    emitted: u64,
    dropped: u64,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one line, stamping any emitted sample with the current time
    pub fn push_line(&mut self, line: &str) -> Option<Sample> {
        self.push_line_at(line, Utc::now())
    }

    /// Consume one line, stamping any emitted sample with `captured_at`
    pub fn push_line_at(&mut self, line: &str, captured_at: DateTime<Utc>) -> Option<Sample> {
        match parse_line(line) {
            Some(MeterLine::Phase(reading)) => self.block.set_phase(reading),
            Some(MeterLine::Energy(energy)) => self.block.energy = Some(energy),
            Some(MeterLine::Cost(cost)) => self.block.cost = Some(cost),
            Some(MeterLine::ForeignPhase(tag)) => {
                trace!(tag = %tag, "Ignoring phase line with unknown tag");
                self.dropped += 1;
            }
            None => {
                trace!(line = %line, "Dropping unrecognised meter line");
                self.dropped += 1;
            }
        }

        if self.state() != AssemblerState::ReadyToFlush {
            return None;
        }

        let sample = self.block.to_sample(captured_at);
        self.block = TelemetryBlock::default();
        if let Some(sample) = &sample {
            self.emitted += 1;
            debug!(
                total_power = sample.total_power,
                total_energy = sample.total_energy,
                "Assembled meter sample"
            );
        }
        sample
    }

    pub fn state(&self) -> AssemblerState {
        if self.block.is_complete() {
            AssemblerState::ReadyToFlush
        } else {
            AssemblerState::Assembling
        }
    }

    /// Current in-progress block
    pub fn block(&self) -> &TelemetryBlock {
        &self.block
    }

    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
