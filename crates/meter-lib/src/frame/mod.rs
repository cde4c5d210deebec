//! Frame assembly from raw meter output
//!
//! The meter prints one reading per line. Phase, energy and cost lines are
//! parsed independently and accumulated into a telemetry block until a
//! complete sample can be emitted.

mod assembler;
mod parser;


pub use assembler::{AssemblerState, FrameAssembler, TelemetryBlock};
pub use parser::{parse_cost_line, parse_energy_line, parse_line, parse_phase_line, MeterLine};
