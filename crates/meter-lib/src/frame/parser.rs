//! Line parsers for the three recognised meter line shapes
//!
//! ```text
//! L1:230.5V 0.32A 72.3W
//! Energy: 5.21kWh
//! Cost: Rs 41.68
//! ```

use crate::models::{PhaseReading, PhaseTag};

/// A recognised meter line
#[derive(Debug, Clone, PartialEq)]
pub enum MeterLine {
    Phase(PhaseReading),
    /// Well-formed phase line for a tag other than L1/L2/L3
    ForeignPhase(String),
    Energy(f64),
    Cost(f64),
}

/// Parse one raw line. Shapes are tried in order phase, energy, cost; the
/// first that matches wins. Unrecognised lines yield `None`.
pub fn parse_line(line: &str) -> Option<MeterLine> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if let Some((tag, reading)) = parse_phase_line(line) {
        return Some(match PhaseTag::parse(&tag) {
            Some(tag) => MeterLine::Phase(PhaseReading { tag, ..reading }),
            None => MeterLine::ForeignPhase(tag),
        });
    }
    if let Some(energy) = parse_energy_line(line) {
        return Some(MeterLine::Energy(energy));
    }
    parse_cost_line(line).map(MeterLine::Cost)
}

/// Parse `"<TAG>:<voltage>V <current>A <power>W"`. Returns the upper-cased
/// tag text and a reading tagged L1; the caller resolves the real tag.
pub fn parse_phase_line(line: &str) -> Option<(String, PhaseReading)> {
    let (tag, rest) = line.trim().split_once(':')?;
    let mut parts = rest.split_whitespace();
    let voltage = parse_unit(parts.next()?, 'V')?;
    let current = parse_unit(parts.next()?, 'A')?;
    let power = parse_unit(parts.next()?, 'W')?;

    Some((
        tag.trim().to_ascii_uppercase(),
        PhaseReading {
            tag: PhaseTag::L1,
            voltage,
            current,
            power,
        },
    ))
}

/// Parse an energy line: case-insensitive `energy` prefix, numeric payload
pub fn parse_energy_line(line: &str) -> Option<f64> {
    let line = line.trim();
    if !line.to_lowercase().starts_with("energy") {
        return None;
    }
    extract_number(line)
}

/// Parse a cost line: `cost` anywhere in the line, numeric payload
pub fn parse_cost_line(line: &str) -> Option<f64> {
    let line = line.trim();
    if !line.to_lowercase().contains("cost") {
        return None;
    }
    extract_number(line)
}

fn parse_unit(token: &str, unit: char) -> Option<f64> {
    token
        .trim_end_matches(|c: char| c.eq_ignore_ascii_case(&unit))
        .parse()
        .ok()
}

/// Keep only digits, '.' and '-' and parse what remains
fn extract_number(line: &str) -> Option<f64> {
    let digits: String = line
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_phase_line() {
        let (tag, reading) = parse_phase_line("l2:230.5V 0.32A 72.3W").unwrap();
        assert_eq!(tag, "L2");
        assert_eq!(reading.voltage, 230.5);
        assert_eq!(reading.current, 0.32);
        assert_eq!(reading.power, 72.3);
    }

    #[test]
    fn test_phase_units_are_case_insensitive() {
        let (_, reading) = parse_phase_line("L1: 231v 1.5a 340w").unwrap();
        assert_eq!(reading.power, 340.0);
    }

    #[test]
    fn test_phase_line_needs_three_fields() {
        assert!(parse_phase_line("L1:230V 0.3A").is_none());
        assert!(parse_phase_line("L1 230V 0.3A 70W").is_none());
        assert!(parse_phase_line("L1:abcV 0.3A 70W").is_none());
    }

    #[test]
    fn test_parse_energy_line() {
        assert_eq!(parse_energy_line("Energy: 5.21kWh"), Some(5.21));
        assert_eq!(parse_energy_line("ENERGY=12"), Some(12.0));
        assert_eq!(parse_energy_line("Total energy: 5"), None);
        assert_eq!(parse_energy_line("Energy: n/a"), None);
    }

    #[test]
    fn test_parse_cost_line() {
        assert_eq!(parse_cost_line("Cost: Rs 41.68"), Some(41.68));
        assert_eq!(parse_cost_line("Total COST -3.5"), Some(-3.5));
        assert_eq!(parse_cost_line("Price: 4"), None);
    }

    #[test]
    fn test_energy_line_is_not_a_phase_line() {
        // "Energy: 5.21kWh" contains ':' but only one field after it
        assert_eq!(parse_line("Energy: 5.21kWh"), Some(MeterLine::Energy(5.21)));
        assert_eq!(parse_line("Cost: Rs 41.68"), Some(MeterLine::Cost(41.68)));
    }

    #[test]
    fn test_foreign_phase_tag() {
        assert_eq!(
            parse_line("L4:230V 1A 230W"),
            Some(MeterLine::ForeignPhase("L4".to_string()))
        );
    }

    #[test]
    fn test_garbage_is_dropped() {
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("   "), None);
        assert_eq!(parse_line("booting meter firmware v2"), None);
    }
}
