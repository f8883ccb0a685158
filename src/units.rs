//! Metric/imperial length conversion for display and input parsing.
//!
//! Storage is always in meters. Inches are rounded to 2 places and meters to 4,
//! so a value shown in inches and typed back does not drift visibly.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

pub const INCHES_PER_METER: f64 = 39.37;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum UnitSystem {
    #[default]
    Metric,
    Imperial,
}

impl UnitSystem {
    pub fn suffix(&self) -> &'static str {
        match self {
            UnitSystem::Metric => "m",
            UnitSystem::Imperial => "in",
        }
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

pub fn to_inches(meters: f64) -> f64 {
    if !meters.is_finite() {
        return 0.0;
    }
    round_to(meters * INCHES_PER_METER, 2)
}

pub fn to_meters(inches: f64) -> f64 {
    if !inches.is_finite() {
        return 0.0;
    }
    round_to(inches / INCHES_PER_METER, 4)
}

/// Parses user input in the given unit system and returns meters.
/// Accepts a decimal comma. Anything non-numeric becomes 0.
pub fn parse_length(input: &str, system: UnitSystem) -> f64 {
    let value = input
        .trim()
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0);

    match system {
        UnitSystem::Metric => value,
        UnitSystem::Imperial => to_meters(value),
    }
}

pub fn format_length(meters: f64, system: UnitSystem) -> String {
    match system {
        UnitSystem::Metric => format!("{:.2} {}", meters, system.suffix()),
        UnitSystem::Imperial => format!("{:.2} {}", to_inches(meters), system.suffix()),
    }
}

/// Formats a `width x length` pair, e.g. `1.52 x 30.00 m`.
pub fn format_dimensions(width: f64, length: f64, system: UnitSystem) -> String {
    let (w, l) = match system {
        UnitSystem::Metric => (width, length),
        UnitSystem::Imperial => (to_inches(width), to_inches(length)),
    };
    format!("{:.2} x {:.2} {}", w, l, system.suffix())
}
