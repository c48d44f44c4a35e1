// src/pipeline/units.rs
//! Unit conversion for glucose values.
//!
//! The endpoint always reports mg/dL. Display values are produced in the
//! configured measurement system:
//! - `mg/dl`: rounded to the nearest integer, ties away from zero
//!   (`f64::round` semantics), e.g. `2.5 -> "3"`, `-2.5 -> "-3"`
//! - `mmol/l`: divided by 18 and shown with exactly one decimal digit
//!
//! Signs are preserved, so a falling delta stays negative after conversion.

use std::str::FromStr;

use crate::error::RenderError;

// ---

/// mg/dL per mmol/L used for glucose.
const MGDL_PER_MMOLL: f64 = 18.0;

pub const WRONG_UNITS_MESSAGE: &str = "Wrong measurement units";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasurementUnit {
    MgDl,
    MmolL,
}

impl FromStr for MeasurementUnit {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // ---
        match s {
            "mg/dl" => Ok(MeasurementUnit::MgDl),
            "mmol/l" => Ok(MeasurementUnit::MmolL),
            _ => Err(RenderError::InvalidConfiguration(WRONG_UNITS_MESSAGE.into())),
        }
    }
}

impl MeasurementUnit {
    pub fn format(self, value: f64) -> String {
        // ---
        match self {
            MeasurementUnit::MgDl => format!("{}", value.round() as i64),
            MeasurementUnit::MmolL => format!("{:.1}", value / MGDL_PER_MMOLL),
        }
    }
}

/// Convert a raw mg/dL value into display text for `unit`.
pub fn convert(value: f64, unit: &str) -> Result<String, RenderError> {
    Ok(unit.parse::<MeasurementUnit>()?.format(value))
}
