//! Reading to display pipeline.
//!
//! Gateway for the pure, synchronous stages that run on the completion path
//! of a successful fetch: unit conversion, trend glyph lookup, staleness and
//! template rendering. Callers only use [`render_update`]; the stage modules
//! stay private apart from the types they export here.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::RenderError;
use crate::models::Reading;

mod direction;
mod staleness;
mod template;
mod units;

pub use direction::DirectionIcons;
pub use staleness::minutes_since;
pub use template::{render, render_text, Fields, Segment};
pub use units::{convert, MeasurementUnit, WRONG_UNITS_MESSAGE};

// ---

/// Field values available to the label and tooltip templates.
///
/// Always rebuilt in full from one reading; never patched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedState {
    // ---
    pub sgv: String,
    pub sgv_delta: String,
    pub delta_time_in_minutes: String,
    pub direction: String,
}

impl Fields for RenderedState {
    fn field(&self, name: &str) -> Option<&str> {
        // ---
        match name {
            "sgv" => Some(&self.sgv),
            "sgv_delta" => Some(&self.sgv_delta),
            "delta_time_in_minutes" => Some(&self.delta_time_in_minutes),
            "direction" => Some(&self.direction),
            _ => None,
        }
    }
}

/// Immutable rendering configuration handed to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSettings {
    // ---
    pub label: String,
    /// Empty disables the tooltip.
    pub tooltip: String,
    pub direction_icons: DirectionIcons,
    /// `mg/dl` or `mmol/l`; anything else fails each cycle.
    pub units: String,
}

/// Everything a display sink needs for one successful cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayUpdate {
    // ---
    pub state: RenderedState,
    pub label: Vec<Segment>,
    pub tooltip: Option<String>,
}

impl DisplayUpdate {
    /// Label segments joined in order, for single-text displays.
    pub fn label_text(&self) -> String {
        self.label.iter().map(Segment::text).collect()
    }
}

/// Derive the field mapping for `reading` as of `now`.
pub fn rendered_state(
    reading: &Reading,
    settings: &RenderSettings,
    now: DateTime<Utc>,
) -> Result<RenderedState, RenderError> {
    // ---
    let unit: MeasurementUnit = settings.units.parse()?;

    Ok(RenderedState {
        sgv: unit.format(reading.sgv),
        sgv_delta: unit.format(reading.delta),
        delta_time_in_minutes: minutes_since(reading.timestamp, now).to_string(),
        direction: settings.direction_icons.glyph(reading.direction).to_string(),
    })
}

/// Run every render stage for one reading. Any error aborts the whole update.
pub fn render_update(
    reading: &Reading,
    settings: &RenderSettings,
    now: DateTime<Utc>,
) -> Result<DisplayUpdate, RenderError> {
    // ---
    let state = rendered_state(reading, settings, now)?;
    let label = render(&settings.label, &state)?;
    let tooltip = if settings.tooltip.is_empty() {
        None
    } else {
        Some(render_text(&settings.tooltip, &state)?)
    };

    Ok(DisplayUpdate {
        state,
        label,
        tooltip,
    })
}
