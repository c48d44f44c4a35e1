//! Display and error sinks.
//!
//! The scheduler publishes every successful cycle and reports every failed
//! one exactly once. What "display" means is up to the sink: the binary
//! writes Waybar-style or full JSON lines, tests record what they receive.

use std::io::Write;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::PollError;
use crate::pipeline::DisplayUpdate;

// ---

pub const WIDGET_CLASS: &str = "cgm-widget";

pub trait DisplaySink: Send + Sync + 'static {
    /// Show a freshly rendered update.
    fn publish(&self, update: &DisplayUpdate);

    /// Surface a failed cycle. `error.to_string()` is the user-facing message.
    fn report_error(&self, error: &PollError);
}

/// Hand one cycle's outcome to `sink`: one publish or one report, never both.
///
/// Returns whether the cycle succeeded.
pub fn deliver<K: DisplaySink + ?Sized>(
    sink: &K,
    outcome: &Result<DisplayUpdate, PollError>,
) -> bool {
    // ---
    match outcome {
        Ok(update) => {
            sink.publish(update);
            true
        }
        Err(e) => {
            sink.report_error(e);
            false
        }
    }
}

fn write_line(line: serde_json::Result<String>) {
    // ---
    let line = match line {
        Ok(line) => line,
        Err(e) => {
            error!("Failed to encode display update: {}", e);
            return;
        }
    };

    let mut stdout = std::io::stdout().lock();
    if let Err(e) = writeln!(stdout, "{}", line).and_then(|_| stdout.flush()) {
        warn!("Failed to write display update: {}", e);
    }
}

/// One JSON object per line on stdout, the format status bars such as
/// Waybar read from custom modules.
///
/// Errors write nothing, so the bar keeps showing the last good reading.
#[derive(Debug, Default)]
pub struct WaybarSink;

#[derive(Serialize)]
struct WaybarLine<'a> {
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tooltip: Option<&'a str>,
    class: &'static str,
}

impl WaybarSink {
    pub fn line(update: &DisplayUpdate) -> serde_json::Result<String> {
        // ---
        serde_json::to_string(&WaybarLine {
            text: update.label_text(),
            tooltip: update.tooltip.as_deref(),
            class: WIDGET_CLASS,
        })
    }
}

impl DisplaySink for WaybarSink {
    fn publish(&self, update: &DisplayUpdate) {
        write_line(WaybarSink::line(update));
    }

    fn report_error(&self, err: &PollError) {
        error!(kind = ?err.kind(), "Glucose Monitor: {}", err);
    }
}

/// The whole [`DisplayUpdate`] (field values, label segments, tooltip) as
/// one JSON object per line, for consumers that lay out segments themselves.
#[derive(Debug, Default)]
pub struct JsonSink;

impl JsonSink {
    pub fn line(update: &DisplayUpdate) -> serde_json::Result<String> {
        serde_json::to_string(update)
    }
}

impl DisplaySink for JsonSink {
    fn publish(&self, update: &DisplayUpdate) {
        write_line(JsonSink::line(update));
    }

    fn report_error(&self, err: &PollError) {
        error!(kind = ?err.kind(), "Glucose Monitor: {}", err);
    }
}

/// Sink that only logs, for headless runs (`--output log`).
#[derive(Debug, Default)]
pub struct LogSink;

impl DisplaySink for LogSink {
    fn publish(&self, update: &DisplayUpdate) {
        info!(
            label = %update.label_text(),
            tooltip = update.tooltip.as_deref().unwrap_or(""),
            "Display updated"
        );
    }

    fn report_error(&self, err: &PollError) {
        error!(kind = ?err.kind(), "Glucose Monitor: {}", err);
    }
}
