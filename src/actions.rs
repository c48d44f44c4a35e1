//! Click callbacks.
//!
//! Each mouse button is bound to a named action at configuration time. The
//! host decides when a click happens; this module only resolves and performs
//! the bound action.

use std::str::FromStr;

use anyhow::{anyhow, Result};
use clap::ValueEnum;
use tracing::{debug, info};

// ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetAction {
    /// Open the monitoring endpoint in the default browser.
    OpenCgm,
    DoNothing,
}

impl FromStr for WidgetAction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        // ---
        match s {
            "open_cgm" => Ok(WidgetAction::OpenCgm),
            "do_nothing" => Ok(WidgetAction::DoNothing),
            other => Err(anyhow!(
                "Unknown callback '{}', expected 'open_cgm' or 'do_nothing'",
                other
            )),
        }
    }
}

impl WidgetAction {
    pub fn name(self) -> &'static str {
        match self {
            WidgetAction::OpenCgm => "open_cgm",
            WidgetAction::DoNothing => "do_nothing",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickBindings {
    // ---
    pub on_left: WidgetAction,
    pub on_middle: WidgetAction,
    pub on_right: WidgetAction,
}

impl Default for ClickBindings {
    fn default() -> Self {
        ClickBindings {
            on_left: WidgetAction::OpenCgm,
            on_middle: WidgetAction::DoNothing,
            on_right: WidgetAction::DoNothing,
        }
    }
}

impl ClickBindings {
    pub fn action_for(&self, button: MouseButton) -> WidgetAction {
        match button {
            MouseButton::Left => self.on_left,
            MouseButton::Middle => self.on_middle,
            MouseButton::Right => self.on_right,
        }
    }
}

/// Open `host` in the user's browser.
pub fn open_endpoint(host: &str) -> Result<()> {
    // ---
    info!("Opening {} in browser", host);
    open::that(host).map_err(|e| anyhow!("Failed to open '{}': {}", host, e))
}

/// Perform `action` for the endpoint at `host`.
pub fn perform(action: WidgetAction, host: &str) -> Result<()> {
    // ---
    debug!("Performing action {}", action.name());
    match action {
        WidgetAction::OpenCgm => open_endpoint(host),
        WidgetAction::DoNothing => Ok(()),
    }
}
