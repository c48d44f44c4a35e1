//! Configuration loader for the `glucose-monitor` widget.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). Everything is resolved once at startup and handed
//! to the scheduler as immutable values, so nothing downstream reads the
//! environment.
use std::env;
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::actions::{ClickBindings, WidgetAction};
use crate::endpoint::Endpoint;
use crate::pipeline::{DirectionIcons, MeasurementUnit, RenderSettings};

/// Parse an optional positive integer variable with a default value.
macro_rules! parse_env_secs {
    ($get:expr, $var_name:expr, $default:expr) => {{
        let secs = $get($var_name)
            .map(|v| v.parse::<u64>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default);
        if secs == 0 {
            return Err(anyhow!("{} must be greater than zero", $var_name));
        }
        Duration::from_secs(secs)
    }};
}

/// Parse a required string variable.
macro_rules! require_env {
    ($get:expr, $var_name:expr) => {
        $get($var_name)
            .ok_or_else(|| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// Optional string variable with a default value.
macro_rules! env_or {
    ($get:expr, $var_name:expr, $default:expr) => {
        $get($var_name).unwrap_or_else(|| String::from($default))
    };
}

/// Optional callback identifier, validated against the known actions.
macro_rules! parse_env_action {
    ($get:expr, $var_name:expr, $default:expr) => {
        match $get($var_name) {
            Some(v) => v
                .parse::<WidgetAction>()
                .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?,
            None => $default,
        }
    };
}

pub const DEFAULT_LABEL: &str = "🩸{sgv}{direction}";
pub const DEFAULT_TOOLTIP: &str = "({sgv_delta}) {delta_time_in_minutes} min";
pub const DEFAULT_UNITS: &str = "mg/dl";
pub const DEFAULT_POLL_SECS: u64 = 60;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Secret value that means "read the secret from `CGM_SECRET_ENV_NAME`".
pub const SECRET_FROM_ENV: &str = "env";

/// Strongly typed widget configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the widget.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// Nightscout host plus resolved secret.
    pub endpoint: Endpoint,

    /// Label template with `{field}` placeholders and `<span>` icons.
    pub label: String,

    /// Tooltip template; empty disables the tooltip.
    pub tooltip: String,

    /// `mg/dl` or `mmol/l`, checked on every cycle.
    pub units: String,

    pub direction_icons: DirectionIcons,

    pub callbacks: ClickBindings,

    /// Time between scheduled polls.
    pub poll_interval: Duration,

    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
}

/// Load configuration from the process environment.
///
/// Required:
/// - `CGM_HOST` – Nightscout base URL
/// - `CGM_SECRET` – API secret, or `env` to read it from `CGM_SECRET_ENV_NAME`
///
/// Optional:
/// - `CGM_LABEL`, `CGM_TOOLTIP` – templates
/// - `CGM_UNITS` – `mg/dl` (default) or `mmol/l`
/// - `CGM_ICON_<TREND>` – glyph per trend code
/// - `CGM_ON_LEFT` / `CGM_ON_MIDDLE` / `CGM_ON_RIGHT` – click callbacks
/// - `CGM_POLL_SECS` – poll interval (default: 60)
/// - `CGM_TIMEOUT_SECS` – HTTP timeout (default: 10)
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    load_from(|name| env::var(name).ok())
}

/// Load configuration through an arbitrary variable lookup.
pub fn load_from<F>(get: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    // ---
    let host = require_env!(get, "CGM_HOST");
    let secret = resolve_secret(&get, require_env!(get, "CGM_SECRET"))?;

    let defaults = DirectionIcons::default();
    let direction_icons = DirectionIcons {
        double_up: env_or!(get, "CGM_ICON_DOUBLE_UP", defaults.double_up),
        single_up: env_or!(get, "CGM_ICON_SINGLE_UP", defaults.single_up),
        forty_five_up: env_or!(get, "CGM_ICON_FORTY_FIVE_UP", defaults.forty_five_up),
        flat: env_or!(get, "CGM_ICON_FLAT", defaults.flat),
        forty_five_down: env_or!(get, "CGM_ICON_FORTY_FIVE_DOWN", defaults.forty_five_down),
        single_down: env_or!(get, "CGM_ICON_SINGLE_DOWN", defaults.single_down),
        double_down: env_or!(get, "CGM_ICON_DOUBLE_DOWN", defaults.double_down),
    };

    let callbacks = ClickBindings {
        on_left: parse_env_action!(get, "CGM_ON_LEFT", WidgetAction::OpenCgm),
        on_middle: parse_env_action!(get, "CGM_ON_MIDDLE", WidgetAction::DoNothing),
        on_right: parse_env_action!(get, "CGM_ON_RIGHT", WidgetAction::DoNothing),
    };

    Ok(Config {
        endpoint: Endpoint::new(host, secret),
        label: env_or!(get, "CGM_LABEL", DEFAULT_LABEL),
        tooltip: env_or!(get, "CGM_TOOLTIP", DEFAULT_TOOLTIP),
        units: env_or!(get, "CGM_UNITS", DEFAULT_UNITS),
        direction_icons,
        callbacks,
        poll_interval: parse_env_secs!(get, "CGM_POLL_SECS", DEFAULT_POLL_SECS),
        request_timeout: parse_env_secs!(get, "CGM_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS),
    })
}

/// Apply the `env` sentinel: read the real secret from the variable named by
/// `CGM_SECRET_ENV_NAME`.
fn resolve_secret<F>(get: &F, secret: String) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    // ---
    if secret != SECRET_FROM_ENV {
        return Ok(secret);
    }

    let env_name = get("CGM_SECRET_ENV_NAME")
        .filter(|name| !name.is_empty())
        .ok_or_else(|| anyhow!("CGM_SECRET is 'env' but CGM_SECRET_ENV_NAME is not set"))?;

    get(&env_name)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| anyhow!("Secret variable {} is not set", env_name))
}

impl Config {
    /// Rendering inputs the scheduler owns for its whole lifetime.
    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            label: self.label.clone(),
            tooltip: self.tooltip.clone(),
            direction_icons: self.direction_icons.clone(),
            units: self.units.clone(),
        }
    }

    /// Log the loaded configuration for debugging purposes.
    ///
    /// The secret never appears; the request URL is shown with the digest
    /// masked.
    pub fn log_config(&self) {
        // ---
        tracing::info!("Configuration loaded:");
        tracing::info!("  CGM_HOST         : {}", self.endpoint.host());
        tracing::info!("  request URL      : {}", self.endpoint.redacted_url());
        tracing::info!("  CGM_LABEL        : {}", self.label);
        tracing::info!("  CGM_TOOLTIP      : {}", self.tooltip);
        tracing::info!("  CGM_UNITS        : {}", self.units);
        tracing::info!("  CGM_POLL_SECS    : {}", self.poll_interval.as_secs());
        tracing::info!("  CGM_TIMEOUT_SECS : {}", self.request_timeout.as_secs());
        tracing::info!(
            "  callbacks        : left={} middle={} right={}",
            self.callbacks.on_left.name(),
            self.callbacks.on_middle.name(),
            self.callbacks.on_right.name()
        );

        if self.units.parse::<MeasurementUnit>().is_err() {
            tracing::warn!(
                "CGM_UNITS '{}' is not 'mg/dl' or 'mmol/l'; every poll will fail",
                self.units
            );
        }
    }
}
