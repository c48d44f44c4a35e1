//! Nightscout glucose monitor.
//!
//! Polls the current sensor glucose value from a Nightscout endpoint,
//! converts and renders it through label/tooltip templates, and publishes
//! the result to a display sink. Modules, leaves first:
//! - `endpoint` / `models` / `fetcher` – authenticated GET and validation
//! - `pipeline` – units, trend glyphs, staleness, templates
//! - `scheduler` – interval and manual polling with in-flight exclusion
//! - `sink` – where rendered output and errors go
//! - `config` / `actions` – startup configuration and click callbacks

pub mod actions;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod fetcher;
pub mod models;
pub mod pipeline;
pub mod scheduler;
pub mod sink;

pub use config::Config;
pub use error::{ErrorKind, FetchError, PollError, RenderError};
pub use fetcher::{NightscoutClient, ReadingSource};
pub use models::{Direction, Reading};
pub use pipeline::{DisplayUpdate, RenderSettings, RenderedState, Segment};
pub use scheduler::{PollScheduler, PollState, TriggerOutcome};
