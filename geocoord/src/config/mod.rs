//! Sensor configuration.
//!
//! - [`merge`] - fold active request options into one [`EffectiveSensorConfig`]
//! - [`select_provider`] - choose GPS or network for a session
//! - [`Settings`] - global defaults set by the host

mod merge;
mod provider;
mod settings;

pub use merge::{merge, EffectiveSensorConfig, DEFAULT_INTERVAL};
pub use provider::select_provider;
pub use settings::{AuthorizationLevel, LocationBackend, Settings};
