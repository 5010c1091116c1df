//! Global coordinator settings.
//!
//! Settings are the process-wide defaults a host applies once at startup
//! (and may replace later with `Coordinator::set_configuration`). They are
//! deserializable so a binding layer can pass its configuration object
//! through unchanged.

use serde::{Deserialize, Serialize};

/// Which authorization a permission prompt asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthorizationLevel {
    /// Foreground and background access.
    Always,
    /// Foreground access only.
    WhenInUse,
    /// Let the platform decide from the app's declared usage.
    #[default]
    Auto,
}

/// Which platform location stack backs the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LocationBackend {
    /// Use the fused provider when present, the platform one otherwise.
    #[default]
    Auto,
    /// Fused location provider.
    PlayServices,
    /// Raw platform location manager.
    #[serde(alias = "android")]
    Platform,
}

/// Global coordinator settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Never show a permission prompt; the host handles permission itself.
    pub skip_permission_requests: bool,

    /// Authorization requested when prompting.
    pub authorization_level: AuthorizationLevel,

    /// Ask for background access and keep sessions alive in the background.
    pub enable_background_location_updates: bool,

    /// Backend handed to the sensor when a session starts.
    pub location_backend: LocationBackend,
}
