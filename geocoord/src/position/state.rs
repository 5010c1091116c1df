//! Core reading types.
//!
//! - [`Provider`] - Which sensor provider produced a reading
//! - [`ProviderAvailability`] - Which providers can currently be used
//! - [`Position`] - A single immutable location reading

use serde::{Deserialize, Serialize};

/// Underlying sensor provider.
///
/// GPS is the high-accuracy provider; network (Wi-Fi/cell) is the coarse,
/// low-power one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Satellite positioning (meter-level, power hungry).
    Gps,
    /// Network-assisted positioning (tens to thousands of meters).
    Network,
}

impl Provider {
    /// The other provider, used as fallback.
    pub fn fallback(&self) -> Self {
        match self {
            Self::Gps => Self::Network,
            Self::Network => Self::Gps,
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gps => write!(f, "gps"),
            Self::Network => write!(f, "network"),
        }
    }
}

/// Which providers are enabled and permitted right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProviderAvailability {
    pub gps: bool,
    pub network: bool,
}

impl ProviderAvailability {
    /// Both providers usable.
    pub const ALL: Self = Self {
        gps: true,
        network: true,
    };

    /// Neither provider usable (location services disabled).
    pub const NONE: Self = Self {
        gps: false,
        network: false,
    };

    /// Whether `provider` is usable.
    pub fn is_available(&self, provider: Provider) -> bool {
        match provider {
            Provider::Gps => self.gps,
            Provider::Network => self.network,
        }
    }
}

/// A location reading.
///
/// Readings are produced only by a sensor source and never mutated
/// afterwards. `accuracy` is the horizontal accuracy radius in meters
/// (lower is more precise). `timestamp_ms` is milliseconds since the Unix
/// epoch at which the fix was taken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    /// Latitude in degrees (-90 to 90).
    pub latitude: f64,

    /// Longitude in degrees (-180 to 180).
    pub longitude: f64,

    /// Altitude above the WGS84 ellipsoid in meters.
    pub altitude: Option<f64>,

    /// Horizontal accuracy in meters.
    pub accuracy: f64,

    /// Vertical accuracy in meters.
    pub altitude_accuracy: Option<f64>,

    /// Direction of travel in degrees clockwise from true north.
    pub heading: Option<f64>,

    /// Ground speed in meters per second.
    pub speed: Option<f64>,

    /// Fix time, milliseconds since the Unix epoch.
    pub timestamp_ms: i64,

    /// Provider that produced the fix, when the driver reports it.
    pub provider: Option<Provider>,
}

impl Position {
    /// Create a horizontal-only reading.
    pub fn new(latitude: f64, longitude: f64, accuracy: f64, timestamp_ms: i64) -> Self {
        Self {
            latitude,
            longitude,
            altitude: None,
            accuracy,
            altitude_accuracy: None,
            heading: None,
            speed: None,
            timestamp_ms,
            provider: None,
        }
    }

    /// Tag the reading with the provider that produced it.
    pub fn with_provider(mut self, provider: Provider) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Attach altitude and its accuracy.
    pub fn with_altitude(mut self, altitude: f64, altitude_accuracy: Option<f64>) -> Self {
        self.altitude = Some(altitude);
        self.altitude_accuracy = altitude_accuracy;
        self
    }

    /// Attach heading and speed.
    pub fn with_motion(mut self, heading: Option<f64>, speed: Option<f64>) -> Self {
        self.heading = heading;
        self.speed = speed;
        self
    }

    /// Age of the reading relative to `now_ms` (negative if from the future).
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms - self.timestamp_ms
    }

    /// Whether vector data (heading and speed) is present.
    pub fn has_motion(&self) -> bool {
        self.heading.is_some() && self.speed.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_fallback() {
        assert_eq!(Provider::Gps.fallback(), Provider::Network);
        assert_eq!(Provider::Network.fallback(), Provider::Gps);
    }

    #[test]
    fn test_availability() {
        let only_network = ProviderAvailability {
            gps: false,
            network: true,
        };
        assert!(!only_network.is_available(Provider::Gps));
        assert!(only_network.is_available(Provider::Network));
        assert!(!ProviderAvailability::NONE.is_available(Provider::Network));
    }

    #[test]
    fn test_position_builders() {
        let position = Position::new(53.63, 9.99, 12.0, 1_000)
            .with_provider(Provider::Gps)
            .with_altitude(15.0, Some(3.0))
            .with_motion(Some(90.0), Some(4.5));

        assert_eq!(position.provider, Some(Provider::Gps));
        assert_eq!(position.altitude, Some(15.0));
        assert!(position.has_motion());
        assert_eq!(position.age_ms(4_000), 3_000);
    }

    #[test]
    fn test_position_serializes_camel_case() {
        let position = Position::new(1.0, 2.0, 5.0, 7).with_provider(Provider::Network);
        let json = serde_json::to_value(&position).unwrap();

        assert_eq!(json["timestampMs"], 7);
        assert_eq!(json["provider"], "network");
        assert!(json["altitudeAccuracy"].is_null());
    }
}
