//! Error types surfaced to callers of the coordinator.
//!
//! [`LocationError`] is what one-shot requests reject with and what watch
//! subscriptions receive through their error channel. Its [`ErrorKind`]
//! carries the W3C Geolocation error code so binding layers can forward it
//! unchanged.

use std::time::Duration;

use thiserror::Error;

/// Classification of a location failure.
///
/// The numeric codes match the W3C Geolocation API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Permission is missing or was revoked. Not retried automatically.
    PermissionDenied,
    /// No usable provider, or the sensor reported an unrecoverable fault.
    PositionUnavailable,
    /// The request timer fired before a reading arrived.
    Timeout,
}

impl ErrorKind {
    /// W3C error code (1, 2 or 3).
    pub fn code(&self) -> u8 {
        match self {
            Self::PermissionDenied => 1,
            Self::PositionUnavailable => 2,
            Self::Timeout => 3,
        }
    }

    /// Inverse of [`ErrorKind::code`].
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::PermissionDenied),
            2 => Some(Self::PositionUnavailable),
            3 => Some(Self::Timeout),
            _ => None,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PermissionDenied => write!(f, "PERMISSION_DENIED"),
            Self::PositionUnavailable => write!(f, "POSITION_UNAVAILABLE"),
            Self::Timeout => write!(f, "TIMEOUT"),
        }
    }
}

/// A location failure delivered to a caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct LocationError {
    kind: ErrorKind,
    message: String,
}

impl LocationError {
    /// Create an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Permission denied by the user.
    pub fn permission_denied() -> Self {
        Self::new(
            ErrorKind::PermissionDenied,
            "User denied access to location services.",
        )
    }

    /// Permission restricted by device policy.
    pub fn permission_restricted() -> Self {
        Self::new(
            ErrorKind::PermissionDenied,
            "This application is not authorized to use location services",
        )
    }

    /// Neither the GPS nor the network provider can be used.
    pub fn no_provider() -> Self {
        Self::new(
            ErrorKind::PositionUnavailable,
            "No location provider available",
        )
    }

    /// The request was not satisfied within its timeout.
    pub fn timeout(timeout: Duration) -> Self {
        Self::new(
            ErrorKind::Timeout,
            format!(
                "Unable to fetch location within {:.1}s.",
                timeout.as_secs_f64()
            ),
        )
    }

    /// The coordinator stopped before the request completed.
    pub fn coordinator_stopped() -> Self {
        Self::new(
            ErrorKind::PositionUnavailable,
            "Location coordinator is not running",
        )
    }

    /// The error classification.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// W3C error code.
    pub fn code(&self) -> u8 {
        self.kind.code()
    }

    /// Human readable message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Rejected request options.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptionsError {
    /// A duration given in milliseconds was negative or not finite.
    #[error("{field} must be a finite, non-negative number of milliseconds (got {value})")]
    InvalidDuration { field: &'static str, value: f64 },

    /// A distance filter was negative or NaN.
    #[error("distanceFilter must be a non-negative number of meters (got {0})")]
    InvalidDistanceFilter(f64),

    /// The fastest interval exceeds the requested interval.
    #[error("fastestInterval ({fastest_ms}ms) must not exceed interval ({interval_ms}ms)")]
    FastestIntervalTooLong { fastest_ms: u128, interval_ms: u128 },
}

/// Failure starting a sensor session.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SensorError {
    /// The OS refused the subscription because permission is missing.
    #[error("Location permission denied: {0}")]
    PermissionDenied(String),

    /// The selected provider cannot be used right now.
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Any other driver failure.
    #[error("Sensor failure: {0}")]
    Driver(String),
}

impl From<SensorError> for LocationError {
    fn from(e: SensorError) -> Self {
        match e {
            SensorError::PermissionDenied(_) => {
                LocationError::new(ErrorKind::PermissionDenied, e.to_string())
            }
            SensorError::ProviderUnavailable(_) | SensorError::Driver(_) => {
                LocationError::new(ErrorKind::PositionUnavailable, e.to_string())
            }
        }
    }
}
