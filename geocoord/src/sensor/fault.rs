//! Sensor fault classification.

use thiserror::Error;

use crate::error::{ErrorKind, LocationError};

/// A fault reported by a running session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SensorFault {
    /// No fix right now; the driver keeps trying.
    #[error("Location currently unknown")]
    LocationUnknown,

    /// Permission was withdrawn while the session ran.
    #[error("Location permission revoked")]
    PermissionRevoked,

    /// The provider was switched off.
    #[error("Location provider disabled")]
    ProviderDisabled,

    #[error("{0}")]
    Other(String),
}

/// What the coordinator does with a fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultClass {
    /// Absorbed; the session keeps running.
    Transient,
    /// Pending requests fail with this error and the session stops.
    Fatal(LocationError),
}

impl SensorFault {
    /// Decide whether the fault ends the session.
    pub fn classify(&self) -> FaultClass {
        match self {
            Self::LocationUnknown => FaultClass::Transient,
            Self::PermissionRevoked => FaultClass::Fatal(LocationError::permission_denied()),
            Self::ProviderDisabled | Self::Other(_) => FaultClass::Fatal(LocationError::new(
                ErrorKind::PositionUnavailable,
                self.to_string(),
            )),
        }
    }

    /// Map a CoreLocation error code.
    ///
    /// 0 is treated as a denial and 1 as a temporary loss of fix; anything
    /// else is a generic failure.
    pub fn from_cl_error_code(code: i64) -> Self {
        match code {
            0 => Self::PermissionRevoked,
            1 => Self::LocationUnknown,
            other => Self::Other(format!("CoreLocation error {other}")),
        }
    }

    /// Map an Android exception by class name.
    pub fn from_android_exception(exception: &str, message: &str) -> Self {
        let simple_name = exception.rsplit('.').next().unwrap_or(exception);
        if simple_name == "SecurityException" {
            Self::PermissionRevoked
        } else {
            Self::Other(format!("{simple_name}: {message}"))
        }
    }
}
