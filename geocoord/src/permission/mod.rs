//! Location permission.
//!
//! The host supplies a [`PermissionProvider`]; the coordinator wraps it in a
//! [`PermissionGate`] so concurrent callers share one prompt.

mod gate;
mod simulated;

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::config::AuthorizationLevel;

pub use gate::PermissionGate;
pub use simulated::SimulatedPermissions;

/// A boxed future, used to keep traits dyn-compatible.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Current authorization state for location access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionStatus {
    Granted,
    /// The user refused.
    Denied,
    /// Device policy forbids location access; the user cannot change it.
    Restricted,
    /// The user has not been asked yet.
    Undetermined,
}

impl PermissionStatus {
    /// Whether a session may run.
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted)
    }

    /// Whether requests must fail without prompting.
    pub fn is_refused(&self) -> bool {
        matches!(self, Self::Denied | Self::Restricted)
    }
}

impl std::fmt::Display for PermissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Granted => write!(f, "granted"),
            Self::Denied => write!(f, "denied"),
            Self::Restricted => write!(f, "restricted"),
            Self::Undetermined => write!(f, "undetermined"),
        }
    }
}

/// What a permission prompt asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionRequest {
    pub level: AuthorizationLevel,
    /// Ask for background access as well.
    pub background: bool,
}

/// Platform permission API.
pub trait PermissionProvider: Send + Sync {
    /// Current status. Must not prompt.
    fn check(&self) -> PermissionStatus;

    /// Show the system prompt and resolve with the user's answer.
    fn request(&self, request: PermissionRequest) -> BoxFuture<'static, PermissionStatus>;
}
