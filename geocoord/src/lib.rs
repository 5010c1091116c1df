//! geocoord - location update coordination
//!
//! Multiplexes one-shot position requests and continuous watch subscriptions
//! from many callers over a single platform location sensor. The sensor runs
//! only while someone is waiting for a reading, with the most demanding
//! configuration any of them asked for.
//!
//! # High-Level API
//!
//! ```ignore
//! use geocoord::coordinator::Coordinator;
//! use geocoord::options::RequestOptions;
//!
//! let coordinator = Coordinator::new(platform_permissions, platform_sensor);
//!
//! if coordinator.request_permission().await.is_granted() {
//!     let position = coordinator
//!         .get_current_position(RequestOptions::default())
//!         .await?;
//! }
//! ```
//!
//! Platform integrations implement [`permission::PermissionProvider`] and
//! [`sensor::SensorSource`]. [`permission::SimulatedPermissions`] and
//! [`sensor::SimulatedSensor`] stand in for them in tests.

pub mod clock;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod logging;
pub mod options;
pub mod permission;
pub mod position;
pub mod sensor;

pub use coordinator::{Coordinator, Watch, WatchToken};
pub use error::{ErrorKind, LocationError};
pub use options::{MaximumAge, RequestOptions};
pub use position::Position;

/// Version of the geocoord library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
