//! Location update coordinator.
//!
//! Multiplexes one-shot requests and watch subscriptions over a single
//! sensor session.
//!
//! # Architecture
//!
//! ```text
//! Coordinator (facade, Clone) ──commands──► CoordinatorDaemon ──start/stop──► SensorSource
//!        │                                   │  RequestRegistry                    │
//!        │                                   │  SessionManager                     │
//!        │                                   │  PositionModel                      │
//!        ◄──── watch: last/best/status ──────┤◄──────── SensorSink events ─────────┘
//!                                            ◄──────── timer expiries
//! ```
//!
//! The daemon is the only writer of the registry and the session; the
//! facade never blocks on it except to await an answer.

mod daemon;
mod facade;
mod logger;
mod registry;
mod session;
mod watch;

pub use daemon::CoordinatorStatus;
pub use facade::{Coordinator, CoordinatorBuilder};
pub use logger::{spawn_position_logger, DEFAULT_LOG_INTERVAL};
pub use registry::{ErrorCallback, LocationResult, UpdateCallback};
pub use session::SessionState;
pub use watch::{Watch, WatchToken};
