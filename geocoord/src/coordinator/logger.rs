//! Periodic position logging.
//!
//! A background task that logs the last known reading and the session state
//! at regular intervals, useful when diagnosing why a host is not getting
//! updates.
//!
//! # Usage
//!
//! ```ignore
//! let cancellation = CancellationToken::new();
//! if tracing::enabled!(tracing::Level::DEBUG) {
//!     spawn_position_logger(coordinator.clone(), cancellation.clone(), DEFAULT_LOG_INTERVAL);
//! }
//! ```
//!
//! # Output Format
//!
//! Logs are emitted at DEBUG level with structured fields:
//! - `lat`, `lon` - Position in decimal degrees
//! - `accuracy_m` - Horizontal accuracy in meters
//! - `age_s` - Seconds since the fix was taken
//! - `provider` - Provider that produced the fix, if known
//! - `session` - Session state
//! - `pending`, `watches` - Registered request counts

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::facade::Coordinator;
use super::session::SessionState;
use crate::position::Position;

/// Default logging interval (20 seconds).
pub const DEFAULT_LOG_INTERVAL: Duration = Duration::from_secs(20);

/// Spawns a background task that periodically logs the coordinator state.
///
/// Stops when `cancellation` is triggered or the coordinator shuts down.
pub fn spawn_position_logger(
    coordinator: Coordinator,
    cancellation: CancellationToken,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if coordinator.is_shutdown() {
                        break;
                    }
                    log_position(&coordinator);
                }
                _ = cancellation.cancelled() => {
                    break;
                }
            }
        }
        tracing::debug!("Position logger stopped");
    })
}

fn log_position(coordinator: &Coordinator) {
    let status = coordinator.status();
    let session = session_label(&status.session);

    match coordinator.last_known_position() {
        Some(position) => {
            let age_ms = position_age_ms(coordinator, &position);
            tracing::debug!(
                lat = format!("{:.5}", position.latitude),
                lon = format!("{:.5}", position.longitude),
                accuracy_m = format!("{:.0}", position.accuracy),
                age_s = format!("{:.1}", age_ms as f64 / 1000.0),
                provider = ?position.provider,
                session = %session,
                pending = status.pending_requests,
                watches = status.active_watches,
                "Location update"
            );
        }
        None => {
            tracing::debug!(
                session = %session,
                pending = status.pending_requests,
                watches = status.active_watches,
                "Location update (no position data)"
            );
        }
    }
}

fn position_age_ms(coordinator: &Coordinator, position: &Position) -> i64 {
    coordinator.now_ms() - position.timestamp_ms
}

/// Short label for a session state, e.g. "active(gps)".
fn session_label(state: &SessionState) -> String {
    match state {
        SessionState::Idle => "idle".to_string(),
        SessionState::Starting => "starting".to_string(),
        SessionState::Active { provider, .. } => format!("active({provider})"),
        SessionState::Stopping => "stopping".to_string(),
    }
}
