//! Watch subscriptions handed to callers.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::facade::Coordinator;
use super::registry::LocationResult;

/// Identifies a watch subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WatchToken(u64);

impl WatchToken {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for WatchToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "watch-{}", self.0)
    }
}

/// A stream of updates for one watch.
///
/// Dropping the handle unsubscribes.
///
/// ```ignore
/// let mut watch = coordinator.watch_position(options);
/// while let Some(update) = watch.next().await {
///     match update {
///         Ok(position) => println!("{}, {}", position.latitude, position.longitude),
///         Err(e) => eprintln!("{e}"),
///     }
/// }
/// ```
pub struct Watch {
    token: WatchToken,
    rx: mpsc::UnboundedReceiver<LocationResult>,
    cancel: CancellationToken,
    coordinator: Coordinator,
}

impl Watch {
    pub(crate) fn new(
        token: WatchToken,
        rx: mpsc::UnboundedReceiver<LocationResult>,
        cancel: CancellationToken,
        coordinator: Coordinator,
    ) -> Self {
        Self {
            token,
            rx,
            cancel,
            coordinator,
        }
    }

    pub fn token(&self) -> WatchToken {
        self.token
    }

    /// Next update or error. `None` once unsubscribed or the coordinator
    /// has shut down.
    pub async fn next(&mut self) -> Option<LocationResult> {
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            item = self.rx.recv() => item,
        }
    }

    /// Next item if one is already queued.
    pub fn try_next(&mut self) -> Option<LocationResult> {
        if self.cancel.is_cancelled() {
            return None;
        }
        self.rx.try_recv().ok()
    }

    /// Stop receiving updates. Idempotent.
    pub fn unsubscribe(&self) {
        self.coordinator.unwatch(self.token);
    }

    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled()
    }
}

impl Drop for Watch {
    fn drop(&mut self) {
        self.coordinator.unwatch(self.token);
    }
}

impl std::fmt::Debug for Watch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watch")
            .field("token", &self.token)
            .field("active", &self.is_active())
            .finish()
    }
}
