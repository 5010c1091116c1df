//! Registry of outstanding one-shot requests and watch subscriptions.
//!
//! Owned by the daemon task; nothing else mutates it.

use std::collections::BTreeMap;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use super::watch::WatchToken;
use crate::error::LocationError;
use crate::options::RequestOptions;
use crate::position::Position;

/// Identifier of a pending one-shot request.
pub type RequestId = u64;

/// Result delivered to callers.
pub type LocationResult = Result<Position, LocationError>;

/// Callback invoked with each update.
pub type UpdateCallback = Box<dyn Fn(Position) + Send + Sync>;

/// Callback invoked with each error.
pub type ErrorCallback = Box<dyn Fn(LocationError) + Send + Sync>;

/// A `get_current_position` call waiting for a reading.
pub(crate) struct PendingRequest {
    pub options: RequestOptions,
    reply: oneshot::Sender<LocationResult>,
    timer: CancellationToken,
}

impl PendingRequest {
    pub fn new(
        options: RequestOptions,
        reply: oneshot::Sender<LocationResult>,
        timer: CancellationToken,
    ) -> Self {
        Self {
            options,
            reply,
            timer,
        }
    }

    /// Terminal transition: cancel the timer and answer the caller.
    pub fn resolve(self, result: LocationResult) {
        self.timer.cancel();
        // The caller may have given up; nothing to do then.
        let _ = self.reply.send(result);
    }
}

/// Where a watch's updates go.
pub(crate) enum WatchSink {
    Callbacks {
        on_update: UpdateCallback,
        on_error: Option<ErrorCallback>,
    },
    Channel(mpsc::UnboundedSender<LocationResult>),
}

/// A continuous subscription.
pub(crate) struct WatchSubscription {
    pub options: RequestOptions,
    sink: WatchSink,
    cancel: CancellationToken,
}

impl WatchSubscription {
    pub fn new(options: RequestOptions, sink: WatchSink, cancel: CancellationToken) -> Self {
        Self {
            options,
            sink,
            cancel,
        }
    }

    /// Deliver an update or error unless the watch was cancelled.
    ///
    /// Returns true if the subscriber was invoked.
    pub fn deliver(&self, result: LocationResult) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        match (&self.sink, result) {
            (WatchSink::Callbacks { on_update, .. }, Ok(position)) => on_update(position),
            (WatchSink::Callbacks { on_error, .. }, Err(error)) => match on_error {
                Some(on_error) => on_error(error),
                None => return false,
            },
            (WatchSink::Channel(tx), result) => return tx.send(result).is_ok(),
        }
        true
    }
}

/// All registered requests.
#[derive(Default)]
pub(crate) struct RequestRegistry {
    pending: BTreeMap<RequestId, PendingRequest>,
    watches: BTreeMap<WatchToken, WatchSubscription>,
    next_id: RequestId,
}

impl RequestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pending(&mut self, request: PendingRequest) -> RequestId {
        self.next_id += 1;
        let id = self.next_id;
        self.pending.insert(id, request);
        id
    }

    pub fn add_watch(&mut self, token: WatchToken, subscription: WatchSubscription) {
        self.watches.insert(token, subscription);
    }

    pub fn remove_pending(&mut self, id: RequestId) -> Option<PendingRequest> {
        self.pending.remove(&id)
    }

    pub fn remove_watch(&mut self, token: WatchToken) -> Option<WatchSubscription> {
        self.watches.remove(&token)
    }

    pub fn watch(&self, token: WatchToken) -> Option<&WatchSubscription> {
        self.watches.get(&token)
    }

    /// Options of every pending request and watch.
    pub fn all_active_options(&self) -> impl Iterator<Item = &RequestOptions> {
        self.pending
            .values()
            .map(|p| &p.options)
            .chain(self.watches.values().map(|w| &w.options))
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.watches.is_empty()
    }

    /// Remove every pending request, oldest first.
    pub fn drain_pending(&mut self) -> Vec<PendingRequest> {
        std::mem::take(&mut self.pending).into_values().collect()
    }

    pub fn watches(&self) -> impl Iterator<Item = &WatchSubscription> {
        self.watches.values()
    }

    /// Remove every watch. Returns how many were removed.
    pub fn clear_watches(&mut self) -> usize {
        let count = self.watches.len();
        self.watches.clear();
        count
    }

    /// Number of pending requests and watches.
    pub fn counts(&self) -> (usize, usize) {
        (self.pending.len(), self.watches.len())
    }
}
