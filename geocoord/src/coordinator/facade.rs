//! The public coordinator handle.
//!
//! [`Coordinator`] is a cheap-to-clone handle over the daemon task. Create
//! one per process with [`Coordinator::builder`] and pass clones to whoever
//! needs location.
//!
//! # Usage
//!
//! ```ignore
//! let coordinator = Coordinator::builder(platform_permissions, platform_sensor)
//!     .settings(Settings::default())
//!     .spawn();
//!
//! // One-shot
//! let position = coordinator.get_current_position(RequestOptions::default()).await?;
//!
//! // Continuous
//! let mut watch = coordinator.watch_position(RequestOptions::default());
//! while let Some(update) = watch.next().await {
//!     // Handle update
//! }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

use super::daemon::{Command, CoordinatorDaemon, CoordinatorStatus};
use super::registry::{ErrorCallback, WatchSink};
use super::watch::{Watch, WatchToken};
use crate::clock::{Clock, SystemClock};
use crate::config::Settings;
use crate::error::LocationError;
use crate::options::RequestOptions;
use crate::permission::{PermissionGate, PermissionProvider, PermissionRequest, PermissionStatus};
use crate::position::Position;
use crate::sensor::SensorSource;

/// Builder for [`Coordinator`].
pub struct CoordinatorBuilder {
    permissions: Arc<dyn PermissionProvider>,
    sensor: Arc<dyn SensorSource>,
    settings: Settings,
    clock: Arc<dyn Clock>,
}

impl CoordinatorBuilder {
    /// Initial global settings.
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Clock used for cache freshness checks.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Spawn the daemon task and return the handle.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(self) -> Coordinator {
        let (daemon, handles) = CoordinatorDaemon::new(
            Arc::clone(&self.permissions),
            self.sensor,
            Arc::clone(&self.clock),
            self.settings,
        );

        let shutdown = CancellationToken::new();
        tokio::spawn(daemon.run(shutdown.clone()));

        Coordinator {
            inner: Arc::new(Inner {
                commands: handles.commands,
                gate: PermissionGate::new(self.permissions),
                settings: RwLock::new(self.settings),
                clock: self.clock,
                watches: DashMap::new(),
                next_token: AtomicU64::new(0),
                last_known: handles.last_known,
                best_known: handles.best_known,
                status: handles.status,
                shutdown,
            }),
        }
    }
}

struct Inner {
    commands: mpsc::UnboundedSender<Command>,
    gate: PermissionGate,
    settings: RwLock<Settings>,
    clock: Arc<dyn Clock>,
    /// Cancellation marks for live watches, flipped synchronously on unwatch.
    watches: DashMap<WatchToken, CancellationToken>,
    next_token: AtomicU64,
    last_known: watch::Receiver<Option<Position>>,
    best_known: watch::Receiver<Option<Position>>,
    status: watch::Receiver<CoordinatorStatus>,
    shutdown: CancellationToken,
}

/// Handle to the location coordinator.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

impl Coordinator {
    /// Start building a coordinator over the given platform collaborators.
    pub fn builder<P, S>(permissions: P, sensor: S) -> CoordinatorBuilder
    where
        P: PermissionProvider + 'static,
        S: SensorSource + 'static,
    {
        CoordinatorBuilder {
            permissions: Arc::new(permissions),
            sensor: Arc::new(sensor),
            settings: Settings::default(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Spawn a coordinator with default settings.
    pub fn new<P, S>(permissions: P, sensor: S) -> Self
    where
        P: PermissionProvider + 'static,
        S: SensorSource + 'static,
    {
        Self::builder(permissions, sensor).spawn()
    }

    /// Current permission status. Never prompts.
    pub fn check_permission(&self) -> PermissionStatus {
        self.inner.gate.check()
    }

    /// Ask for location permission.
    ///
    /// Returns at once if the status is already determined. Concurrent
    /// callers share one prompt. A grant starts any session that was
    /// waiting for it; a refusal fails pending requests and reports the
    /// error to watches.
    pub async fn request_permission(&self) -> PermissionStatus {
        let settings = self.settings();
        let request = PermissionRequest {
            level: settings.authorization_level,
            background: settings.enable_background_location_updates,
        };

        let status = self
            .inner
            .gate
            .request(request, settings.skip_permission_requests)
            .await;

        // A refusal has to fail requests that were waiting on the prompt.
        if status != PermissionStatus::Undetermined {
            self.send(Command::PermissionChanged);
        }
        status
    }

    /// Tell the coordinator the platform permission changed outside of
    /// [`Coordinator::request_permission`] (for example in system settings).
    pub fn notify_permission_changed(&self) {
        self.send(Command::PermissionChanged);
    }

    /// Get a single position.
    ///
    /// Fails immediately when permission is denied. Answers from the cache
    /// when the last reading is younger than `options.maximum_age()`.
    /// Otherwise waits for the next reading or the timeout.
    pub async fn get_current_position(
        &self,
        options: RequestOptions,
    ) -> Result<Position, LocationError> {
        match self.check_permission() {
            PermissionStatus::Denied => return Err(LocationError::permission_denied()),
            PermissionStatus::Restricted => return Err(LocationError::permission_restricted()),
            PermissionStatus::Granted | PermissionStatus::Undetermined => {}
        }

        let (reply, rx) = oneshot::channel();
        if !self.send(Command::GetCurrentPosition { options, reply }) {
            return Err(LocationError::coordinator_stopped());
        }

        rx.await
            .unwrap_or_else(|_| Err(LocationError::coordinator_stopped()))
    }

    /// Subscribe to continuous updates.
    pub fn watch_position(&self, options: RequestOptions) -> Watch {
        let (tx, rx) = mpsc::unbounded_channel();
        let (token, cancel) = self.register_watch(options, WatchSink::Channel(tx));
        Watch::new(token, rx, cancel, self.clone())
    }

    /// Subscribe to continuous updates with callbacks.
    ///
    /// Callbacks run on the coordinator task and must not block. Use the
    /// returned token with [`Coordinator::unwatch`].
    pub fn watch_position_with<U, E>(
        &self,
        on_update: U,
        on_error: Option<E>,
        options: RequestOptions,
    ) -> WatchToken
    where
        U: Fn(Position) + Send + Sync + 'static,
        E: Fn(LocationError) + Send + Sync + 'static,
    {
        let sink = WatchSink::Callbacks {
            on_update: Box::new(on_update),
            on_error: on_error.map(|f| Box::new(f) as ErrorCallback),
        };
        self.register_watch(options, sink).0
    }

    /// Remove a watch. Unknown or already removed tokens are ignored.
    pub fn unwatch(&self, token: WatchToken) {
        if let Some((_, cancel)) = self.inner.watches.remove(&token) {
            cancel.cancel();
            self.send(Command::RemoveWatch { token });
        }
    }

    /// Remove every watch. Pending one-shot requests are unaffected.
    pub fn stop_observing(&self) {
        self.inner.watches.retain(|_, cancel| {
            cancel.cancel();
            false
        });
        self.send(Command::StopObserving);
    }

    /// Replace the global settings.
    pub fn set_configuration(&self, settings: Settings) {
        *self
            .inner
            .settings
            .write()
            .unwrap_or_else(PoisonError::into_inner) = settings;
        self.send(Command::SetConfiguration(settings));
    }

    /// Current global settings.
    pub fn settings(&self) -> Settings {
        *self
            .inner
            .settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Current time on the clock used for cache checks, in milliseconds
    /// since the Unix epoch.
    pub fn now_ms(&self) -> i64 {
        self.inner.clock.now_ms()
    }

    /// Most recent reading, however old.
    pub fn last_known_position(&self) -> Option<Position> {
        self.inner.last_known.borrow().clone()
    }

    /// Best reading so far by recency and accuracy.
    pub fn best_known_position(&self) -> Option<Position> {
        self.inner.best_known.borrow().clone()
    }

    /// Current status snapshot.
    pub fn status(&self) -> CoordinatorStatus {
        self.inner.status.borrow().clone()
    }

    /// Receiver that changes whenever the status does.
    pub fn status_receiver(&self) -> watch::Receiver<CoordinatorStatus> {
        self.inner.status.clone()
    }

    /// Stop the daemon. Pending requests fail, watches end.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
    }

    /// Whether [`Coordinator::shutdown`] was called.
    pub fn is_shutdown(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    fn register_watch(
        &self,
        options: RequestOptions,
        sink: WatchSink,
    ) -> (WatchToken, CancellationToken) {
        let token = WatchToken::new(self.inner.next_token.fetch_add(1, Ordering::Relaxed) + 1);
        let cancel = CancellationToken::new();
        self.inner.watches.insert(token, cancel.clone());

        self.send(Command::AddWatch {
            token,
            options,
            sink,
            cancel: cancel.clone(),
        });
        (token, cancel)
    }

    fn send(&self, command: Command) -> bool {
        if self.inner.commands.send(command).is_err() {
            tracing::debug!("Location coordinator is not running, command dropped");
            return false;
        }
        true
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("status", &self.status())
            .field("watches", &self.inner.watches.len())
            .finish()
    }
}
