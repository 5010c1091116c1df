//! Coordinator daemon.
//!
//! The [`CoordinatorDaemon`] runs as an independent async task that:
//!
//! 1. Receives commands from the channel (sent by `Coordinator`)
//! 2. Receives readings and faults from the running sensor session
//! 3. Receives expiry notices from one-shot request timers
//! 4. Publishes the last known reading, the best reading and a status
//!    snapshot through `watch` channels
//!
//! # Design Notes
//!
//! The daemon owns the request registry and the sensor session and is their
//! only writer. Every terminal transition of a one-shot request goes through
//! [`RequestRegistry::remove_pending`] or [`RequestRegistry::drain_pending`]
//! on this task, so a timer and a reading racing for the same request can
//! never both answer it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

use super::registry::{
    LocationResult, PendingRequest, RequestId, RequestRegistry, WatchSink, WatchSubscription,
};
use super::session::{SessionManager, SessionState};
use super::watch::WatchToken;
use crate::clock::Clock;
use crate::config::{EffectiveSensorConfig, Settings};
use crate::error::LocationError;
use crate::options::RequestOptions;
use crate::permission::{PermissionProvider, PermissionStatus};
use crate::position::{is_cache_valid, Position, PositionModel};
use crate::sensor::{FaultClass, SensorEvent, SensorEventKind, SensorFault, SensorSource};

/// Requests sent from the facade to the daemon.
pub(crate) enum Command {
    GetCurrentPosition {
        options: RequestOptions,
        reply: oneshot::Sender<LocationResult>,
    },
    AddWatch {
        token: WatchToken,
        options: RequestOptions,
        sink: WatchSink,
        cancel: CancellationToken,
    },
    RemoveWatch {
        token: WatchToken,
    },
    StopObserving,
    PermissionChanged,
    SetConfiguration(Settings),
}

/// Snapshot of the coordinator for observers.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorStatus {
    pub session: SessionState,
    /// Number of sessions started so far.
    pub generation: u64,
    pub pending_requests: usize,
    pub active_watches: usize,
}

impl CoordinatorStatus {
    /// Effective configuration of the running session.
    pub fn effective_config(&self) -> Option<EffectiveSensorConfig> {
        match self.session {
            SessionState::Active { config, .. } => Some(config),
            _ => None,
        }
    }
}

impl Default for CoordinatorStatus {
    fn default() -> Self {
        Self {
            session: SessionState::Idle,
            generation: 0,
            pending_requests: 0,
            active_watches: 0,
        }
    }
}

/// Receiving ends handed to the facade.
pub(crate) struct DaemonHandles {
    pub commands: mpsc::UnboundedSender<Command>,
    pub last_known: watch::Receiver<Option<Position>>,
    pub best_known: watch::Receiver<Option<Position>>,
    pub status: watch::Receiver<CoordinatorStatus>,
}

/// The coordinator daemon.
pub(crate) struct CoordinatorDaemon {
    commands: mpsc::UnboundedReceiver<Command>,
    sensor_events: mpsc::UnboundedReceiver<SensorEvent>,
    timers_tx: mpsc::UnboundedSender<RequestId>,
    timers_rx: mpsc::UnboundedReceiver<RequestId>,

    registry: RequestRegistry,
    session: SessionManager,
    permissions: Arc<dyn PermissionProvider>,
    clock: Arc<dyn Clock>,
    settings: Settings,

    last_known: Option<Position>,
    model: PositionModel,

    last_known_tx: watch::Sender<Option<Position>>,
    best_known_tx: watch::Sender<Option<Position>>,
    status_tx: watch::Sender<CoordinatorStatus>,
}

impl CoordinatorDaemon {
    /// Creates a daemon and the handles the facade talks to it through.
    pub fn new(
        permissions: Arc<dyn PermissionProvider>,
        sensor: Arc<dyn SensorSource>,
        clock: Arc<dyn Clock>,
        settings: Settings,
    ) -> (Self, DaemonHandles) {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (events_tx, sensor_events) = mpsc::unbounded_channel();
        let (timers_tx, timers_rx) = mpsc::unbounded_channel();
        let (last_known_tx, last_known) = watch::channel(None);
        let (best_known_tx, best_known) = watch::channel(None);
        let (status_tx, status) = watch::channel(CoordinatorStatus::default());

        let daemon = Self {
            commands,
            sensor_events,
            timers_tx,
            timers_rx,
            registry: RequestRegistry::new(),
            session: SessionManager::new(sensor, events_tx),
            permissions,
            clock,
            settings,
            last_known: None,
            model: PositionModel::new(),
            last_known_tx,
            best_known_tx,
            status_tx,
        };

        let handles = DaemonHandles {
            commands: commands_tx,
            last_known,
            best_known,
            status,
        };

        (daemon, handles)
    }

    /// Runs the daemon until shutdown is signaled or every facade handle is
    /// dropped.
    pub async fn run(mut self, shutdown: CancellationToken) {
        tracing::info!("Location coordinator starting");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    tracing::info!("Location coordinator shutting down");
                    break;
                }

                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        tracing::debug!("Coordinator handles dropped, stopping");
                        break;
                    }
                },

                Some(event) = self.sensor_events.recv() => {
                    self.handle_sensor_event(event);
                }

                Some(id) = self.timers_rx.recv() => {
                    self.handle_timer(id);
                }
            }

            self.publish_status();
        }

        self.finish();
        tracing::debug!("Location coordinator stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::GetCurrentPosition { options, reply } => {
                self.get_current_position(options, reply);
            }
            Command::AddWatch {
                token,
                options,
                sink,
                cancel,
            } => {
                self.add_watch(token, options, sink, cancel);
            }
            Command::RemoveWatch { token } => {
                if self.registry.remove_watch(token).is_some() {
                    tracing::debug!(token = %token, "Watch removed");
                    self.reconcile();
                }
            }
            Command::StopObserving => {
                let removed = self.registry.clear_watches();
                tracing::debug!(removed, "Stopped observing");
                self.reconcile();
            }
            Command::PermissionChanged => {
                let status = self.permissions.check();
                tracing::info!(status = %status, "Location permission changed");
                if status.is_refused() {
                    self.fail_all(refusal_error(status));
                }
                self.reconcile();
            }
            Command::SetConfiguration(settings) => {
                tracing::debug!(?settings, "Configuration updated");
                self.settings = settings;
                self.reconcile();
            }
        }
    }

    fn get_current_position(
        &mut self,
        options: RequestOptions,
        reply: oneshot::Sender<LocationResult>,
    ) {
        let status = self.permissions.check();
        if status.is_refused() {
            let _ = reply.send(Err(refusal_error(status)));
            return;
        }

        let now_ms = self.clock.now_ms();
        if is_cache_valid(self.last_known.as_ref(), now_ms, options.maximum_age()) {
            if let Some(cached) = &self.last_known {
                tracing::debug!(
                    age_ms = cached.age_ms(now_ms),
                    "Answering position request from cache"
                );
                let _ = reply.send(Ok(cached.clone()));
                return;
            }
        }

        let timeout = options.timeout();
        let timer = CancellationToken::new();
        let id = self
            .registry
            .add_pending(PendingRequest::new(options, reply, timer.clone()));
        self.arm_timer(id, timeout, timer);
        tracing::debug!(
            request_id = id,
            timeout_ms = timeout.as_millis() as u64,
            "Position request registered"
        );

        self.reconcile();
    }

    fn add_watch(
        &mut self,
        token: WatchToken,
        options: RequestOptions,
        sink: WatchSink,
        cancel: CancellationToken,
    ) {
        if cancel.is_cancelled() {
            // Unwatched before the registration got here.
            return;
        }

        self.registry
            .add_watch(token, WatchSubscription::new(options, sink, cancel));
        tracing::debug!(token = %token, "Watch registered");

        let status = self.permissions.check();
        if status.is_refused() {
            if let Some(watch) = self.registry.watch(token) {
                watch.deliver(Err(refusal_error(status)));
            }
        }

        self.reconcile();
    }

    // The timer task only reports expiry; the daemon decides whether the
    // request is still waiting.
    fn arm_timer(&self, id: RequestId, timeout: Duration, timer: CancellationToken) {
        let timers_tx = self.timers_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = timer.cancelled() => {}
                _ = tokio::time::sleep(timeout) => {
                    let _ = timers_tx.send(id);
                }
            }
        });
    }

    fn handle_timer(&mut self, id: RequestId) {
        let Some(request) = self.registry.remove_pending(id) else {
            return;
        };

        let timeout = request.options.timeout();
        tracing::debug!(request_id = id, "Position request timed out");
        request.resolve(Err(LocationError::timeout(timeout)));
        self.reconcile();
    }

    fn handle_sensor_event(&mut self, event: SensorEvent) {
        if !self.session.is_current(event.generation) {
            tracing::trace!(
                generation = event.generation,
                current = self.session.generation(),
                "Discarding event from stale sensor session"
            );
            return;
        }

        match event.kind {
            SensorEventKind::Reading(position) => self.handle_reading(position),
            SensorEventKind::Fault(fault) => self.handle_fault(fault),
        }
    }

    fn handle_reading(&mut self, position: Position) {
        self.last_known = Some(position.clone());
        self.last_known_tx.send_replace(Some(position.clone()));

        if self.model.apply(position.clone()) {
            self.best_known_tx.send_replace(Some(position.clone()));
        }

        let pending = self.registry.drain_pending();
        let resolved = pending.len();
        for request in pending {
            request.resolve(Ok(position.clone()));
        }

        let mut delivered = 0usize;
        for watch in self.registry.watches() {
            if watch.deliver(Ok(position.clone())) {
                delivered += 1;
            }
        }

        tracing::trace!(
            lat = position.latitude,
            lon = position.longitude,
            accuracy_m = position.accuracy,
            resolved,
            delivered,
            "Reading dispatched"
        );

        if resolved > 0 {
            self.reconcile();
        }
    }

    fn handle_fault(&mut self, fault: SensorFault) {
        match fault.classify() {
            FaultClass::Transient => {
                tracing::trace!(fault = %fault, "Transient sensor fault absorbed");
            }
            FaultClass::Fatal(error) => {
                tracing::warn!(fault = %fault, code = error.code(), "Sensor session failed");
                self.fail_all(error);
                // Watches stay registered; the next registry change or
                // permission grant starts a new session.
                self.session.stop();
            }
        }
    }

    /// Reconcile the session with the registry, failing everyone waiting if
    /// the session cannot run.
    fn reconcile(&mut self) {
        let permitted = self.is_permitted();
        let result =
            self.session
                .reconcile(self.registry.all_active_options(), permitted, &self.settings);

        if let Err(error) = result {
            self.fail_all(error);
        }
    }

    fn is_permitted(&self) -> bool {
        match self.permissions.check() {
            PermissionStatus::Granted => true,
            PermissionStatus::Undetermined => self.settings.skip_permission_requests,
            PermissionStatus::Denied | PermissionStatus::Restricted => false,
        }
    }

    /// Reject every pending request and report the error to every watch.
    fn fail_all(&mut self, error: LocationError) {
        for request in self.registry.drain_pending() {
            request.resolve(Err(error.clone()));
        }
        for watch in self.registry.watches() {
            watch.deliver(Err(error.clone()));
        }
    }

    fn publish_status(&self) {
        let (pending_requests, active_watches) = self.registry.counts();
        let status = CoordinatorStatus {
            session: self.session.state(),
            generation: self.session.generation(),
            pending_requests,
            active_watches,
        };
        self.status_tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }

    fn finish(&mut self) {
        self.session.stop();
        for request in self.registry.drain_pending() {
            request.resolve(Err(LocationError::coordinator_stopped()));
        }
        self.registry.clear_watches();
        self.publish_status();
    }
}

fn refusal_error(status: PermissionStatus) -> LocationError {
    match status {
        PermissionStatus::Restricted => LocationError::permission_restricted(),
        _ => LocationError::permission_denied(),
    }
}

impl std::fmt::Debug for CoordinatorDaemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (pending, watches) = self.registry.counts();
        f.debug_struct("CoordinatorDaemon")
            .field("session", &self.session.state())
            .field("pending", &pending)
            .field("watches", &watches)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
