//! Sensor session state machine.
//!
//! ```text
//!            registry non-empty + permitted
//!   Idle ──────────────────────────────────► Starting ──start ok──► Active
//!    ▲                                          │                     │
//!    │                start failed              │                     │ config or
//!    ◄──────────────────────────────────────────┘                     │ provider changed:
//!    │                                                                │ stop, then start
//!    └──── Stopping ◄── empty registry / fatal fault / not permitted ─┘
//! ```
//!
//! Every start gets a new generation number; sensor events tagged with an
//! older generation, or arriving while no session is active, are stale.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::{merge, select_provider, EffectiveSensorConfig, Settings};
use crate::error::LocationError;
use crate::options::RequestOptions;
use crate::position::Provider;
use crate::sensor::{SensorEvent, SensorSink, SensorSource, SessionRequest};

/// Where the sensor session is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionState {
    Idle,
    Starting,
    Active {
        config: EffectiveSensorConfig,
        provider: Provider,
    },
    Stopping,
}

impl SessionState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }
}

/// Drives the [`SensorSource`]. Only the daemon calls into it.
pub(crate) struct SessionManager {
    sensor: Arc<dyn SensorSource>,
    events_tx: mpsc::UnboundedSender<SensorEvent>,
    state: SessionState,
    running: Option<SessionRequest>,
    generation: u64,
}

impl SessionManager {
    pub fn new(sensor: Arc<dyn SensorSource>, events_tx: mpsc::UnboundedSender<SensorEvent>) -> Self {
        Self {
            sensor,
            events_tx,
            state: SessionState::Idle,
            running: None,
            generation: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether an event from `generation` belongs to the running session.
    pub fn is_current(&self, generation: u64) -> bool {
        self.state.is_active() && generation == self.generation
    }

    /// Bring the session in line with the active request set.
    ///
    /// Stops when nothing is registered or `permitted` is false. Otherwise
    /// merges the options, picks a provider and (re)starts if the result
    /// differs from what is running. Fails when no provider is usable or the
    /// sensor refuses to start; the session is left idle in both cases.
    pub fn reconcile<'a>(
        &mut self,
        options: impl IntoIterator<Item = &'a RequestOptions>,
        permitted: bool,
        settings: &Settings,
    ) -> Result<(), LocationError> {
        let options: Vec<&RequestOptions> = options.into_iter().collect();
        if options.is_empty() || !permitted {
            self.stop();
            return Ok(());
        }

        let config = merge(options);
        let Some(provider) = select_provider(config.use_high_accuracy, self.sensor.availability())
        else {
            tracing::warn!(
                high_accuracy = config.use_high_accuracy,
                "No location provider available"
            );
            self.stop();
            return Err(LocationError::no_provider());
        };

        let request = SessionRequest {
            config,
            provider,
            backend: settings.location_backend,
            background: settings.enable_background_location_updates,
        };
        if self.running == Some(request) {
            return Ok(());
        }

        if self.running.is_some() {
            tracing::debug!(provider = %provider, "Sensor configuration changed, restarting session");
        }
        self.stop();
        self.start(request)
    }

    /// Stop the running session, if any.
    pub fn stop(&mut self) {
        if self.running.is_none() && !matches!(self.state, SessionState::Starting) {
            self.state = SessionState::Idle;
            return;
        }

        self.state = SessionState::Stopping;
        self.sensor.stop();
        self.running = None;
        self.state = SessionState::Idle;
        tracing::info!(generation = self.generation, "Sensor session stopped");
    }

    fn start(&mut self, request: SessionRequest) -> Result<(), LocationError> {
        self.generation += 1;
        self.state = SessionState::Starting;
        let sink = SensorSink::new(self.generation, self.events_tx.clone());

        match self.sensor.start(request, sink) {
            Ok(()) => {
                self.running = Some(request);
                self.state = SessionState::Active {
                    config: request.config,
                    provider: request.provider,
                };
                tracing::info!(
                    provider = %request.provider,
                    generation = self.generation,
                    high_accuracy = request.config.use_high_accuracy,
                    distance_filter_m = request.config.smallest_distance_filter_m,
                    interval_ms = request.config.smallest_interval.as_millis() as u64,
                    "Sensor session started"
                );
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Idle;
                tracing::warn!(provider = %request.provider, error = %e, "Failed to start sensor session");
                Err(e.into())
            }
        }
    }
}
