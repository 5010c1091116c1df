//! In-process sensor for tests and hosts without a location driver.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{SensorFault, SensorSink, SensorSource, SessionRequest};
use crate::error::SensorError;
use crate::position::{Position, ProviderAvailability};

#[derive(Debug)]
struct State {
    availability: ProviderAvailability,
    session: Option<(SessionRequest, SensorSink)>,
    started: Vec<SessionRequest>,
    stops: u32,
    fail_next_start: Option<SensorError>,
}

/// Scriptable [`SensorSource`].
///
/// Clones share state. Readings pushed while no session runs are dropped,
/// like a real driver that has been stopped.
#[derive(Debug, Clone)]
pub struct SimulatedSensor {
    state: Arc<Mutex<State>>,
}

impl Default for SimulatedSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedSensor {
    /// A sensor with both providers available.
    pub fn new() -> Self {
        Self::with_availability(ProviderAvailability::ALL)
    }

    pub fn with_availability(availability: ProviderAvailability) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                availability,
                session: None,
                started: Vec::new(),
                stops: 0,
                fail_next_start: None,
            })),
        }
    }

    /// Deliver a reading to the running session.
    ///
    /// Returns false if no session is running.
    pub fn push_reading(&self, position: Position) -> bool {
        match self.current_sink() {
            Some(sink) => sink.reading(position),
            None => false,
        }
    }

    /// Report a fault on the running session.
    pub fn push_fault(&self, fault: SensorFault) -> bool {
        match self.current_sink() {
            Some(sink) => sink.fault(fault),
            None => false,
        }
    }

    pub fn set_availability(&self, availability: ProviderAvailability) {
        self.lock().availability = availability;
    }

    /// Make the next `start` fail with `error`.
    pub fn fail_next_start(&self, error: SensorError) {
        self.lock().fail_next_start = Some(error);
    }

    pub fn is_running(&self) -> bool {
        self.lock().session.is_some()
    }

    /// Request of the running session.
    pub fn current_session(&self) -> Option<SessionRequest> {
        self.lock().session.as_ref().map(|(request, _)| *request)
    }

    /// Sink of the running session.
    pub fn current_sink(&self) -> Option<SensorSink> {
        self.lock().session.as_ref().map(|(_, sink)| sink.clone())
    }

    /// Every successfully started session, oldest first.
    pub fn started_sessions(&self) -> Vec<SessionRequest> {
        self.lock().started.clone()
    }

    pub fn start_count(&self) -> usize {
        self.lock().started.len()
    }

    pub fn stop_count(&self) -> u32 {
        self.lock().stops
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SensorSource for SimulatedSensor {
    fn availability(&self) -> ProviderAvailability {
        self.lock().availability
    }

    fn start(&self, request: SessionRequest, sink: SensorSink) -> Result<(), SensorError> {
        let mut state = self.lock();
        if let Some(error) = state.fail_next_start.take() {
            return Err(error);
        }
        if !state.availability.is_available(request.provider) {
            return Err(SensorError::ProviderUnavailable(request.provider.to_string()));
        }
        state.session = Some((request, sink));
        state.started.push(request);
        Ok(())
    }

    fn stop(&self) {
        let mut state = self.lock();
        if state.session.take().is_some() {
            state.stops += 1;
        }
    }
}
