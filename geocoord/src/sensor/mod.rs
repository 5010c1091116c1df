//! Sensor seam.
//!
//! A [`SensorSource`] wraps the platform location driver. The coordinator's
//! session manager is its only caller: it starts one session at a time with
//! a [`SessionRequest`] and a [`SensorSink`], and the driver pushes readings
//! and faults into the sink from whatever thread it likes.
//!
//! Some faults are expected and absorbed; the rest end the session (see
//! [`SensorFault::classify`]).

mod fault;
mod simulated;

use tokio::sync::mpsc;

use crate::config::{EffectiveSensorConfig, LocationBackend};
use crate::error::SensorError;
use crate::position::{Position, Provider, ProviderAvailability};

pub use fault::{FaultClass, SensorFault};
pub use simulated::SimulatedSensor;

/// Everything a driver needs to start a session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionRequest {
    pub config: EffectiveSensorConfig,
    pub provider: Provider,
    pub backend: LocationBackend,
    /// Keep delivering while the host app is in the background.
    pub background: bool,
}

/// Platform location driver.
pub trait SensorSource: Send + Sync {
    /// Which providers can be used right now.
    fn availability(&self) -> ProviderAvailability;

    /// Begin delivering readings into `sink`.
    ///
    /// Called at most once without an intervening [`SensorSource::stop`].
    fn start(&self, request: SessionRequest, sink: SensorSink) -> Result<(), SensorError>;

    /// End the current session. A no-op when nothing is running.
    fn stop(&self);
}

/// Something the driver reported.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorEventKind {
    Reading(Position),
    Fault(SensorFault),
}

/// A driver report tagged with the session it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorEvent {
    pub generation: u64,
    pub kind: SensorEventKind,
}

/// Where a driver delivers readings and faults.
///
/// Cheap to clone and safe to call from any thread. Events sent after the
/// session ended are discarded by the coordinator.
#[derive(Debug, Clone)]
pub struct SensorSink {
    generation: u64,
    tx: mpsc::UnboundedSender<SensorEvent>,
}

impl SensorSink {
    pub(crate) fn new(generation: u64, tx: mpsc::UnboundedSender<SensorEvent>) -> Self {
        Self { generation, tx }
    }

    /// Session this sink belongs to.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Deliver a reading. Returns false if the coordinator is gone.
    pub fn reading(&self, position: Position) -> bool {
        self.send(SensorEventKind::Reading(position))
    }

    /// Report a fault. Returns false if the coordinator is gone.
    pub fn fault(&self, fault: SensorFault) -> bool {
        self.send(SensorEventKind::Fault(fault))
    }

    fn send(&self, kind: SensorEventKind) -> bool {
        self.tx
            .send(SensorEvent {
                generation: self.generation,
                kind,
            })
            .is_ok()
    }
}
