//! Position Model - keeps the best reading seen so far.
//!
//! The coordinator hands every sensor reading to the model. The model keeps
//! whichever reading [`is_better`] prefers, so a burst of coarse fixes right
//! after a precise one does not overwrite the precise one until it ages out
//! of the two minute window.
//!
//! This is separate from the last-known reading, which is simply the most
//! recent fix and is what cache checks use.

use super::quality::is_better;
use super::state::Position;

/// Best-known reading according to the recency/accuracy heuristic.
#[derive(Debug, Default)]
pub struct PositionModel {
    best: Option<Position>,
    accepted: u64,
    rejected: u64,
}

impl PositionModel {
    /// Create an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// The best reading so far.
    pub fn best(&self) -> Option<&Position> {
        self.best.as_ref()
    }

    /// Whether `candidate` would replace the current best.
    pub fn should_accept(&self, candidate: &Position) -> bool {
        is_better(candidate, self.best.as_ref())
    }

    /// Offer a reading to the model.
    ///
    /// Returns true if the reading became the new best.
    pub fn apply(&mut self, candidate: Position) -> bool {
        if self.should_accept(&candidate) {
            self.best = Some(candidate);
            self.accepted += 1;
            true
        } else {
            self.rejected += 1;
            false
        }
    }

    /// Number of readings accepted and rejected so far.
    pub fn counts(&self) -> (u64, u64) {
        (self.accepted, self.rejected)
    }
}
