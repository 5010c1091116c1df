//! Reading quality evaluation.
//!
//! Two pure predicates drive every decision about which reading to use:
//!
//! - [`is_cache_valid`] - is a cached reading fresh enough for a request?
//! - [`is_better`] - should a candidate reading replace the current best?
//!
//! `is_better` follows the well-known Android "best estimate" strategy:
//! recency dominates once readings are two minutes or more apart, accuracy
//! decides inside that window.

use crate::options::MaximumAge;

use super::state::Position;

/// Readings at least this far apart are compared on recency alone.
pub const SIGNIFICANT_TIME_DELTA_MS: i64 = 2 * 60 * 1000;

/// A newer reading may be up to this many meters less precise and still win,
/// provided it comes from the same provider.
pub const SIGNIFICANT_ACCURACY_DELTA_M: f64 = 200.0;

/// Whether `reading` is fresh enough to satisfy a request with `maximum_age`.
///
/// An absent reading is never valid. An infinite maximum age accepts any
/// reading.
pub fn is_cache_valid(reading: Option<&Position>, now_ms: i64, maximum_age: MaximumAge) -> bool {
    let Some(reading) = reading else {
        return false;
    };

    match maximum_age {
        MaximumAge::Infinite => true,
        MaximumAge::Within(max) => {
            let max_ms = i64::try_from(max.as_millis()).unwrap_or(i64::MAX);
            reading.age_ms(now_ms) < max_ms
        }
    }
}

/// Whether `candidate` should replace `current_best`.
pub fn is_better(candidate: &Position, current_best: Option<&Position>) -> bool {
    let Some(best) = current_best else {
        return true;
    };

    let time_delta = candidate.timestamp_ms - best.timestamp_ms;
    if time_delta >= SIGNIFICANT_TIME_DELTA_MS {
        return true;
    }
    if time_delta <= -SIGNIFICANT_TIME_DELTA_MS {
        return false;
    }

    let accuracy_delta = candidate.accuracy - best.accuracy;
    let is_newer = time_delta > 0;
    let is_more_accurate = accuracy_delta < 0.0;
    let is_less_accurate = accuracy_delta > 0.0;
    let is_significantly_less_accurate = accuracy_delta > SIGNIFICANT_ACCURACY_DELTA_M;
    let same_provider = candidate.provider == best.provider;

    if is_more_accurate {
        return true;
    }
    if is_newer && !is_less_accurate {
        return true;
    }
    is_newer && !is_significantly_less_accurate && same_provider
}
