//! Merging registered request options into one sensor configuration.

use std::time::Duration;

use crate::options::RequestOptions;

/// Interval used when no registered request asks for one.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(1000);

/// The single configuration the sensor runs with.
///
/// Derived from every active request: the most demanding value wins for each
/// field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectiveSensorConfig {
    pub use_high_accuracy: bool,
    /// Meters; 0 delivers every update.
    pub smallest_distance_filter_m: f64,
    pub smallest_interval: Duration,
    pub fastest_interval: Duration,
    pub use_significant_changes: bool,
}

impl EffectiveSensorConfig {
    /// Neutral configuration for an empty registry.
    pub fn low_power() -> Self {
        Self {
            use_high_accuracy: false,
            smallest_distance_filter_m: 0.0,
            smallest_interval: DEFAULT_INTERVAL,
            fastest_interval: DEFAULT_INTERVAL,
            use_significant_changes: false,
        }
    }
}

impl Default for EffectiveSensorConfig {
    fn default() -> Self {
        Self::low_power()
    }
}

/// Combine the options of every active request.
///
/// High accuracy and significant-change monitoring are OR-ed. Distance filter
/// and intervals take the minimum over the requests that specify them;
/// requests that leave a field unset do not constrain it.
pub fn merge<'a, I>(options: I) -> EffectiveSensorConfig
where
    I: IntoIterator<Item = &'a RequestOptions>,
{
    let mut use_high_accuracy = false;
    let mut use_significant_changes = false;
    let mut distance_filter: Option<f64> = None;
    let mut interval: Option<Duration> = None;
    let mut fastest: Option<Duration> = None;

    for opts in options {
        use_high_accuracy |= opts.high_accuracy();
        use_significant_changes |= opts.use_significant_changes();
        distance_filter = min_opt(distance_filter, opts.distance_filter_m(), f64::min);
        interval = min_opt(interval, opts.interval(), Duration::min);
        fastest = min_opt(fastest, opts.fastest_interval(), Duration::min);
    }

    EffectiveSensorConfig {
        use_high_accuracy,
        smallest_distance_filter_m: distance_filter.unwrap_or(0.0),
        smallest_interval: interval.unwrap_or(DEFAULT_INTERVAL),
        fastest_interval: fastest.unwrap_or(DEFAULT_INTERVAL),
        use_significant_changes,
    }
}

fn min_opt<T>(acc: Option<T>, value: Option<T>, min: impl Fn(T, T) -> T) -> Option<T> {
    match (acc, value) {
        (Some(a), Some(v)) => Some(min(a, v)),
        (a, v) => a.or(v),
    }
}
