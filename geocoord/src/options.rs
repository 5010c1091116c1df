//! Per-request options.
//!
//! [`RequestOptions`] is the validated form every coordinator operation
//! takes. It is produced either by [`RequestOptionsBuilder`] or from the
//! loosely-typed [`RawRequestOptions`] bag a binding layer deserializes, and
//! is never re-validated afterwards.
//!
//! ```ignore
//! let options = RequestOptions::builder()
//!     .high_accuracy(true)
//!     .timeout(Duration::from_secs(15))
//!     .maximum_age(MaximumAge::Within(Duration::from_secs(5)))
//!     .build()?;
//! ```

use std::time::Duration;

use serde::Deserialize;

use crate::error::OptionsError;

/// Default request timeout (10 minutes).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(600_000);

/// How old a cached reading may be and still satisfy a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaximumAge {
    /// Accept a cached reading strictly younger than this.
    Within(Duration),
    /// Accept any cached reading.
    Infinite,
}

impl MaximumAge {
    /// Always require a fresh reading.
    pub const ZERO: Self = Self::Within(Duration::ZERO);

    /// Parse a millisecond value where `+inf` means [`MaximumAge::Infinite`].
    pub fn from_millis_f64(value: f64) -> Result<Self, OptionsError> {
        if value == f64::INFINITY {
            return Ok(Self::Infinite);
        }
        parse_millis("maximumAge", value).map(Self::Within)
    }
}

impl Default for MaximumAge {
    fn default() -> Self {
        Self::Infinite
    }
}

/// Validated options for a one-shot request or a watch.
///
/// `interval`, `fastest_interval` and `distance_filter_m` are `None` when the
/// caller did not ask for a specific value; the configuration merger then
/// lets other requests decide.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOptions {
    timeout: Duration,
    maximum_age: MaximumAge,
    high_accuracy: bool,
    interval: Option<Duration>,
    fastest_interval: Option<Duration>,
    distance_filter_m: Option<f64>,
    use_significant_changes: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            maximum_age: MaximumAge::Infinite,
            high_accuracy: false,
            interval: None,
            fastest_interval: None,
            distance_filter_m: None,
            use_significant_changes: false,
        }
    }
}

impl RequestOptions {
    /// Start building options from the defaults.
    pub fn builder() -> RequestOptionsBuilder {
        RequestOptionsBuilder::default()
    }

    /// Time allowed before a one-shot request fails with a timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Cache freshness tolerance.
    pub fn maximum_age(&self) -> MaximumAge {
        self.maximum_age
    }

    /// Whether the caller wants the high-accuracy provider.
    pub fn high_accuracy(&self) -> bool {
        self.high_accuracy
    }

    /// Desired update interval.
    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Fastest update interval the caller can handle.
    pub fn fastest_interval(&self) -> Option<Duration> {
        self.fastest_interval
    }

    /// Minimum movement in meters before an update is delivered.
    pub fn distance_filter_m(&self) -> Option<f64> {
        self.distance_filter_m
    }

    /// Whether the caller is satisfied with significant-change monitoring.
    pub fn use_significant_changes(&self) -> bool {
        self.use_significant_changes
    }
}

/// Builder for [`RequestOptions`].
#[derive(Debug, Clone, Default)]
pub struct RequestOptionsBuilder {
    options: RequestOptions,
}

impl RequestOptionsBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = timeout;
        self
    }

    pub fn maximum_age(mut self, maximum_age: MaximumAge) -> Self {
        self.options.maximum_age = maximum_age;
        self
    }

    pub fn high_accuracy(mut self, high_accuracy: bool) -> Self {
        self.options.high_accuracy = high_accuracy;
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.options.interval = Some(interval);
        self
    }

    pub fn fastest_interval(mut self, fastest_interval: Duration) -> Self {
        self.options.fastest_interval = Some(fastest_interval);
        self
    }

    pub fn distance_filter_m(mut self, meters: f64) -> Self {
        self.options.distance_filter_m = Some(meters);
        self
    }

    pub fn use_significant_changes(mut self, enabled: bool) -> Self {
        self.options.use_significant_changes = enabled;
        self
    }

    /// Validate and return the options.
    pub fn build(self) -> Result<RequestOptions, OptionsError> {
        let options = self.options;

        if let Some(meters) = options.distance_filter_m {
            if meters.is_nan() || meters < 0.0 {
                return Err(OptionsError::InvalidDistanceFilter(meters));
            }
        }

        if let (Some(fastest), Some(interval)) = (options.fastest_interval, options.interval) {
            if fastest > interval {
                return Err(OptionsError::FastestIntervalTooLong {
                    fastest_ms: fastest.as_millis(),
                    interval_ms: interval.as_millis(),
                });
            }
        }

        Ok(options)
    }
}

/// Options as they arrive from a binding layer: every field optional,
/// durations in (possibly fractional or infinite) milliseconds.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawRequestOptions {
    pub timeout: Option<f64>,
    pub maximum_age: Option<f64>,
    pub enable_high_accuracy: Option<bool>,
    pub interval: Option<f64>,
    pub fastest_interval: Option<f64>,
    pub distance_filter: Option<f64>,
    pub use_significant_changes: Option<bool>,
}

impl TryFrom<RawRequestOptions> for RequestOptions {
    type Error = OptionsError;

    fn try_from(raw: RawRequestOptions) -> Result<Self, Self::Error> {
        let mut builder = RequestOptions::builder();

        if let Some(timeout) = raw.timeout {
            // An infinite timeout is clamped to the default, like the native modules do.
            let timeout = if timeout == f64::INFINITY {
                DEFAULT_TIMEOUT
            } else {
                parse_millis("timeout", timeout)?
            };
            builder = builder.timeout(timeout);
        }
        if let Some(maximum_age) = raw.maximum_age {
            builder = builder.maximum_age(MaximumAge::from_millis_f64(maximum_age)?);
        }
        if let Some(high_accuracy) = raw.enable_high_accuracy {
            builder = builder.high_accuracy(high_accuracy);
        }
        if let Some(interval) = raw.interval {
            builder = builder.interval(parse_millis("interval", interval)?);
        }
        if let Some(fastest) = raw.fastest_interval {
            builder = builder.fastest_interval(parse_millis("fastestInterval", fastest)?);
        }
        if let Some(meters) = raw.distance_filter {
            builder = builder.distance_filter_m(meters);
        }
        if let Some(enabled) = raw.use_significant_changes {
            builder = builder.use_significant_changes(enabled);
        }

        builder.build()
    }
}

fn parse_millis(field: &'static str, value: f64) -> Result<Duration, OptionsError> {
    if !value.is_finite() || value < 0.0 {
        return Err(OptionsError::InvalidDuration { field, value });
    }
    Ok(Duration::from_secs_f64(value / 1000.0))
}
