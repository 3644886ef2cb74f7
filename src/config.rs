//! Multicast control-plane configuration.

/// Default fan-out bound used before any rate-derived bound exists.
pub const DEFAULT_MAX_DEGREE: usize = 2;

/// Default downstream queue capacity, in tuples.
pub const DEFAULT_QUEUE_CAPACITY: f64 = 1024.0;

/// Default warning water line: 90% of the default queue capacity.
pub const DEFAULT_WARNING_WATER_LINE: f64 = 921.0;

/// Default scale-up threshold (relative queue drain per sample period).
pub const DEFAULT_THRESHOLD_UP: f64 = 0.5;

/// Default scale-down threshold (queue growth relative to remaining
/// headroom below the water line).
pub const DEFAULT_THRESHOLD_DOWN: f64 = 0.8;

/// Default per-tuple service time, in seconds.
pub const DEFAULT_TUPLE_PROCESS_TIME: f64 = 0.001;

/// Tunables for tree construction and rate control.
///
/// All values can be overridden through [`MulticastConfig::builder`];
/// out-of-range values are clamped or replaced with the defaults rather
/// than rejected, so a partially misconfigured deployment still runs.
#[derive(Debug, Clone, PartialEq)]
pub struct MulticastConfig {
    /// Fan-out bound applied when no rate-derived bound is available.
    pub max_degree: usize,
    /// Downstream queue capacity, in tuples.
    pub queue_capacity: f64,
    /// Queue length above which a link is considered saturated.
    pub warning_water_line: f64,
    /// Relative drain rate that signals spare capacity (scale-up).
    pub threshold_up: f64,
    /// Growth-to-headroom ratio that signals oversubscription (scale-down).
    pub threshold_down: f64,
    /// Fixed per-tuple service time, in seconds.
    pub tuple_process_time: f64,
}

impl Default for MulticastConfig {
    fn default() -> Self {
        Self {
            max_degree: DEFAULT_MAX_DEGREE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            warning_water_line: DEFAULT_WARNING_WATER_LINE,
            threshold_up: DEFAULT_THRESHOLD_UP,
            threshold_down: DEFAULT_THRESHOLD_DOWN,
            tuple_process_time: DEFAULT_TUPLE_PROCESS_TIME,
        }
    }
}

impl MulticastConfig {
    /// Creates a builder for custom configuration.
    #[must_use]
    pub fn builder() -> MulticastConfigBuilder {
        MulticastConfigBuilder::default()
    }
}

/// Builder for [`MulticastConfig`].
#[derive(Debug, Default)]
pub struct MulticastConfigBuilder {
    max_degree: Option<usize>,
    queue_capacity: Option<f64>,
    warning_water_line: Option<f64>,
    threshold_up: Option<f64>,
    threshold_down: Option<f64>,
    tuple_process_time: Option<f64>,
}

impl MulticastConfigBuilder {
    /// Sets the default fan-out bound (clamped to at least 1).
    #[must_use]
    pub fn max_degree(mut self, degree: usize) -> Self {
        self.max_degree = Some(degree.max(1));
        self
    }

    /// Sets the downstream queue capacity.
    #[must_use]
    pub fn queue_capacity(mut self, capacity: f64) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    /// Sets the warning water line.
    #[must_use]
    pub fn warning_water_line(mut self, water_line: f64) -> Self {
        self.warning_water_line = Some(water_line);
        self
    }

    /// Sets the scale-up threshold.
    #[must_use]
    pub fn threshold_up(mut self, threshold: f64) -> Self {
        self.threshold_up = Some(threshold);
        self
    }

    /// Sets the scale-down threshold.
    #[must_use]
    pub fn threshold_down(mut self, threshold: f64) -> Self {
        self.threshold_down = Some(threshold);
        self
    }

    /// Sets the per-tuple service time in seconds.
    #[must_use]
    pub fn tuple_process_time(mut self, seconds: f64) -> Self {
        self.tuple_process_time = Some(seconds);
        self
    }

    /// Builds the configuration, substituting defaults for unset or
    /// non-finite values.
    #[must_use]
    pub fn build(self) -> MulticastConfig {
        let or_default = |value: Option<f64>, default: f64| match value {
            Some(v) if v.is_finite() && v > 0.0 => v,
            _ => default,
        };
        MulticastConfig {
            max_degree: self.max_degree.unwrap_or(DEFAULT_MAX_DEGREE),
            queue_capacity: or_default(self.queue_capacity, DEFAULT_QUEUE_CAPACITY),
            warning_water_line: or_default(self.warning_water_line, DEFAULT_WARNING_WATER_LINE),
            threshold_up: or_default(self.threshold_up, DEFAULT_THRESHOLD_UP),
            threshold_down: or_default(self.threshold_down, DEFAULT_THRESHOLD_DOWN),
            tuple_process_time: or_default(self.tuple_process_time, DEFAULT_TUPLE_PROCESS_TIME),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MulticastConfig::default();
        assert_eq!(config.max_degree, DEFAULT_MAX_DEGREE);
        assert!((config.queue_capacity - DEFAULT_QUEUE_CAPACITY).abs() < f64::EPSILON);
        assert!((config.threshold_down - DEFAULT_THRESHOLD_DOWN).abs() < f64::EPSILON);
    }

    #[test]
    fn test_builder_overrides() {
        let config = MulticastConfig::builder()
            .max_degree(4)
            .queue_capacity(2048.0)
            .warning_water_line(1843.0)
            .threshold_up(0.3)
            .threshold_down(0.6)
            .tuple_process_time(0.002)
            .build();
        assert_eq!(config.max_degree, 4);
        assert!((config.queue_capacity - 2048.0).abs() < f64::EPSILON);
        assert!((config.warning_water_line - 1843.0).abs() < f64::EPSILON);
        assert!((config.threshold_up - 0.3).abs() < f64::EPSILON);
        assert!((config.threshold_down - 0.6).abs() < f64::EPSILON);
        assert!((config.tuple_process_time - 0.002).abs() < f64::EPSILON);
    }

    #[test]
    fn test_builder_rejects_degenerate_values() {
        let config = MulticastConfig::builder()
            .max_degree(0)
            .queue_capacity(-1.0)
            .threshold_up(f64::NAN)
            .build();
        assert_eq!(config.max_degree, 1);
        assert!((config.queue_capacity - DEFAULT_QUEUE_CAPACITY).abs() < f64::EPSILON);
        assert!((config.threshold_up - DEFAULT_THRESHOLD_UP).abs() < f64::EPSILON);
    }
}
