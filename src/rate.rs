//! Rate-driven degree bound derivation and scale decisions.
//!
//! [`RateController`] turns externally supplied telemetry (input rate,
//! queue-length samples) into control decisions: the largest safe fan-out
//! per tree node, and whether the tree should be rebalanced. It performs
//! no sampling of its own; the engine's control channel feeds it and
//! serializes decisions (one reconfiguration per tree snapshot).

use serde::{Deserialize, Serialize};

use crate::config::MulticastConfig;

/// Errors produced by the rate controller.
#[derive(Debug, thiserror::Error)]
pub enum RateError {
    /// The input rate was zero, negative, or non-finite, which makes the
    /// queueing bound ill-defined.
    #[error("degenerate input rate: {0}")]
    DegenerateRate(f64),

    /// The configured queue capacity was zero, negative, non-finite, or
    /// large enough that the queueing bound cannot be evaluated in f64.
    #[error("degenerate queue capacity: {0}")]
    DegenerateCapacity(f64),
}

/// Direction of a scale decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScaleDirection {
    /// Grow the degree bound (spare capacity exists downstream).
    #[serde(rename = "scale-up")]
    Up,
    /// Shrink the degree bound (current fan-out oversubscribes a link).
    #[serde(rename = "scale-down")]
    Down,
    /// No change.
    #[default]
    None,
}

/// Derives safe degree bounds and scale directions from telemetry.
#[derive(Debug, Clone)]
pub struct RateController {
    config: MulticastConfig,
}

impl RateController {
    /// Creates a controller over the given tunables.
    #[must_use]
    pub fn new(config: MulticastConfig) -> Self {
        Self { config }
    }

    /// Returns the configured tunables.
    #[must_use]
    pub fn config(&self) -> &MulticastConfig {
        &self.config
    }

    /// Computes the largest degree at which a downstream queue of the
    /// configured capacity does not overflow under Poisson-like arrivals
    /// at `input_rate` and the configured per-tuple service time:
    ///
    /// ```text
    /// critical = 2c / ( t * ( r*c + r - sqrt(r^2*c^2 + r^2) ) )
    /// ```
    ///
    /// The result is `floor(critical)` and is non-increasing in
    /// `input_rate` for a fixed capacity.
    ///
    /// # Errors
    ///
    /// Returns [`RateError::DegenerateRate`] when `input_rate <= 0` or is
    /// non-finite (the closed form divides by a term that vanishes there),
    /// and [`RateError::DegenerateCapacity`] for a non-positive capacity or
    /// one so large that `sqrt(r^2*c^2 + r^2)` rounds to `r*c + r` and the
    /// denominator cancels to zero. Callers typically fall back to the
    /// configured default bound.
    pub fn compute_max_out_degree(&self, input_rate: f64) -> Result<usize, RateError> {
        let capacity = self.config.queue_capacity;
        if !capacity.is_finite() || capacity <= 0.0 {
            return Err(RateError::DegenerateCapacity(capacity));
        }
        if !input_rate.is_finite() || input_rate <= 0.0 {
            return Err(RateError::DegenerateRate(input_rate));
        }

        let r = input_rate;
        let c = capacity;
        let t = self.config.tuple_process_time;
        let radicand = r * r * c * c + r * r;
        // Cancels catastrophically once c is large enough for the sqrt to
        // round to r*c + r; the rate itself is fine there.
        let denominator = t * (r * c + r - radicand.sqrt());
        if !denominator.is_finite() || denominator <= 0.0 {
            return Err(RateError::DegenerateCapacity(capacity));
        }
        let critical = 2.0 * c / denominator;
        if !critical.is_finite() {
            return Err(RateError::DegenerateCapacity(capacity));
        }
        // Bounded by the check above; fractional part is discarded on purpose.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Ok(critical.floor() as usize)
    }

    /// Decides scale direction from two consecutive queue-length samples.
    ///
    /// A queue rising fast relative to its remaining headroom below the
    /// warning water line signals scale-down; a queue draining fast
    /// relative to its previous length signals scale-up. Everything else
    /// is no-signal, including a flat queue and a `prev == 0` drain.
    #[must_use]
    pub fn decide_scale(&self, prev_queue_len: f64, curr_queue_len: f64) -> ScaleDirection {
        let water_line = self.config.warning_water_line;
        if curr_queue_len > prev_queue_len {
            // At or above the water line there is no headroom left.
            if curr_queue_len >= water_line {
                return ScaleDirection::Down;
            }
            let growth = (curr_queue_len - prev_queue_len) / (water_line - curr_queue_len);
            if growth > self.config.threshold_down {
                return ScaleDirection::Down;
            }
        } else if curr_queue_len < prev_queue_len && prev_queue_len > 0.0 {
            let drain = (prev_queue_len - curr_queue_len) / prev_queue_len;
            if drain > self.config.threshold_up {
                return ScaleDirection::Up;
            }
        }
        ScaleDirection::None
    }
}

/// Two-sample queue-length window feeding [`RateController::decide_scale`].
///
/// The engine's control timer pushes one sample per period; the first
/// sample alone never produces a signal.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueTrend {
    prev: Option<f64>,
}

impl QueueTrend {
    /// Creates an empty window.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a sample and returns the decision against the previous one.
    pub fn observe(&mut self, controller: &RateController, queue_len: f64) -> ScaleDirection {
        let direction = match self.prev {
            Some(prev) => controller.decide_scale(prev, queue_len),
            None => ScaleDirection::None,
        };
        self.prev = Some(queue_len);
        direction
    }

    /// Clears the window, e.g. after a reconfiguration has been applied.
    pub fn reset(&mut self) {
        self.prev = None;
    }
}
