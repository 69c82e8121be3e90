//! Turns a noisy per-tick similarity signal into discrete events.
//!
//! [`StabilityTracker`] compares each [`StabilitySample`] with the previous
//! one through a [`SimilarityEstimator`].  A delta under the threshold counts
//! as a stable tick; once enough stable ticks accumulate it reports a single
//! [`Observation::Trigger`] and starts counting again from zero.  Any delta
//! at or above the threshold resets the count.

// ---------------------------------------------------------------------------
// Samples and state
// ---------------------------------------------------------------------------

/// One stability sample: when it was taken and how large the encoded frame
/// was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StabilitySample {
    pub timestamp_ms: u64,
    pub size_bytes: u64,
}

impl StabilitySample {
    pub fn new(timestamp_ms: u64, size_bytes: u64) -> Self {
        Self {
            timestamp_ms,
            size_bytes,
        }
    }
}

/// Only the most recent sample is retained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StabilityState {
    pub last_sample: Option<StabilitySample>,
    pub consecutive_stable_ticks: u32,
}

// ---------------------------------------------------------------------------
// SimilarityEstimator
// ---------------------------------------------------------------------------

/// Measures how different two consecutive samples are, as a relative delta
/// (0.0 = identical).
pub trait SimilarityEstimator: Send + Sync {
    fn relative_delta(&self, previous: &StabilitySample, current: &StabilitySample) -> f64;
}

/// `|current - previous| / previous` over encoded frame sizes.
///
/// Similar-looking frames compress to similar sizes, so this is a coarse
/// but cheap proxy for "the camera has not moved".
#[derive(Debug, Clone, Copy, Default)]
pub struct ByteSizeEstimator;

impl SimilarityEstimator for ByteSizeEstimator {
    fn relative_delta(&self, previous: &StabilitySample, current: &StabilitySample) -> f64 {
        let prev = previous.size_bytes as f64;
        let curr = current.size_bytes as f64;
        if previous.size_bytes == 0 {
            return if current.size_bytes == 0 { 0.0 } else { f64::INFINITY };
        }
        (curr - prev).abs() / prev
    }
}

// ---------------------------------------------------------------------------
// StabilityTracker
// ---------------------------------------------------------------------------

/// Result of feeding one sample to [`StabilityTracker::observe`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Observation {
    /// Nothing to compare against yet.
    First,
    /// Stable, but not for long enough.
    Settling { stable_ticks: u32 },
    /// The required number of stable ticks was just reached.
    Trigger,
    /// The scene changed.
    Moved { delta: f64 },
}

pub struct StabilityTracker {
    estimator: Box<dyn SimilarityEstimator>,
    state: StabilityState,
    threshold: f64,
    required_ticks: u32,
}

impl StabilityTracker {
    /// Byte-size tracker.  `required_ticks` below 1 is treated as 1.
    pub fn new(threshold: f64, required_ticks: u32) -> Self {
        Self::with_estimator(Box::new(ByteSizeEstimator), threshold, required_ticks)
    }

    pub fn with_estimator(
        estimator: Box<dyn SimilarityEstimator>,
        threshold: f64,
        required_ticks: u32,
    ) -> Self {
        Self {
            estimator,
            state: StabilityState::default(),
            threshold,
            required_ticks: required_ticks.max(1),
        }
    }

    /// Feed the next sample.
    pub fn observe(&mut self, sample: StabilitySample) -> Observation {
        let Some(previous) = self.state.last_sample.replace(sample) else {
            return Observation::First;
        };

        let delta = self.estimator.relative_delta(&previous, &sample);
        if delta < self.threshold {
            self.state.consecutive_stable_ticks += 1;
            if self.state.consecutive_stable_ticks >= self.required_ticks {
                self.state.consecutive_stable_ticks = 0;
                Observation::Trigger
            } else {
                Observation::Settling {
                    stable_ticks: self.state.consecutive_stable_ticks,
                }
            }
        } else {
            self.state.consecutive_stable_ticks = 0;
            Observation::Moved { delta }
        }
    }

    /// Feed a sample taken while a session is running.
    ///
    /// Only movement matters here: returns the delta when the scene moved,
    /// and never counts towards a trigger.
    pub fn observe_movement(&mut self, sample: StabilitySample) -> Option<f64> {
        let previous = self.state.last_sample.replace(sample)?;
        let delta = self.estimator.relative_delta(&previous, &sample);
        if delta >= self.threshold {
            self.state.consecutive_stable_ticks = 0;
            Some(delta)
        } else {
            None
        }
    }

    /// Start counting stable ticks from zero.  The last sample is kept.
    pub fn reset_counter(&mut self) {
        self.state.consecutive_stable_ticks = 0;
    }

    pub fn state(&self) -> &StabilityState {
        &self.state
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
