//! Frame-time statistics.
//!
//! Turns a stream of frame timestamps into a smoothed frames-per-second
//! value. Inter-frame durations go into a fixed 60-slot circular window;
//! the window mean gives an instantaneous rate, which is folded into an
//! exponential moving average (α = 0.1).
//!
//! Deltas below the 8 ms noise floor are dropped. The polling signal
//! source can emit overlapping ticks, and keeping them would report
//! implausibly high rates.

use std::time::{Duration, Instant};

/// Number of samples in the frame-time window.
pub const WINDOW_CAPACITY: usize = 60;

/// Deltas are clamped to at least this value.
pub const MIN_FRAME_TIME: Duration = Duration::from_millis(1);

/// Deltas shorter than this are discarded (apparent rate above ~125).
pub const NOISE_FLOOR: Duration = Duration::from_millis(8);

/// Lower bound of the published rate.
pub const MIN_RATE: f64 = 0.1;

/// Upper bound of the published rate.
pub const MAX_RATE: f64 = 9999.0;

const SMOOTHING: f64 = 0.1;

/// What happened to a recorded tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// First tick; only establishes the baseline timestamp.
    Baseline,
    /// Delta was under the noise floor and was dropped.
    Discarded,
    /// Delta was stored and the smoothed rate updated.
    Recorded,
}

/// Smoothed frame-rate estimator.
///
/// Mutation requires `&mut self`; the scheduler worker is the only
/// owner and republishes [`current_rate`](Self::current_rate) through
/// [`OverlayState`](crate::OverlayState) for other threads.
#[derive(Debug, Clone)]
pub struct FrameTimeStatistics {
    /// Frame durations in seconds; `0.0` marks an unused slot.
    samples: [f64; WINDOW_CAPACITY],
    /// Next slot to write.
    index: usize,
    last_tick: Option<Instant>,
    smoothed: Option<f64>,
}

impl FrameTimeStatistics {
    pub fn new() -> Self {
        Self {
            samples: [0.0; WINDOW_CAPACITY],
            index: 0,
            last_tick: None,
            smoothed: None,
        }
    }

    /// Create an estimator whose baseline is `start`, so the first
    /// [`record_tick`](Self::record_tick) already yields a delta.
    pub fn starting_at(start: Instant) -> Self {
        Self {
            last_tick: Some(start),
            ..Self::new()
        }
    }

    /// Record a frame signal observed at `now`.
    pub fn record_tick(&mut self, now: Instant) -> TickOutcome {
        let Some(last) = self.last_tick.replace(now) else {
            return TickOutcome::Baseline;
        };
        // Out-of-order timestamps saturate to zero and get clamped.
        self.record_delta(now.saturating_duration_since(last))
    }

    /// Record an inter-frame duration directly.
    pub fn record_delta(&mut self, delta: Duration) -> TickOutcome {
        let delta = delta.max(MIN_FRAME_TIME);
        if delta < NOISE_FLOOR {
            return TickOutcome::Discarded;
        }

        self.samples[self.index] = delta.as_secs_f64();
        self.index = (self.index + 1) % WINDOW_CAPACITY;

        let Some(mean) = self.mean_seconds() else {
            return TickOutcome::Recorded;
        };
        let instantaneous = 1.0 / mean;

        let blended = match self.smoothed {
            Some(prev) => prev * (1.0 - SMOOTHING) + instantaneous * SMOOTHING,
            None => instantaneous,
        };
        self.smoothed = Some(blended.clamp(MIN_RATE, MAX_RATE));

        TickOutcome::Recorded
    }

    /// Smoothed frames per second, or `0.0` before the first sample.
    pub fn current_rate(&self) -> f64 {
        self.smoothed.unwrap_or(0.0)
    }

    /// Mean of the populated window slots.
    pub fn mean_frame_time(&self) -> Option<Duration> {
        self.mean_seconds().map(Duration::from_secs_f64)
    }

    /// Number of populated window slots.
    pub fn sample_count(&self) -> usize {
        self.samples.iter().filter(|s| **s > 0.0).count()
    }

    // ── Internal ─────────────────────────────────────────────────

    fn mean_seconds(&self) -> Option<f64> {
        let (total, count) = self
            .samples
            .iter()
            .filter(|s| **s > 0.0)
            .fold((0.0, 0usize), |(t, n), s| (t + s, n + 1));
        (count > 0).then(|| total / count as f64)
    }
}

impl Default for FrameTimeStatistics {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ────────────────────────────────────────────────────────
