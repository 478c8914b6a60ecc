//! Fixed-timestep simulation clock.
//!
//! The [`SimulationClock`] turns variable wall-clock frame deltas into a whole
//! number of fixed-size simulation steps plus an interpolation factor for the
//! render pass. Unconsumed time carries over in an accumulator.
//!
//! Long frames (a debugger pause, a disk stall) are bounded twice: the frame
//! delta is clamped to `max_frame_time`, and at most `max_steps_per_frame`
//! steps run per frame. Whole steps beyond that are discarded and reported in
//! [`FrameSteps::dropped`], so the simulation slows down instead of spiralling.
//!
//! # Example
//!
//! ```
//! use dawn_engine::clock::SimulationClock;
//!
//! let mut clock = SimulationClock::new(1.0 / 60.0);
//!
//! let frame = clock.advance(1.0 / 30.0);
//! assert_eq!(frame.steps, 2);
//! assert!(frame.interpolation.abs() < 1e-9);
//!
//! let frame = clock.advance(0.004);
//! assert_eq!(frame.steps, 0);
//! assert!((frame.interpolation - 0.24).abs() < 1e-9);
//! ```

/// Default per-frame clamp on elapsed time, in seconds.
pub const DEFAULT_MAX_FRAME_TIME: f64 = 0.25;

/// Default cap on catch-up steps per frame.
pub const DEFAULT_MAX_STEPS_PER_FRAME: u32 = 8;

// ---------------------------------------------------------------------------
// FrameSteps
// ---------------------------------------------------------------------------

/// What one call to [`SimulationClock::advance`] decided.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameSteps {
    /// Fixed steps to simulate this frame.
    pub steps: u32,
    /// Fraction of a step left in the accumulator, in `[0, 1)`.
    pub interpolation: f64,
    /// Seconds of wall time discarded by the clamps.
    pub dropped: f64,
}

// ---------------------------------------------------------------------------
// SimulationClock
// ---------------------------------------------------------------------------

/// Accumulator-based fixed-timestep clock.
#[derive(Debug, Clone)]
pub struct SimulationClock {
    fixed_dt: f64,
    max_frame_time: f64,
    max_steps_per_frame: u32,
    accumulated: f64,
    tick_count: u64,
    frame_time: f64,
}

impl SimulationClock {
    /// Create a clock stepping by `fixed_dt` seconds with default clamps.
    ///
    /// # Panics
    ///
    /// Panics if `fixed_dt` is not positive and finite.
    pub fn new(fixed_dt: f64) -> Self {
        assert!(
            fixed_dt > 0.0 && fixed_dt.is_finite(),
            "fixed_dt must be positive and finite, got {fixed_dt}"
        );
        Self {
            fixed_dt,
            max_frame_time: DEFAULT_MAX_FRAME_TIME,
            max_steps_per_frame: DEFAULT_MAX_STEPS_PER_FRAME,
            accumulated: 0.0,
            tick_count: 0,
            frame_time: 0.0,
        }
    }

    /// Override the per-frame elapsed-time clamp.
    pub fn with_max_frame_time(mut self, seconds: f64) -> Self {
        self.max_frame_time = seconds;
        self
    }

    /// Override the catch-up step cap. A value of 0 is treated as 1.
    pub fn with_max_steps_per_frame(mut self, steps: u32) -> Self {
        self.max_steps_per_frame = steps.max(1);
        self
    }

    /// Feed one frame's wall-clock delta (seconds) into the accumulator and
    /// return how many fixed steps to run.
    ///
    /// Negative or non-finite deltas count as zero.
    pub fn advance(&mut self, elapsed: f64) -> FrameSteps {
        let elapsed = if elapsed.is_finite() { elapsed.max(0.0) } else { 0.0 };
        self.frame_time = elapsed;

        let mut dropped = 0.0;
        let clamped = if elapsed > self.max_frame_time {
            dropped += elapsed - self.max_frame_time;
            self.max_frame_time
        } else {
            elapsed
        };
        self.accumulated += clamped;

        let mut steps = 0;
        while self.accumulated >= self.fixed_dt && steps < self.max_steps_per_frame {
            self.accumulated -= self.fixed_dt;
            steps += 1;
        }

        if self.accumulated >= self.fixed_dt {
            // Keep the fractional part so interpolation stays continuous.
            let whole = (self.accumulated / self.fixed_dt).floor() * self.fixed_dt;
            self.accumulated -= whole;
            dropped += whole;
        }

        if dropped > 0.0 {
            tracing::warn!(
                elapsed,
                dropped,
                steps,
                "frame too long; simulation time dropped"
            );
        }

        self.tick_count += u64::from(steps);

        FrameSteps {
            steps,
            interpolation: self.interpolation(),
            dropped,
        }
    }

    /// Current fraction of a step waiting in the accumulator.
    pub fn interpolation(&self) -> f64 {
        self.accumulated / self.fixed_dt
    }

    /// Fixed step size in seconds.
    pub fn fixed_dt(&self) -> f64 {
        self.fixed_dt
    }

    /// Per-frame elapsed-time clamp in seconds.
    pub fn max_frame_time(&self) -> f64 {
        self.max_frame_time
    }

    /// Catch-up step cap.
    pub fn max_steps_per_frame(&self) -> u32 {
        self.max_steps_per_frame
    }

    /// Unconsumed seconds in the accumulator.
    pub fn accumulated(&self) -> f64 {
        self.accumulated
    }

    /// Total fixed steps handed out so far.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Simulated seconds, computed as `tick_count * fixed_dt` to avoid drift.
    pub fn sim_time(&self) -> f64 {
        self.tick_count as f64 * self.fixed_dt
    }

    /// Wall-clock delta of the most recent frame, before clamping.
    pub fn frame_time(&self) -> f64 {
        self.frame_time
    }
}

impl Default for SimulationClock {
    /// 60 Hz with default clamps.
    fn default() -> Self {
        Self::new(1.0 / 60.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
