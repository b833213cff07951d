//! Frame clock for driving effects.
//!
//! Effects are stepped with an explicit `dt`. A [`FrameClock`] produces that
//! `dt` either from the wall clock or from a fixed step, and tracks pause
//! state and time scaling on top. Simulated time is the sum of the produced
//! deltas, so a paused or slowed clock never makes an effect jump.
//!
//! # Example
//!
//! ```ignore
//! let mut clock = FrameClock::fixed(1.0 / 60.0);
//! while effect.is_active() {
//!     let dt = clock.tick();
//!     effect.update(dt);
//! }
//! ```

use std::time::{Duration, Instant};

/// Where frame deltas come from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TimeSource {
    /// Real time between ticks.
    Wall,
    /// The same step every tick, for reproducible runs.
    Fixed(f32),
}

/// Produces per-frame deltas and counts frames.
#[derive(Debug)]
pub struct FrameClock {
    source: TimeSource,
    last_tick: Instant,
    /// Sum of every delta handed out.
    simulated: f64,
    delta: f32,
    frame: u64,
    paused: bool,
    time_scale: f32,
    /// Frames and wall time since the rate was last sampled.
    rate_window: (u64, Instant),
    rate: f32,
}

/// How often [`FrameClock::frame_rate`] is refreshed.
const RATE_INTERVAL: Duration = Duration::from_millis(500);

impl FrameClock {
    pub fn new(source: TimeSource) -> Self {
        let now = Instant::now();
        Self {
            source,
            last_tick: now,
            simulated: 0.0,
            delta: 0.0,
            frame: 0,
            paused: false,
            time_scale: 1.0,
            rate_window: (0, now),
            rate: 0.0,
        }
    }

    /// A wall-clock driven clock.
    pub fn wall() -> Self {
        Self::new(TimeSource::Wall)
    }

    /// A clock that always steps by `dt`.
    pub fn fixed(dt: f32) -> Self {
        Self::new(TimeSource::Fixed(dt))
    }

    /// Advance one frame and return the scaled delta. Zero while paused.
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let raw = match self.source {
            TimeSource::Wall => now.duration_since(self.last_tick).as_secs_f32(),
            TimeSource::Fixed(dt) => dt,
        };
        self.last_tick = now;

        self.delta = if self.paused {
            0.0
        } else {
            raw.max(0.0) * self.time_scale
        };
        self.simulated += self.delta as f64;
        self.frame += 1;

        let (frames_at, since) = self.rate_window;
        let window = now.duration_since(since);
        if window >= RATE_INTERVAL {
            self.rate = (self.frame - frames_at) as f32 / window.as_secs_f32();
            self.rate_window = (self.frame, now);
        }

        self.delta
    }

    /// Delta returned by the last [`tick`](Self::tick).
    #[inline]
    pub fn delta(&self) -> f32 {
        self.delta
    }

    /// Simulated seconds so far.
    #[inline]
    pub fn elapsed(&self) -> f32 {
        self.simulated as f32
    }

    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Wall-clock ticks per second, refreshed twice a second.
    #[inline]
    pub fn frame_rate(&self) -> f32 {
        self.rate
    }

    pub fn source(&self) -> TimeSource {
        self.source
    }

    pub fn set_source(&mut self, source: TimeSource) {
        self.source = source;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        if self.paused {
            // Skip the wall time spent paused.
            self.last_tick = Instant::now();
            self.paused = false;
        }
    }

    pub fn toggle_pause(&mut self) {
        if self.paused {
            self.resume();
        } else {
            self.pause();
        }
    }

    #[inline]
    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    /// Negative scales clamp to zero.
    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.max(0.0);
    }

    /// Back to frame zero, keeping source and scale.
    pub fn reset(&mut self) {
        *self = Self {
            time_scale: self.time_scale,
            ..Self::new(self.source)
        };
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::wall()
    }
}
