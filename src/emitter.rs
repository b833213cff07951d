//! Particle emitters.
//!
//! An emitter decides how many particles are born each tick and what state
//! they start with. Continuous emission runs through a rate accumulator:
//! `rate * dt` is added every tick, the integer part is emitted and the
//! fraction carries over, so the long-run average always matches the nominal
//! rate regardless of frame timing. Bursts are one-shot counts fired at
//! scheduled times and bypass the accumulator.
//!
//! # Emitter Shapes
//!
//! | Shape | Spawn position | Outward direction |
//! |-------|----------------|-------------------|
//! | [`EmitterShape::Point`] | The origin | Random on the unit sphere |
//! | [`EmitterShape::Sphere`] | Inside (or on) a ball | From the center |
//! | [`EmitterShape::Box`] | Inside a box | From the center |
//! | [`EmitterShape::Cone`] | Along the cone, up to `radius` | Within the cone |
//!
//! # Example
//!
//! ```ignore
//! // Sparks shooting upward
//! EmitterConfig::new()
//!     .with_shape(EmitterShape::Cone { angle: 0.3, radius: 0.0, direction: Vec3::Y })
//!     .with_rate(Distribution::constant(200.0))
//!     .with_speed(Distribution::uniform(2.0, 4.0))
//!     .with_lifetime(Distribution::uniform(0.5, 1.0))
//! ```

use crate::distribution::Distribution;
use crate::pool::ParticlePool;
use crate::sampler::Sampler;
use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;

/// Shortest lifetime a particle may be given, in seconds.
pub const MIN_LIFETIME: f32 = 1.0e-3;

/// Number of custom data channels per particle.
pub const CUSTOM_CHANNELS: usize = 4;

/// Shortest repeat interval a burst fires at, in seconds.
pub const MIN_BURST_INTERVAL: f32 = 1.0e-3;

/// Burst cycles fired by one emitter tick. Cycles due beyond this are skipped.
pub const MAX_BURST_CYCLES_PER_TICK: u32 = 1_024;

fn default_lifetime() -> Distribution<f32> {
    Distribution::constant(1.0)
}

fn default_one() -> Distribution<f32> {
    Distribution::constant(1.0)
}

fn default_axis() -> Vec3 {
    Vec3::Y
}

/// Where particles are born.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EmitterShape {
    #[default]
    Point,
    Sphere {
        radius: f32,
        /// Spawn on the surface only.
        #[serde(default)]
        surface: bool,
    },
    Box {
        /// Full edge lengths along each axis.
        size: Vec3,
    },
    Cone {
        /// Half-angle in radians.
        angle: f32,
        /// How far along the sampled direction particles may start.
        #[serde(default)]
        radius: f32,
        #[serde(default = "default_axis")]
        direction: Vec3,
    },
}

impl EmitterShape {
    /// Sample a local spawn position and the shape's outward direction there.
    pub fn sample(&self, sampler: &mut Sampler) -> (Vec3, Vec3) {
        match *self {
            EmitterShape::Point => (Vec3::ZERO, sampler.next_vec3_on_sphere()),
            EmitterShape::Sphere { radius, surface } => {
                let dir = sampler.next_vec3_on_sphere();
                let r = if surface {
                    radius
                } else {
                    radius * sampler.next().cbrt()
                };
                (dir * r, dir)
            }
            EmitterShape::Box { size } => {
                let pos = sampler.next_vec3_in_box(size * 0.5);
                (pos, pos.try_normalize().unwrap_or(Vec3::Y))
            }
            EmitterShape::Cone {
                angle,
                radius,
                direction,
            } => {
                let dir = sampler.next_vec3_in_cone(angle, direction);
                (dir * radius * sampler.next(), dir)
            }
        }
    }
}

/// One-shot emission of `count` particles at `time` seconds.
///
/// With a positive `interval` the burst repeats every `interval` seconds,
/// `cycles` times in total (forever when `cycles` is absent).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Burst {
    #[serde(default)]
    pub time: f32,
    pub count: u32,
    #[serde(default, alias = "repeat_interval")]
    pub interval: Option<f32>,
    #[serde(default)]
    pub cycles: Option<u32>,
}

impl Burst {
    pub fn new(time: f32, count: u32) -> Self {
        Self {
            time,
            count,
            interval: None,
            cycles: None,
        }
    }

    pub fn repeating(mut self, interval: f32, cycles: Option<u32>) -> Self {
        self.interval = Some(interval);
        self.cycles = cycles;
        self
    }

    fn total_cycles(&self) -> u32 {
        match self.interval {
            Some(interval) if interval > 0.0 => self.cycles.unwrap_or(u32::MAX),
            _ => 1,
        }
    }

    fn step(&self) -> f32 {
        self.interval.unwrap_or(0.0).max(MIN_BURST_INTERVAL)
    }

    fn fire_time(&self, cycle: u32) -> f32 {
        self.time + self.step() * cycle as f32
    }

    /// Cycles whose fire time is at or before `elapsed`.
    fn cycles_due(&self, elapsed: f32) -> u32 {
        if elapsed < self.time {
            return 0;
        }
        let due = ((elapsed - self.time) / self.step()).floor() as u32;
        due.saturating_add(1).min(self.total_cycles())
    }
}

/// Emitter configuration. Immutable once a simulation is built.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmitterConfig {
    #[serde(default)]
    pub shape: EmitterShape,
    /// Continuous rate in particles per second, sampled every tick.
    #[serde(default)]
    pub rate: Distribution<f32>,
    #[serde(default)]
    pub bursts: Vec<Burst>,
    /// Particle lifetime in seconds.
    #[serde(default = "default_lifetime")]
    pub lifetime: Distribution<f32>,
    #[serde(default)]
    pub velocity: Distribution<Vec3>,
    /// When set, adds `outward direction * speed` to the sampled velocity.
    #[serde(default)]
    pub speed: Option<Distribution<f32>>,
    #[serde(default = "default_one")]
    pub size: Distribution<f32>,
    #[serde(default = "default_one")]
    pub mass: Distribution<f32>,
    #[serde(default)]
    pub color: Option<Distribution<Vec4>>,
    /// Up to four channels of opaque per-particle data.
    #[serde(default)]
    pub custom: Vec<Distribution<f32>>,
    /// Offset from the simulation origin.
    #[serde(default)]
    pub offset: Vec3,
    /// Continuous emission stops after this many seconds.
    #[serde(default)]
    pub duration: Option<f32>,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            shape: EmitterShape::Point,
            rate: Distribution::constant(0.0),
            bursts: Vec::new(),
            lifetime: default_lifetime(),
            velocity: Distribution::constant(Vec3::ZERO),
            speed: None,
            size: default_one(),
            mass: default_one(),
            color: None,
            custom: Vec::new(),
            offset: Vec3::ZERO,
            duration: None,
        }
    }
}

impl EmitterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shape(mut self, shape: EmitterShape) -> Self {
        self.shape = shape;
        self
    }

    pub fn with_rate(mut self, rate: Distribution<f32>) -> Self {
        self.rate = rate;
        self
    }

    pub fn with_burst(mut self, burst: Burst) -> Self {
        self.bursts.push(burst);
        self
    }

    pub fn with_lifetime(mut self, lifetime: Distribution<f32>) -> Self {
        self.lifetime = lifetime;
        self
    }

    pub fn with_velocity(mut self, velocity: Distribution<Vec3>) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_speed(mut self, speed: Distribution<f32>) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn with_size(mut self, size: Distribution<f32>) -> Self {
        self.size = size;
        self
    }

    pub fn with_color(mut self, color: Distribution<Vec4>) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_custom(mut self, channel: Distribution<f32>) -> Self {
        self.custom.push(channel);
        self
    }

    pub fn with_offset(mut self, offset: Vec3) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_duration(mut self, seconds: f32) -> Self {
        self.duration = Some(seconds);
        self
    }
}

/// What one emitter tick produced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EmissionReport {
    pub emitted: u32,
    /// Emissions skipped because the pool was full.
    pub dropped: u32,
}

impl AddAssign for EmissionReport {
    fn add_assign(&mut self, rhs: Self) {
        self.emitted += rhs.emitted;
        self.dropped += rhs.dropped;
    }
}

/// Runtime emitter: configuration plus accumulator and burst bookkeeping.
#[derive(Clone, Debug)]
pub struct Emitter {
    config: EmitterConfig,
    max_rate: f32,
    accumulator: f32,
    elapsed: f32,
    /// Cycles already fired, per burst.
    bursts_fired: Vec<u32>,
}

impl Emitter {
    /// Create an emitter whose sampled rate never exceeds `max_rate`.
    pub fn new(config: EmitterConfig, max_rate: f32) -> Self {
        let bursts_fired = vec![0; config.bursts.len()];
        Self {
            config,
            max_rate,
            accumulator: 0.0,
            elapsed: 0.0,
            bursts_fired,
        }
    }

    pub fn config(&self) -> &EmitterConfig {
        &self.config
    }

    /// Fractional particles carried into the next tick.
    pub fn accumulator(&self) -> f32 {
        self.accumulator
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Whether continuous emission has ended and every burst has fired.
    pub fn is_finished(&self) -> bool {
        let continuous_done = match self.config.duration {
            Some(d) => self.elapsed >= d,
            None => self.config.rate.upper_bound() <= 0.0,
        };
        continuous_done
            && self
                .config
                .bursts
                .iter()
                .zip(&self.bursts_fired)
                .all(|(b, &fired)| fired >= b.total_cycles())
    }

    /// Advance by `dt`, spawning into `pool` around `origin`.
    ///
    /// Emissions that find the pool full are dropped, never queued.
    pub fn update(
        &mut self,
        dt: f32,
        origin: Vec3,
        sampler: &mut Sampler,
        pool: &mut ParticlePool,
    ) -> EmissionReport {
        let started = self.elapsed;
        self.elapsed += dt;

        let mut count: u32 = 0;

        let emitting = self.config.duration.map_or(true, |d| started < d);
        if emitting {
            let rate = self.config.rate.sample(sampler).clamp(0.0, self.max_rate);
            self.accumulator += rate * dt;
            let whole = self.accumulator.floor();
            self.accumulator -= whole;
            count += whole as u32;
        }

        for (burst, fired) in self.config.bursts.iter().zip(self.bursts_fired.iter_mut()) {
            let cycles = burst.total_cycles();
            let mut fired_now = 0;
            while *fired < cycles && burst.fire_time(*fired) <= self.elapsed {
                if fired_now == MAX_BURST_CYCLES_PER_TICK {
                    let due = burst.cycles_due(self.elapsed).max(*fired);
                    log::trace!("skipped {} burst cycles in one tick", due - *fired);
                    *fired = due;
                    break;
                }
                count = count.saturating_add(burst.count);
                *fired += 1;
                fired_now += 1;
            }
        }

        let mut report = EmissionReport::default();
        for _ in 0..count {
            if self.spawn(origin, sampler, pool) {
                report.emitted += 1;
            } else {
                report.dropped = count - report.emitted;
                log::trace!("particle pool full, dropped {} emissions", report.dropped);
                break;
            }
        }
        report
    }

    fn spawn(&self, origin: Vec3, sampler: &mut Sampler, pool: &mut ParticlePool) -> bool {
        let Some(handle) = pool.acquire() else {
            return false;
        };
        let config = &self.config;

        let (local, outward) = config.shape.sample(sampler);
        let mut velocity = config.velocity.sample(sampler);
        if let Some(speed) = &config.speed {
            velocity += outward * speed.sample(sampler);
        }
        let lifetime = config.lifetime.sample(sampler).max(MIN_LIFETIME);
        let size = config.size.sample(sampler).max(0.0);
        let mass = config.mass.sample(sampler);
        let color = config
            .color
            .as_ref()
            .map_or(Vec4::ONE, |c| c.sample(sampler));
        let mut custom = [0.0; CUSTOM_CHANNELS];
        for (i, slot) in custom.iter_mut().enumerate() {
            *slot = match config.custom.get(i) {
                Some(dist) => dist.sample(sampler),
                None => sampler.next(),
            };
        }

        if let Some(p) = pool.get_mut(handle) {
            p.position = origin + config.offset + local;
            p.velocity = velocity;
            p.lifetime = lifetime;
            p.base_size = size;
            p.size = size;
            p.mass = mass;
            p.color = color;
            p.custom = custom;
        }
        true
    }
}
