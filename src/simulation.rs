//! Single-system particle simulation.
//!
//! A [`Simulation`] owns one particle pool, its emitters, a force set and the
//! per-particle curves. Each [`Simulation::update`] runs a fixed pipeline:
//!
//! 1. Clamp `dt` into `[0, max_delta]`
//! 2. Emit (continuous rate and bursts)
//! 3. Advance time-varying forces
//! 4. For every live particle: age it, release it if dead, otherwise
//!    accumulate forces and integrate (semi-implicit Euler)
//! 5. Apply size, color and opacity curves over normalized age
//!
//! Given the same configuration, seed and `dt` sequence, the resulting
//! particle state is identical on every run.
//!
//! # Example
//!
//! ```ignore
//! let config = SimulationConfig::new(2_000)
//!     .with_emitter(EmitterConfig::new().with_rate(Distribution::constant(300.0)))
//!     .with_force(Force::gravity(9.8))
//!     .with_force(Force::drag(0.2))
//!     .with_curves(CurveSet::new().with_opacity(Curve::linear(1.0, 0.0)));
//!
//! let mut sim = Simulation::new(&config, 7)?;
//! sim.update(1.0 / 60.0);
//! ```

use crate::curve::Curve;
use crate::emitter::{EmissionReport, Emitter, EmitterConfig, CUSTOM_CHANNELS};
use crate::error::{EffectError, Result};
use crate::force::{Force, ForceSet};
use crate::limits::Limits;
use crate::pool::{Particle, ParticlePool, ParticleVertex};
use crate::sampler::Sampler;
use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// Remaining life at or below which a particle counts as dead.
///
/// Absorbs the rounding left over when `dt / lifetime` is summed to exactly 1.
pub const LIFE_EPSILON: f32 = 1.0e-6;

/// Default upper bound on a single step, in seconds.
pub const DEFAULT_MAX_DELTA: f32 = 1.0 / 30.0;

fn default_capacity() -> usize {
    1_000
}

fn default_max_delta() -> f32 {
    DEFAULT_MAX_DELTA
}

/// Curves evaluated over each particle's normalized age.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CurveSet {
    /// Multiplies the emitted size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Curve<f32>>,
    /// Replaces the particle color.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Curve<Vec4>>,
    /// Replaces alpha, applied after `color`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<Curve<f32>>,
    /// Scales velocity during position integration. The stored velocity is
    /// never rewritten, so the scale does not compound across frames.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity: Option<Curve<f32>>,
}

impl CurveSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_size(mut self, curve: Curve<f32>) -> Self {
        self.size = Some(curve);
        self
    }

    pub fn with_color(mut self, curve: Curve<Vec4>) -> Self {
        self.color = Some(curve);
        self
    }

    pub fn with_opacity(mut self, curve: Curve<f32>) -> Self {
        self.opacity = Some(curve);
        self
    }

    pub fn with_velocity(mut self, curve: Curve<f32>) -> Self {
        self.velocity = Some(curve);
        self
    }

    /// Velocity scale at `age`, 1.0 without a velocity curve.
    #[inline]
    pub fn speed_scale(&self, age: f32) -> f32 {
        self.velocity.as_ref().map_or(1.0, |c| c.evaluate(age))
    }

    /// Write curve-driven size and color into `p`.
    pub fn apply_visuals(&self, p: &mut Particle, age: f32) {
        if let Some(size) = &self.size {
            p.size = p.base_size * size.evaluate(age);
        }
        if let Some(color) = &self.color {
            p.color = color.evaluate(age);
        }
        if let Some(opacity) = &self.opacity {
            p.color.w = opacity.evaluate(age);
        }
    }
}

/// Everything needed to build a [`Simulation`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Maximum number of simultaneously live particles.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default)]
    pub emitters: Vec<EmitterConfig>,
    #[serde(default)]
    pub forces: Vec<Force>,
    #[serde(default)]
    pub curves: CurveSet,
    /// Largest `dt` a single update will integrate.
    #[serde(default = "default_max_delta")]
    pub max_delta: f32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::new(default_capacity())
    }
}

impl SimulationConfig {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            emitters: Vec::new(),
            forces: Vec::new(),
            curves: CurveSet::default(),
            max_delta: DEFAULT_MAX_DELTA,
        }
    }

    pub fn with_emitter(mut self, emitter: EmitterConfig) -> Self {
        self.emitters.push(emitter);
        self
    }

    pub fn with_force(mut self, force: Force) -> Self {
        self.forces.push(force);
        self
    }

    pub fn with_curves(mut self, curves: CurveSet) -> Self {
        self.curves = curves;
        self
    }

    pub fn with_max_delta(mut self, max_delta: f32) -> Self {
        self.max_delta = max_delta;
        self
    }

    /// Check structural constraints that types alone cannot express.
    pub fn validate(&self) -> Result<()> {
        if !(self.max_delta > 0.0) {
            return Err(EffectError::InvalidConfig(format!(
                "max_delta must be positive, got {}",
                self.max_delta
            )));
        }
        for (i, emitter) in self.emitters.iter().enumerate() {
            if emitter.custom.len() > CUSTOM_CHANNELS {
                return Err(EffectError::InvalidConfig(format!(
                    "emitter {i} declares {} custom channels, at most {CUSTOM_CHANNELS} allowed",
                    emitter.custom.len()
                )));
            }
        }
        Ok(())
    }
}

/// Counters for one [`Simulation::update`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub emitted: u32,
    pub dropped: u32,
    pub expired: u32,
    pub alive: usize,
}

/// A running particle system.
#[derive(Debug)]
pub struct Simulation {
    sampler: Sampler,
    pool: ParticlePool,
    emitters: Vec<Emitter>,
    forces: ForceSet,
    curves: CurveSet,
    max_delta: f32,
    origin: Vec3,
    emitting: bool,
    elapsed: f32,
    frame: u64,
}

impl Simulation {
    /// Build a simulation under the default [`Limits`].
    pub fn new(config: &SimulationConfig, seed: u64) -> Result<Self> {
        Self::with_limits(config, seed, &Limits::default())
    }

    /// Build a simulation, clamping the configuration to `limits` first.
    pub fn with_limits(config: &SimulationConfig, seed: u64, limits: &Limits) -> Result<Self> {
        config.validate()?;
        let mut config = config.clone();
        limits.clamp_simulation(&mut config);

        let sampler = Sampler::new(seed);
        let forces = ForceSet::new(&config.forces, sampler.seed());
        let emitters = config
            .emitters
            .into_iter()
            .map(|e| Emitter::new(e, limits.max_emit_rate))
            .collect();

        log::debug!(
            "Simulation created: capacity={}, forces={}, seed={}",
            config.capacity,
            forces.len(),
            seed
        );

        Ok(Self {
            sampler,
            pool: ParticlePool::new(config.capacity),
            emitters,
            forces,
            curves: config.curves,
            max_delta: config.max_delta,
            origin: Vec3::ZERO,
            emitting: true,
            elapsed: 0.0,
            frame: 0,
        })
    }

    /// Advance by `dt` seconds.
    ///
    /// Negative or non-finite steps are treated as zero; steps larger than
    /// `max_delta` are clamped.
    pub fn update(&mut self, dt: f32) -> FrameStats {
        let dt = if dt.is_finite() {
            dt.clamp(0.0, self.max_delta)
        } else {
            0.0
        };
        self.elapsed += dt;
        self.frame += 1;

        let mut emission = EmissionReport::default();
        if self.emitting {
            for emitter in &mut self.emitters {
                emission += emitter.update(dt, self.origin, &mut self.sampler, &mut self.pool);
            }
        }

        self.forces.advance(dt);

        let forces = &self.forces;
        let curves = &self.curves;
        let mut expired = 0;
        self.pool.retain_mut(|p| {
            p.life -= dt / p.lifetime;
            if p.life <= LIFE_EPSILON {
                expired += 1;
                return false;
            }

            p.velocity += forces.acceleration(p) * dt;
            let age = p.normalized_age();
            p.position += p.velocity * curves.speed_scale(age) * dt;
            curves.apply_visuals(p, age);
            true
        });

        FrameStats {
            emitted: emission.emitted,
            dropped: emission.dropped,
            expired,
            alive: self.pool.active_count(),
        }
    }

    // ========== Placement and emission control ==========

    /// Move the point emitters spawn around. Live particles are unaffected.
    pub fn set_origin(&mut self, origin: Vec3) {
        self.origin = origin;
    }

    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    /// Pause or resume emission. Live particles keep simulating.
    pub fn set_emitting(&mut self, emitting: bool) {
        self.emitting = emitting;
    }

    pub fn is_emitting(&self) -> bool {
        self.emitting
    }

    /// No live particles and nothing left to emit.
    pub fn is_idle(&self) -> bool {
        self.pool.active_count() == 0
            && (!self.emitting || self.emitters.iter().all(Emitter::is_finished))
    }

    // ========== Output ==========

    pub fn particles(&self) -> impl Iterator<Item = &Particle> + '_ {
        self.pool.iter()
    }

    /// Append one vertex per live particle to `out`.
    pub fn write_vertices(&self, out: &mut Vec<ParticleVertex>) {
        out.extend(self.pool.iter().map(ParticleVertex::from_particle));
    }

    pub fn particle_count(&self) -> usize {
        self.pool.active_count()
    }

    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }

    pub fn pool(&self) -> &ParticlePool {
        &self.pool
    }

    pub fn emitters(&self) -> &[Emitter] {
        &self.emitters
    }

    pub fn forces(&self) -> &ForceSet {
        &self.forces
    }

    /// Simulated seconds, after clamping.
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    // ========== Teardown ==========

    /// Kill every live particle. Emission continues on the next update.
    pub fn release_all(&mut self) {
        self.pool.release_all();
    }

    /// Stop emitting and kill every particle. The pool keeps its allocation.
    pub fn dispose(&mut self) {
        self.emitting = false;
        self.pool.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::Keyframe;
    use crate::distribution::Distribution;
    use crate::emitter::Burst;

    fn single_particle(lifetime: f32) -> SimulationConfig {
        SimulationConfig::new(4)
            .with_max_delta(1.0)
            .with_emitter(
                EmitterConfig::new()
                    .with_burst(Burst::new(0.0, 1))
                    .with_lifetime(Distribution::constant(lifetime)),
            )
    }

    #[test]
    fn test_lifetime_death_on_schedule() {
        let mut sim = Simulation::new(&single_particle(1.0), 1).unwrap();
        for tick in 1..=9 {
            let stats = sim.update(0.1);
            assert_eq!(stats.alive, 1, "alive after tick {tick}");
        }
        let stats = sim.update(0.1);
        assert_eq!(stats.expired, 1);
        assert_eq!(sim.particle_count(), 0);
        assert_eq!(sim.pool().available_count(), 4);
    }

    #[test]
    fn test_gravity_integration() {
        let config = single_particle(100.0).with_force(Force::Gravity {
            strength: 10.0,
            direction: Vec3::NEG_Y,
        });
        let mut sim = Simulation::new(&config, 1).unwrap();
        sim.update(0.5);
        let p = *sim.particles().next().unwrap();
        // Semi-implicit: velocity first, then position with the new velocity.
        assert!((p.velocity.y + 5.0).abs() < 1e-5);
        assert!((p.position.y + 2.5).abs() < 1e-5);
    }

    #[test]
    fn test_dt_clamped() {
        let config = SimulationConfig::new(1).with_max_delta(0.05);
        let mut sim = Simulation::new(&config, 1).unwrap();
        sim.update(10.0);
        sim.update(-1.0);
        sim.update(f32::NAN);
        assert!((sim.elapsed() - 0.05).abs() < 1e-6);
        assert_eq!(sim.frame(), 3);
    }

    #[test]
    fn test_deterministic_runs() {
        let config = SimulationConfig::new(500)
            .with_emitter(
                EmitterConfig::new()
                    .with_rate(Distribution::uniform(100.0, 300.0))
                    .with_velocity(Distribution::normal(Vec3::Y, Vec3::ONE))
                    .with_lifetime(Distribution::uniform(0.2, 0.8)),
            )
            .with_force(Force::Turbulence {
                strength: 2.0,
                frequency: 1.5,
                octaves: 2,
                speed: 1.0,
            })
            .with_force(Force::Drag { strength: 0.3 });

        let run = || {
            let mut sim = Simulation::new(&config, 1234).unwrap();
            for _ in 0..120 {
                sim.update(1.0 / 60.0);
            }
            sim.particles().copied().collect::<Vec<_>>()
        };
        let a = run();
        assert!(!a.is_empty());
        assert_eq!(a, run());
    }

    #[test]
    fn test_capacity_never_exceeded() {
        let config = SimulationConfig::new(50).with_emitter(
            EmitterConfig::new()
                .with_rate(Distribution::constant(10_000.0))
                .with_lifetime(Distribution::constant(5.0)),
        );
        let mut sim = Simulation::new(&config, 3).unwrap();
        for _ in 0..30 {
            let stats = sim.update(1.0 / 60.0);
            assert!(stats.alive <= 50);
        }
        assert_eq!(sim.particle_count(), 50);
    }

    #[test]
    fn test_curves_applied_over_age() {
        let curves = CurveSet::new()
            .with_size(Curve::linear(1.0, 3.0))
            .with_opacity(
                Curve::new(vec![Keyframe::new(0.0, 1.0), Keyframe::new(1.0, 0.0)]).unwrap(),
            );
        let config = single_particle(1.0).with_curves(curves);
        let mut sim = Simulation::new(&config, 1).unwrap();
        for _ in 0..5 {
            sim.update(0.1);
        }
        let p = *sim.particles().next().unwrap();
        assert!((p.normalized_age() - 0.5).abs() < 1e-4);
        assert!((p.size - 2.0).abs() < 1e-3);
        assert!((p.color.w - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_velocity_curve_does_not_compound() {
        let config = SimulationConfig::new(1)
            .with_max_delta(1.0)
            .with_emitter(
                EmitterConfig::new()
                    .with_burst(Burst::new(0.0, 1))
                    .with_lifetime(Distribution::constant(100.0))
                    .with_velocity(Distribution::constant(Vec3::X)),
            )
            .with_curves(CurveSet::new().with_velocity(Curve::constant(0.5)));
        let mut sim = Simulation::new(&config, 1).unwrap();
        for _ in 0..4 {
            sim.update(0.25);
        }
        let p = *sim.particles().next().unwrap();
        assert_eq!(p.velocity, Vec3::X);
        assert!((p.position.x - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_origin_moves_spawn_point() {
        let mut sim = Simulation::new(&single_particle(1.0), 1).unwrap();
        sim.set_origin(Vec3::new(3.0, 0.0, 0.0));
        sim.update(0.0);
        assert_eq!(sim.particles().next().unwrap().position, Vec3::new(3.0, 0.0, 0.0));
    }

    #[test]
    fn test_release_and_dispose() {
        let mut sim = Simulation::new(&single_particle(10.0), 1).unwrap();
        sim.update(0.1);
        assert_eq!(sim.particle_count(), 1);
        sim.release_all();
        assert_eq!(sim.particle_count(), 0);
        assert_eq!(sim.capacity(), 4);

        sim.dispose();
        let stats = sim.update(0.1);
        assert_eq!(stats.emitted, 0);
        assert!(!sim.is_emitting());
        assert!(sim.is_idle());
    }

    #[test]
    fn test_vertices_match_particles() {
        let mut sim = Simulation::new(&single_particle(1.0), 1).unwrap();
        sim.update(0.1);
        let mut out = Vec::new();
        sim.write_vertices(&mut out);
        assert_eq!(out.len(), 1);
        let bytes: &[u8] = bytemuck::cast_slice(&out);
        assert_eq!(bytes.len(), 64);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let too_many = EmitterConfig {
            custom: vec![Distribution::constant(0.0); 5],
            ..EmitterConfig::default()
        };
        let config = SimulationConfig::new(10).with_emitter(too_many);
        assert!(matches!(
            Simulation::new(&config, 1),
            Err(EffectError::InvalidConfig(_))
        ));

        let config = SimulationConfig::new(10).with_max_delta(0.0);
        assert!(Simulation::new(&config, 1).is_err());
    }
}
