//! Acceleration contributors.
//!
//! A simulation carries a list of [`Force`]s. Each tick the whole list is
//! first advanced once ([`ForceSet::advance`]) so that time-varying forces
//! (turbulence, wind gusts) move their noise phase, and only then evaluated
//! for every particle. All particles in a tick therefore see the same field.
//!
//! Contributions are summed independently: no force observes another's
//! output, so list order never changes the result.
//!
//! # Force Kinds
//!
//! | Kind | Effect |
//! |------|--------|
//! | [`Force::Gravity`] | Constant pull along `direction`, scaled by mass |
//! | [`Force::Buoyancy`] | Gravity with the sign flipped |
//! | [`Force::Drag`] | Quadratic resistance against velocity |
//! | [`Force::Turbulence`] | Fractal noise field |
//! | [`Force::Vortex`] | Swirl around an axis with a slight inward pull |
//! | [`Force::Attractor`] | Inverse-square pull toward a point |
//! | [`Force::Wind`] | Constant push plus noise gusts |

use crate::pool::Particle;
use glam::Vec3;
use noise::{NoiseFn, Perlin};
use serde::{Deserialize, Serialize};

/// Vectors shorter than this are treated as zero.
const EPSILON: f32 = 1.0e-6;

/// Fraction of a vortex's strength applied as the flat inward pull.
const VORTEX_INWARD_PULL: f32 = 0.1;

/// Sample offsets that decorrelate the three turbulence axes.
const AXIS_OFFSETS: [[f64; 3]; 3] = [
    [0.0, 0.0, 0.0],
    [31.416, 47.853, 12.793],
    [-83.21, 17.309, 61.77],
];

fn default_strength() -> f32 {
    1.0
}

fn default_down() -> Vec3 {
    Vec3::NEG_Y
}

fn default_axis() -> Vec3 {
    Vec3::Y
}

fn default_one() -> f32 {
    1.0
}

fn default_octaves() -> u32 {
    1
}

fn default_min_distance() -> f32 {
    0.1
}

fn default_wind_direction() -> Vec3 {
    Vec3::X
}

/// Declarative force description.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Force {
    /// Constant acceleration `direction * strength * mass`.
    Gravity {
        #[serde(default = "default_strength")]
        strength: f32,
        #[serde(default = "default_down")]
        direction: Vec3,
    },

    /// Gravity's sign-inverted twin: pushes against `direction`.
    Buoyancy {
        #[serde(default = "default_strength")]
        strength: f32,
        #[serde(default = "default_down")]
        direction: Vec3,
    },

    /// Quadratic drag: magnitude `strength * |v|^2`, opposite to velocity.
    Drag {
        #[serde(default = "default_strength")]
        strength: f32,
    },

    /// Fractal noise field sampled at the particle's position.
    ///
    /// Each octave halves amplitude and doubles frequency. `speed` is how
    /// fast the noise phase scrolls per second.
    Turbulence {
        #[serde(default = "default_strength")]
        strength: f32,
        #[serde(default = "default_one")]
        frequency: f32,
        #[serde(default = "default_octaves")]
        octaves: u32,
        #[serde(default = "default_one")]
        speed: f32,
    },

    /// Swirl around an axis through `center`.
    ///
    /// Tangential push falls off as `exp(-distance / radius)`; a flat inward
    /// pull bends orbits into spirals.
    Vortex {
        #[serde(default = "default_strength")]
        strength: f32,
        #[serde(default)]
        center: Vec3,
        #[serde(default = "default_axis")]
        axis: Vec3,
        #[serde(default = "default_one")]
        radius: f32,
    },

    /// Inverse-square pull toward `position`.
    ///
    /// Distance is clamped to `min_distance`; beyond `radius` the pull decays
    /// exponentially. A non-positive radius disables the decay.
    Attractor {
        #[serde(default = "default_strength")]
        strength: f32,
        #[serde(default)]
        position: Vec3,
        #[serde(default = "default_one")]
        radius: f32,
        #[serde(default = "default_min_distance")]
        min_distance: f32,
    },

    /// Constant push along `direction` plus noise-driven gusts.
    Wind {
        #[serde(default = "default_strength")]
        strength: f32,
        #[serde(default = "default_wind_direction")]
        direction: Vec3,
        #[serde(default)]
        gust_strength: f32,
        #[serde(default = "default_one")]
        gust_frequency: f32,
    },
}

impl Force {
    /// Downward gravity of `strength`.
    pub fn gravity(strength: f32) -> Self {
        Force::Gravity {
            strength,
            direction: Vec3::NEG_Y,
        }
    }

    pub fn drag(strength: f32) -> Self {
        Force::Drag { strength }
    }

    pub fn turbulence(strength: f32, frequency: f32) -> Self {
        Force::Turbulence {
            strength,
            frequency,
            octaves: 1,
            speed: 1.0,
        }
    }

    /// Whether this force carries a time-varying phase.
    pub fn is_time_varying(&self) -> bool {
        matches!(self, Force::Turbulence { .. } | Force::Wind { .. })
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Force::Gravity { .. } => "gravity",
            Force::Buoyancy { .. } => "buoyancy",
            Force::Drag { .. } => "drag",
            Force::Turbulence { .. } => "turbulence",
            Force::Vortex { .. } => "vortex",
            Force::Attractor { .. } => "attractor",
            Force::Wind { .. } => "wind",
        }
    }
}

/// Seeded Perlin noise source.
#[derive(Clone)]
struct NoiseSource(Perlin);

impl NoiseSource {
    fn new(seed: u32) -> Self {
        Self(Perlin::new(seed))
    }

    /// Zero for non-finite points, which Perlin cannot index.
    #[inline]
    fn sample(&self, p: [f64; 3]) -> f32 {
        if p.iter().all(|c| c.is_finite()) {
            self.0.get(p) as f32
        } else {
            0.0
        }
    }
}

impl std::fmt::Debug for NoiseSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("NoiseSource")
    }
}

/// A [`Force`] plus its runtime state.
#[derive(Clone, Debug)]
pub struct ForceField {
    force: Force,
    phase: f32,
    noise: NoiseSource,
}

impl ForceField {
    pub fn new(force: Force, noise_seed: u32) -> Self {
        Self {
            force,
            phase: 0.0,
            noise: NoiseSource::new(noise_seed),
        }
    }

    pub fn force(&self) -> &Force {
        &self.force
    }

    /// Current noise phase (always 0 for stateless forces).
    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Advance the noise phase. Called once per tick, before any particle is
    /// evaluated.
    pub fn advance_phase(&mut self, dt: f32) {
        match self.force {
            Force::Turbulence { speed, .. } => self.phase += dt * speed,
            Force::Wind { gust_frequency, .. } => self.phase += dt * gust_frequency,
            _ => {}
        }
    }

    /// Acceleration this force contributes to `particle`.
    ///
    /// Degenerate geometry (zero velocity, particle on an axis or on the
    /// attractor point) yields zero rather than NaN.
    pub fn calculate(&self, particle: &Particle) -> Vec3 {
        match self.force {
            Force::Gravity { strength, direction } => {
                direction.normalize_or_zero() * strength * particle.mass
            }

            Force::Buoyancy { strength, direction } => {
                -direction.normalize_or_zero() * strength * particle.mass
            }

            Force::Drag { strength } => {
                let speed = particle.velocity.length();
                if speed < EPSILON {
                    return Vec3::ZERO;
                }
                -(particle.velocity / speed) * strength * speed * speed
            }

            Force::Turbulence {
                strength,
                frequency,
                octaves,
                ..
            } => self.turbulence(particle.position, strength, frequency, octaves),

            Force::Vortex {
                strength,
                center,
                axis,
                radius,
            } => {
                let Some(axis) = axis.try_normalize() else {
                    return Vec3::ZERO;
                };
                let offset = particle.position - center;
                let radial = offset - axis * offset.dot(axis);
                let distance = radial.length();
                if distance < EPSILON {
                    return Vec3::ZERO;
                }
                let radial_dir = radial / distance;
                let tangent = axis.cross(radial_dir);
                let falloff = if radius > EPSILON {
                    (-distance / radius).exp()
                } else {
                    0.0
                };
                // Inward pull ignores the falloff.
                tangent * strength * falloff - radial_dir * strength * VORTEX_INWARD_PULL
            }

            Force::Attractor {
                strength,
                position,
                radius,
                min_distance,
            } => {
                let to_target = position - particle.position;
                let distance = to_target.length();
                if distance < EPSILON {
                    return Vec3::ZERO;
                }
                let clamped = distance.max(min_distance.max(EPSILON));
                let mut magnitude = strength / (clamped * clamped);
                if radius > 0.0 && distance > radius {
                    magnitude *= (-(distance - radius) / radius).exp();
                }
                (to_target / distance) * magnitude
            }

            Force::Wind {
                strength,
                direction,
                gust_strength,
                ..
            } => {
                let dir = direction.normalize_or_zero();
                let base = dir * strength;
                if gust_strength == 0.0 {
                    return base;
                }
                let p = particle.position;
                let gust = self.noise.sample([
                    (p.x * 0.1 + self.phase) as f64,
                    (p.y * 0.1) as f64,
                    (p.z * 0.1) as f64,
                ]);
                base + dir * gust * gust_strength
            }
        }
    }

    fn turbulence(&self, position: Vec3, strength: f32, frequency: f32, octaves: u32) -> Vec3 {
        let mut sum = Vec3::ZERO;
        let mut amplitude = 1.0;
        let mut freq = frequency;
        for _ in 0..octaves.max(1) {
            let p = position * freq + Vec3::splat(self.phase);
            if !freq.is_finite() || !p.is_finite() {
                break;
            }
            let mut octave = [0.0f32; 3];
            for (axis, offset) in AXIS_OFFSETS.iter().enumerate() {
                octave[axis] = self.noise.sample([
                    p.x as f64 + offset[0],
                    p.y as f64 + offset[1],
                    p.z as f64 + offset[2],
                ]);
            }
            sum += Vec3::from_array(octave) * amplitude;
            amplitude *= 0.5;
            freq *= 2.0;
        }
        sum * strength
    }
}

/// Every force acting on one simulation.
#[derive(Clone, Debug, Default)]
pub struct ForceSet {
    fields: Vec<ForceField>,
}

impl ForceSet {
    /// Build runtime fields; each field gets its own noise seed derived from
    /// `seed` and its position in the list.
    pub fn new(forces: &[Force], seed: u32) -> Self {
        let fields = forces
            .iter()
            .enumerate()
            .map(|(i, f)| ForceField::new(f.clone(), seed.wrapping_add(i as u32)))
            .collect();
        Self { fields }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn fields(&self) -> &[ForceField] {
        &self.fields
    }

    /// Advance every time-varying force by `dt`.
    pub fn advance(&mut self, dt: f32) {
        for field in &mut self.fields {
            field.advance_phase(dt);
        }
    }

    /// Summed acceleration acting on `particle`.
    pub fn acceleration(&self, particle: &Particle) -> Vec3 {
        self.fields
            .iter()
            .fold(Vec3::ZERO, |acc, f| acc + f.calculate(particle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn particle_at(position: Vec3, velocity: Vec3) -> Particle {
        Particle {
            position,
            velocity,
            alive: true,
            life: 1.0,
            mass: 1.0,
            ..Particle::ZEROED
        }
    }

    #[test]
    fn test_gravity_one_second() {
        let field = ForceField::new(
            Force::Gravity {
                strength: 9.8,
                direction: Vec3::NEG_Y,
            },
            0,
        );
        let mut p = particle_at(Vec3::ZERO, Vec3::ZERO);
        p.velocity += field.calculate(&p) * 1.0;
        assert!((p.velocity.y + 9.8).abs() < 1e-5);
        assert_eq!(p.velocity.x, 0.0);
    }

    #[test]
    fn test_gravity_scales_with_mass_and_buoyancy_inverts() {
        let mut p = particle_at(Vec3::ZERO, Vec3::ZERO);
        p.mass = 2.0;
        let g = ForceField::new(Force::Gravity { strength: 1.0, direction: Vec3::NEG_Y }, 0);
        let b = ForceField::new(Force::Buoyancy { strength: 1.0, direction: Vec3::NEG_Y }, 0);
        assert_eq!(g.calculate(&p), Vec3::new(0.0, -2.0, 0.0));
        assert_eq!(b.calculate(&p), Vec3::new(0.0, 2.0, 0.0));
    }

    #[test]
    fn test_drag_opposes_velocity() {
        let field = ForceField::new(Force::Drag { strength: 0.5 }, 0);
        let p = particle_at(Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(field.calculate(&p), Vec3::new(-2.0, 0.0, 0.0));

        let resting = particle_at(Vec3::ZERO, Vec3::ZERO);
        assert_eq!(field.calculate(&resting), Vec3::ZERO);
    }

    #[test]
    fn test_vortex_swirls_and_pulls_in() {
        let field = ForceField::new(
            Force::Vortex {
                strength: 1.0,
                center: Vec3::ZERO,
                axis: Vec3::Y,
                radius: 1.0,
            },
            0,
        );
        let p = particle_at(Vec3::new(1.0, 0.5, 0.0), Vec3::ZERO);
        let a = field.calculate(&p);
        // Y x X = -Z
        assert!(a.z < 0.0);
        assert!((a.z + (-1.0f32).exp()).abs() < 1e-5);
        assert!((a.x + VORTEX_INWARD_PULL).abs() < 1e-6);
        assert_eq!(a.y, 0.0);
    }

    #[test]
    fn test_vortex_inward_pull_ignores_falloff() {
        let field = ForceField::new(
            Force::Vortex {
                strength: 2.0,
                center: Vec3::ZERO,
                axis: Vec3::Y,
                radius: 0.1,
            },
            0,
        );
        let far = particle_at(Vec3::new(50.0, 0.0, 0.0), Vec3::ZERO);
        let a = field.calculate(&far);
        assert!(a.z.abs() < 1e-6);
        assert!((a.x + 2.0 * VORTEX_INWARD_PULL).abs() < 1e-6);
    }

    #[test]
    fn test_vortex_on_axis_is_zero() {
        let field = ForceField::new(
            Force::Vortex {
                strength: 1.0,
                center: Vec3::ZERO,
                axis: Vec3::Y,
                radius: 1.0,
            },
            0,
        );
        let p = particle_at(Vec3::new(0.0, 3.0, 0.0), Vec3::ZERO);
        assert_eq!(field.calculate(&p), Vec3::ZERO);
    }

    #[test]
    fn test_attractor_clamped_and_decays() {
        let field = ForceField::new(
            Force::Attractor {
                strength: 1.0,
                position: Vec3::ZERO,
                radius: 2.0,
                min_distance: 0.5,
            },
            0,
        );
        let close = particle_at(Vec3::new(0.01, 0.0, 0.0), Vec3::ZERO);
        let a = field.calculate(&close);
        assert!(a.is_finite());
        assert!((a.x + 4.0).abs() < 1e-4, "clamped to 1 / 0.5^2, got {a}");

        let inside = particle_at(Vec3::new(2.0, 0.0, 0.0), Vec3::ZERO);
        assert!((field.calculate(&inside).x + 0.25).abs() < 1e-6);

        let outside = particle_at(Vec3::new(4.0, 0.0, 0.0), Vec3::ZERO);
        let expected = 1.0 / 16.0 * (-1.0f32).exp();
        assert!((field.calculate(&outside).x + expected).abs() < 1e-6);

        let at_point = particle_at(Vec3::ZERO, Vec3::ZERO);
        assert_eq!(field.calculate(&at_point), Vec3::ZERO);
    }

    #[test]
    fn test_turbulence_deterministic_and_phase_driven() {
        let force = Force::Turbulence {
            strength: 1.0,
            frequency: 1.3,
            octaves: 3,
            speed: 1.0,
        };
        let mut a = ForceField::new(force.clone(), 7);
        let b = ForceField::new(force, 7);
        let p = particle_at(Vec3::new(0.3, 1.7, -2.2), Vec3::ZERO);
        assert_eq!(a.calculate(&p), b.calculate(&p));

        a.advance_phase(0.37);
        assert!((a.phase() - 0.37).abs() < 1e-6);
        assert!(a.calculate(&p).is_finite());
    }

    #[test]
    fn test_turbulence_many_octaves_stays_finite() {
        let field = ForceField::new(
            Force::Turbulence {
                strength: 1.0,
                frequency: 1.0,
                octaves: 200,
                speed: 1.0,
            },
            3,
        );
        let p = particle_at(Vec3::new(0.5, 0.25, 0.0), Vec3::ZERO);
        assert!(field.calculate(&p).is_finite());
        let far = particle_at(Vec3::splat(f32::INFINITY), Vec3::ZERO);
        assert_eq!(field.calculate(&far), Vec3::ZERO);
    }

    #[test]
    fn test_stateless_forces_keep_zero_phase() {
        let mut field = ForceField::new(Force::Drag { strength: 1.0 }, 0);
        field.advance_phase(1.0);
        assert_eq!(field.phase(), 0.0);
    }

    #[test]
    fn test_wind_without_gusts_is_constant() {
        let field = ForceField::new(
            Force::Wind {
                strength: 3.0,
                direction: Vec3::new(0.0, 0.0, 2.0),
                gust_strength: 0.0,
                gust_frequency: 1.0,
            },
            0,
        );
        let p = particle_at(Vec3::new(5.0, 1.0, 0.0), Vec3::ZERO);
        assert_eq!(field.calculate(&p), Vec3::new(0.0, 0.0, 3.0));
    }

    #[test]
    fn test_force_set_sums_independently() {
        let forces = vec![
            Force::Gravity { strength: 1.0, direction: Vec3::NEG_Y },
            Force::Wind {
                strength: 2.0,
                direction: Vec3::X,
                gust_strength: 0.0,
                gust_frequency: 1.0,
            },
        ];
        let mut reversed = forces.clone();
        reversed.reverse();
        let p = particle_at(Vec3::ZERO, Vec3::ZERO);
        let a = ForceSet::new(&forces, 1).acceleration(&p);
        let b = ForceSet::new(&reversed, 1).acceleration(&p);
        assert_eq!(a, Vec3::new(2.0, -1.0, 0.0));
        assert_eq!(a, b);
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let force: Force = serde_json::from_str(r#"{ "type": "gravity", "strength": 9.8 }"#).unwrap();
        assert_eq!(
            force,
            Force::Gravity {
                strength: 9.8,
                direction: Vec3::NEG_Y
            }
        );

        let unknown: Result<Force, _> = serde_json::from_str(r#"{ "type": "magnetism" }"#);
        assert!(unknown.is_err());
    }
}
