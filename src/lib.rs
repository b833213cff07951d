//! # effectgraph - Deterministic Particle Effects
//!
//! CPU-side particle effect engine: emitters, forces, curves and composite
//! effects with root motion, all reproducible from a single integer seed.
//!
//! effectgraph owns simulation state only. Renderers read the live particle
//! list (or the packed [`ParticleVertex`] buffer) each frame and draw it
//! however they like.
//!
//! ## Quick Start
//!
//! ```ignore
//! use effectgraph::prelude::*;
//!
//! fn main() -> effectgraph::Result<()> {
//!     let config = SimulationConfig::new(2_000)
//!         .with_emitter(
//!             EmitterConfig::new()
//!                 .with_shape(EmitterShape::Cone { angle: 0.4, radius: 0.0, direction: Vec3::Y })
//!                 .with_rate(Distribution::constant(400.0))
//!                 .with_speed(Distribution::uniform(2.0, 5.0))
//!                 .with_lifetime(Distribution::uniform(0.5, 1.5)),
//!         )
//!         .with_force(Force::gravity(9.8))
//!         .with_curves(CurveSet::new().with_opacity(Curve::linear(1.0, 0.0)));
//!
//!     let mut sim = Simulation::new(&config, 42)?;
//!     for _ in 0..60 {
//!         sim.update(1.0 / 60.0);
//!     }
//!     println!("{} particles alive", sim.particle_count());
//!     Ok(())
//! }
//! ```
//!
//! ## Core Concepts
//!
//! ### Determinism
//!
//! Every random draw goes through a [`Sampler`]. The same configuration, seed
//! and sequence of `dt` values always produce the same particles, bit for bit.
//!
//! ### Simulations
//!
//! A [`Simulation`] is one particle system: a fixed-capacity [`ParticlePool`],
//! a list of [`Emitter`]s, a [`ForceSet`] and a [`CurveSet`]. When the pool is
//! full, further emissions are dropped silently.
//!
//! ### Composites
//!
//! A [`Composite`] layers several simulations under a moving root, fires
//! timeline events, drives lights and spawns child effects such as an impact
//! burst when its movement completes.
//!
//! ### Effect documents
//!
//! [`EffectSpec`] loads and saves whole effects as JSON. Descriptions are
//! validated and clamped against [`Limits`] before anything is allocated.

pub mod composite;
pub mod config;
pub mod curve;
pub mod distribution;
pub mod emitter;
pub mod error;
pub mod force;
pub mod light;
pub mod limits;
pub mod movement;
pub mod pool;
pub mod sampler;
pub mod simulation;
pub mod time;
pub mod timeline;

pub use bytemuck;
pub use composite::{Composite, CompositeConfig, CompositeState, Layer, LayerConfig, LayerState};
pub use config::EffectSpec;
pub use curve::{Curve, Interpolation, Keyframe};
pub use distribution::Distribution;
pub use emitter::{Burst, Emitter, EmitterConfig, EmitterShape};
pub use error::{EffectError, Result};
pub use force::{Force, ForceField, ForceSet};
pub use glam::{Quat, Vec2, Vec3, Vec4};
pub use light::{LightConfig, LightState};
pub use limits::{LimitAdjustment, Limits};
pub use movement::Movement;
pub use pool::{Particle, ParticleHandle, ParticlePool, ParticleVertex};
pub use sampler::Sampler;
pub use simulation::{CurveSet, FrameStats, Simulation, SimulationConfig};
pub use time::{FrameClock, TimeSource};
pub use timeline::{EventKind, TimelineEvent};

/// Convenient re-exports for common usage.
///
/// ```ignore
/// use effectgraph::prelude::*;
/// ```
pub mod prelude {
    pub use crate::composite::{Composite, CompositeConfig, LayerConfig, LayerState};
    pub use crate::config::EffectSpec;
    pub use crate::curve::{Curve, Interpolation, Keyframe};
    pub use crate::distribution::Distribution;
    pub use crate::emitter::{Burst, EmitterConfig, EmitterShape};
    pub use crate::force::Force;
    pub use crate::light::LightConfig;
    pub use crate::limits::Limits;
    pub use crate::movement::Movement;
    pub use crate::pool::{Particle, ParticleVertex};
    pub use crate::sampler::Sampler;
    pub use crate::simulation::{CurveSet, Simulation, SimulationConfig};
    pub use crate::time::FrameClock;
    pub use crate::timeline::{EventKind, TimelineEvent};
    pub use crate::{Quat, Vec2, Vec3, Vec4};
}
