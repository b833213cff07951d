//! Root motion for composite effects.
//!
//! A composite's layers are positioned relative to a moving root. The root
//! follows one of three strategies:
//!
//! - [`Movement::Linear`]: constant acceleration from an initial velocity,
//!   with an optional spin accumulated into the root rotation
//! - [`Movement::Curve`]: position sampled from a keyframed path over the
//!   movement's normalized time
//! - [`Movement::Homing`]: steers toward a target, blending the current
//!   velocity toward the target direction every tick
//!
//! Every strategy has a lifetime. When it elapses (or a homing projectile
//! arrives) the composite completes and fires its impact effect.

use crate::curve::Curve;
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

fn default_turn_rate() -> f32 {
    4.0
}

/// How a composite's root moves.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Movement {
    Linear {
        #[serde(default)]
        velocity: Vec3,
        #[serde(default)]
        acceleration: Vec3,
        /// Angular velocity as a scaled axis, radians per second.
        #[serde(default)]
        spin: Vec3,
        lifetime: f32,
    },
    /// Offsets from the start position, keyed over `[0, 1]` of `lifetime`.
    Curve { path: Curve<Vec3>, lifetime: f32 },
    Homing {
        target: Vec3,
        speed: f32,
        /// Fraction of the remaining steering error removed per second.
        #[serde(default = "default_turn_rate")]
        turn_rate: f32,
        #[serde(default)]
        initial_velocity: Vec3,
        /// Completes early once this close to the target.
        #[serde(default)]
        arrive_distance: Option<f32>,
        lifetime: f32,
    },
}

impl Movement {
    /// Seconds until the movement completes.
    pub fn lifetime(&self) -> f32 {
        match *self {
            Movement::Linear { lifetime, .. }
            | Movement::Curve { lifetime, .. }
            | Movement::Homing { lifetime, .. } => lifetime,
        }
    }

    /// Initial state for a root starting at `start`.
    pub fn start(&self, start: Vec3) -> MovementState {
        let (velocity, target) = match *self {
            Movement::Linear { velocity, .. } => (velocity, None),
            Movement::Curve { .. } => (Vec3::ZERO, None),
            Movement::Homing {
                target,
                initial_velocity,
                ..
            } => (initial_velocity, Some(target)),
        };
        let position = match self {
            Movement::Curve { path, .. } => start + path.evaluate(0.0),
            _ => start,
        };
        MovementState {
            start,
            position,
            velocity,
            rotation: Quat::IDENTITY,
            target,
            arrived: false,
        }
    }

    /// Advance `state` by `dt`; `elapsed` is the movement time after the step.
    pub fn advance(&self, state: &mut MovementState, elapsed: f32, dt: f32) {
        match self {
            Movement::Linear {
                acceleration, spin, ..
            } => {
                state.velocity += *acceleration * dt;
                state.position += state.velocity * dt;
                if *spin != Vec3::ZERO {
                    let step = Quat::from_scaled_axis(*spin * dt);
                    state.rotation = (step * state.rotation).normalize();
                }
            }
            Movement::Curve { path, lifetime } => {
                let t = if *lifetime > 0.0 { elapsed / lifetime } else { 1.0 };
                let next = state.start + path.evaluate(t);
                if dt > 0.0 {
                    state.velocity = (next - state.position) / dt;
                }
                state.position = next;
            }
            Movement::Homing {
                speed,
                turn_rate,
                arrive_distance,
                ..
            } => {
                let target = state.target.unwrap_or(state.position);
                let desired = (target - state.position).normalize_or_zero() * *speed;
                let blend = (turn_rate * dt).clamp(0.0, 1.0);
                state.velocity = state.velocity.lerp(desired, blend);
                state.position += state.velocity * dt;
                if let Some(d) = arrive_distance {
                    if state.position.distance(target) <= *d {
                        state.arrived = true;
                    }
                }
            }
        }
    }
}

/// Mutable root state driven by a [`Movement`].
#[derive(Clone, Debug, PartialEq)]
pub struct MovementState {
    start: Vec3,
    pub position: Vec3,
    pub velocity: Vec3,
    pub rotation: Quat,
    /// Current homing target, if steering.
    pub target: Option<Vec3>,
    /// A homing root reached its arrival radius.
    pub arrived: bool,
}

impl MovementState {
    /// A root that stays at `position`.
    pub fn stationary(position: Vec3) -> Self {
        Self {
            start: position,
            position,
            velocity: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            target: None,
            arrived: false,
        }
    }
}
