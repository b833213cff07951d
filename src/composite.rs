//! Multi-layer effects with root motion, timeline and lights.
//!
//! A [`Composite`] bundles several named [`Layer`]s, each wrapping its own
//! [`Simulation`], under one moving root. One [`Composite::update`] call:
//!
//! 1. advances the root [`Movement`] (while running)
//! 2. starts, steps or stops every layer
//! 3. updates child effects
//! 4. fires due timeline events (while running)
//! 5. checks for completion, spawning the impact effect if configured
//! 6. refreshes light states
//!
//! # Layer lifecycle
//!
//! ```text
//! Pending --(elapsed >= start_delay)--> Active --(duration elapsed)--> Stopped
//! ```
//!
//! A layer with a `duration` stays active for exactly that long, even when
//! it has nothing to emit. A layer without one stops once it is empty and
//! cannot emit again. A stopped layer releases its particles but keeps its
//! pool. When the composite completes, active layers stop emitting, so trails
//! fade out naturally.
//!
//! [`Composite::stop`] cancels instead: every layer is stopped at once and
//! later updates do nothing.
//!
//! # Example
//!
//! ```ignore
//! let config = CompositeConfig::new("fireball")
//!     .with_layer(LayerConfig::new("core", core_sim))
//!     .with_layer(LayerConfig::new("smoke", smoke_sim).with_start_delay(0.1))
//!     .with_movement(Movement::Linear { velocity: Vec3::Z * 8.0, acceleration: Vec3::ZERO, spin: Vec3::ZERO, lifetime: 1.5 })
//!     .with_impact(explosion);
//!
//! let mut effect = Composite::new(&config, 42)?;
//! while effect.is_active() {
//!     effect.update(1.0 / 60.0);
//! }
//! effect.dispose();
//! ```

use crate::error::{EffectError, Result};
use crate::light::{LightConfig, LightState};
use crate::limits::Limits;
use crate::movement::{Movement, MovementState};
use crate::pool::{Particle, ParticleVertex};
use crate::sampler::Sampler;
use crate::simulation::{Simulation, SimulationConfig};
use crate::timeline::{EventKind, Timeline, TimelineEvent};
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Tolerance for comparing accumulated time against scheduled times.
pub const TIME_EPSILON: f32 = 1.0e-5;

/// Name given to the impact child when its config has none.
pub const IMPACT_NAME: &str = "impact";

/// Separates child seed streams from layer seed streams.
const CHILD_SEED_SALT: u64 = 0xC41D_5EED;

fn default_true() -> bool {
    true
}

// ========== Configuration ==========

/// One named layer of a composite.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    pub name: String,
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Emission offset from the root, rotated with it.
    #[serde(default)]
    pub offset: Vec3,
    /// Disabled layers do not start until enabled by the timeline.
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub start_delay: f32,
    /// Seconds the layer stays active once started.
    #[serde(default)]
    pub duration: Option<f32>,
}

impl LayerConfig {
    pub fn new(name: impl Into<String>, simulation: SimulationConfig) -> Self {
        Self {
            name: name.into(),
            simulation,
            offset: Vec3::ZERO,
            enabled: true,
            start_delay: 0.0,
            duration: None,
        }
    }

    pub fn with_offset(mut self, offset: Vec3) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_start_delay(mut self, seconds: f32) -> Self {
        self.start_delay = seconds;
        self
    }

    pub fn with_duration(mut self, seconds: f32) -> Self {
        self.duration = Some(seconds);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Declarative description of a composite effect.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CompositeConfig {
    #[serde(default)]
    pub name: String,
    /// Start position of the root. For child effects, an offset from the
    /// spawn point.
    #[serde(default)]
    pub position: Vec3,
    #[serde(default)]
    pub layers: Vec<LayerConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub movement: Option<Movement>,
    /// Seconds until completion when there is no movement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f32>,
    #[serde(default)]
    pub timeline: Vec<TimelineEvent>,
    /// Spawned as a child when the composite completes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_impact: Option<Box<CompositeConfig>>,
    #[serde(default)]
    pub lights: Vec<LightConfig>,
}

impl CompositeConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn with_layer(mut self, layer: LayerConfig) -> Self {
        self.layers.push(layer);
        self
    }

    pub fn with_movement(mut self, movement: Movement) -> Self {
        self.movement = Some(movement);
        self
    }

    pub fn with_duration(mut self, seconds: f32) -> Self {
        self.duration = Some(seconds);
        self
    }

    pub fn with_event(mut self, event: TimelineEvent) -> Self {
        self.timeline.push(event);
        self
    }

    pub fn with_impact(mut self, impact: CompositeConfig) -> Self {
        self.on_impact = Some(Box::new(impact));
        self
    }

    pub fn with_light(mut self, light: LightConfig) -> Self {
        self.lights.push(light);
        self
    }

    /// Reject structurally invalid descriptions, child templates included.
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for layer in &self.layers {
            if !names.insert(layer.name.as_str()) {
                return Err(EffectError::InvalidConfig(format!(
                    "duplicate layer name '{}' in '{}'",
                    layer.name, self.name
                )));
            }
            layer.simulation.validate()?;
        }

        for event in &self.timeline {
            match &event.kind {
                EventKind::EnableLayer { layer } | EventKind::DisableLayer { layer } => {
                    if !names.contains(layer.as_str()) {
                        return Err(EffectError::UnknownLayer(layer.clone()));
                    }
                }
                EventKind::SpawnChild { effect, .. } => effect.validate()?,
                EventKind::Notify { .. } => {}
            }
        }

        if let Some(impact) = &self.on_impact {
            impact.validate()?;
        }
        Ok(())
    }
}

// ========== Runtime ==========

/// Where a layer is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerState {
    Pending,
    Active,
    Stopped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompositeState {
    /// Root is moving, layers may start, completion not yet reached.
    Running,
    /// Lifetime elapsed, target reached or stopped. Layers drain.
    Completed,
}

/// A running layer.
#[derive(Debug)]
pub struct Layer {
    name: String,
    simulation: Simulation,
    offset: Vec3,
    enabled: bool,
    start_delay: f32,
    duration: Option<f32>,
    started_at: Option<f32>,
    state: LayerState,
}

impl Layer {
    fn stop(&mut self) {
        if self.state != LayerState::Stopped {
            log::debug!("Layer '{}' stopped", self.name);
        }
        self.state = LayerState::Stopped;
        self.simulation.set_emitting(false);
        self.simulation.release_all();
    }

    fn update(&mut self, dt: f32, elapsed: f32, running: bool, root: Vec3, rotation: Quat) {
        if self.state == LayerState::Pending {
            if !running || !self.enabled || elapsed + TIME_EPSILON < self.start_delay {
                return;
            }
            log::debug!("Layer '{}' active at {:.3}s", self.name, elapsed);
            self.state = LayerState::Active;
            self.started_at = Some(elapsed);
        }
        if self.state == LayerState::Stopped {
            return;
        }

        if let (Some(duration), Some(started)) = (self.duration, self.started_at) {
            if elapsed - started + TIME_EPSILON >= duration {
                self.stop();
                return;
            }
        }

        self.simulation.set_emitting(running && self.enabled);
        self.simulation.set_origin(root + rotation * self.offset);
        self.simulation.update(dt);

        // Timed layers end on their duration only. A disabled layer may be
        // re-enabled while the composite runs.
        if self.duration.is_none() && (!running || self.enabled) && self.simulation.is_idle() {
            self.stop();
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> LayerState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn simulation(&self) -> &Simulation {
        &self.simulation
    }
}

/// A running composite effect.
#[derive(Debug)]
pub struct Composite {
    name: String,
    seed: u64,
    limits: Limits,
    movement: Option<Movement>,
    motion: MovementState,
    lifetime: Option<f32>,
    elapsed: f32,
    state: CompositeState,
    layers: Vec<Layer>,
    timeline: Timeline,
    on_impact: Option<Box<CompositeConfig>>,
    light_configs: Vec<LightConfig>,
    lights: Vec<LightState>,
    children: Vec<Composite>,
    children_spawned: u64,
    notifications: Vec<String>,
    halted: bool,
    disposed: bool,
}

impl Composite {
    /// Build a composite under the default [`Limits`].
    pub fn new(config: &CompositeConfig, seed: u64) -> Result<Self> {
        Self::with_limits(config, seed, Limits::default())
    }

    /// Validate, clamp to `limits`, and allocate every layer.
    pub fn with_limits(config: &CompositeConfig, seed: u64, limits: Limits) -> Result<Self> {
        config.validate()?;
        let mut config = config.clone();
        limits.clamp_composite(&mut config);

        let motion = match &config.movement {
            Some(movement) => movement.start(config.position),
            None => MovementState::stationary(config.position),
        };
        let lifetime = config
            .movement
            .as_ref()
            .map(Movement::lifetime)
            .or(config.duration);

        let layers = config
            .layers
            .iter()
            .enumerate()
            .map(|(i, layer)| -> Result<Layer> {
                let mut simulation = Simulation::with_limits(
                    &layer.simulation,
                    Sampler::derive_seed(seed, i as u64),
                    &limits,
                )?;
                simulation.set_origin(motion.position + motion.rotation * layer.offset);
                Ok(Layer {
                    name: layer.name.clone(),
                    simulation,
                    offset: layer.offset,
                    enabled: layer.enabled,
                    start_delay: layer.start_delay,
                    duration: layer.duration,
                    started_at: None,
                    state: LayerState::Pending,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let lights = config.lights.iter().map(LightState::new).collect();

        log::info!(
            "Composite '{}' created: {} layers, {} events, seed={}",
            config.name,
            layers.len(),
            config.timeline.len(),
            seed
        );

        Ok(Self {
            name: config.name,
            seed,
            limits,
            movement: config.movement,
            motion,
            lifetime,
            elapsed: 0.0,
            state: CompositeState::Running,
            layers,
            timeline: Timeline::new(config.timeline),
            on_impact: config.on_impact,
            light_configs: config.lights,
            lights,
            children: Vec::new(),
            children_spawned: 0,
            notifications: Vec::new(),
            halted: false,
            disposed: false,
        })
    }

    /// Advance the whole effect by `dt` seconds. No-op after [`stop`](Self::stop)
    /// or [`dispose`](Self::dispose).
    pub fn update(&mut self, dt: f32) {
        if self.halted || self.disposed {
            return;
        }
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.elapsed += dt;

        let running = self.state == CompositeState::Running;
        if running {
            if let Some(movement) = &self.movement {
                movement.advance(&mut self.motion, self.elapsed, dt);
            }
        }

        let (root, rotation) = (self.motion.position, self.motion.rotation);
        for layer in &mut self.layers {
            layer.update(dt, self.elapsed, running, root, rotation);
        }

        for child in &mut self.children {
            child.update(dt);
        }

        if self.state == CompositeState::Running {
            self.fire_due_events();
        }
        self.check_completion();

        for (light, config) in self.lights.iter_mut().zip(&self.light_configs) {
            light.update(config, root, rotation, self.elapsed);
        }
    }

    fn fire_due_events(&mut self) {
        let due = self.timeline.drain_due(self.elapsed + TIME_EPSILON);
        for event in due {
            match &event.kind {
                EventKind::SpawnChild {
                    name,
                    effect,
                    offset,
                } => {
                    let position = self.motion.position + self.motion.rotation * *offset;
                    let stream = self.children_spawned;
                    self.children_spawned += 1;
                    if let Some(child) = spawn_child(
                        effect,
                        name.as_deref(),
                        position,
                        child_seed(self.seed, stream),
                        &self.limits,
                    ) {
                        self.children.push(child);
                    }
                }
                EventKind::EnableLayer { layer } => {
                    set_enabled(&mut self.layers, layer, true);
                }
                EventKind::DisableLayer { layer } => {
                    set_enabled(&mut self.layers, layer, false);
                }
                EventKind::Notify { message } => {
                    log::debug!("Composite '{}': {}", self.name, message);
                    self.notifications.push(message.clone());
                }
            }
        }
    }

    fn check_completion(&mut self) {
        if self.state != CompositeState::Running {
            return;
        }
        let expired = match self.lifetime {
            Some(lifetime) => self.elapsed + TIME_EPSILON >= lifetime,
            None => {
                self.timeline.is_finished()
                    && self.layers.iter().all(|l| l.state == LayerState::Stopped)
            }
        };
        if expired || self.motion.arrived {
            self.complete(true);
        }
    }

    fn complete(&mut self, impact: bool) {
        log::info!(
            "Composite '{}' completed at {:.3}s",
            self.name,
            self.elapsed
        );
        self.state = CompositeState::Completed;
        for layer in &mut self.layers {
            match layer.state {
                LayerState::Pending => layer.stop(),
                LayerState::Active => layer.simulation.set_emitting(false),
                LayerState::Stopped => {}
            }
        }

        if !impact {
            return;
        }
        if let Some(config) = self.on_impact.take() {
            let stream = self.children_spawned;
            self.children_spawned += 1;
            let name = if config.name.is_empty() {
                Some(IMPACT_NAME)
            } else {
                None
            };
            if let Some(child) = spawn_child(
                &config,
                name,
                self.motion.position,
                child_seed(self.seed, stream),
                &self.limits,
            ) {
                self.children.push(child);
            }
        }
    }

    /// Cancel the effect now without firing the impact. Every layer releases
    /// its particles and later updates do nothing. Pools stay allocated until
    /// [`dispose`](Self::dispose).
    pub fn stop(&mut self) {
        if self.halted {
            return;
        }
        if self.state == CompositeState::Running {
            self.complete(false);
        }
        for layer in &mut self.layers {
            layer.stop();
        }
        for child in &mut self.children {
            child.stop();
        }
        for light in &mut self.lights {
            light.intensity = 0.0;
        }
        self.halted = true;
    }

    /// Tear everything down. Idempotent; later updates do nothing.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        for layer in &mut self.layers {
            layer.stop();
            layer.simulation.dispose();
        }
        for child in &mut self.children {
            child.dispose();
        }
        self.state = CompositeState::Completed;
        self.disposed = true;
        log::debug!("Composite '{}' disposed", self.name);
    }

    // ========== Control ==========

    /// Redirect a homing root. Ignored by other movements.
    pub fn set_target(&mut self, target: Vec3) {
        if self.motion.target.is_some() {
            self.motion.target = Some(target);
        }
    }

    pub fn set_layer_enabled(&mut self, name: &str, enabled: bool) -> Result<()> {
        let layer = self
            .layers
            .iter_mut()
            .find(|l| l.name == name)
            .ok_or_else(|| EffectError::UnknownLayer(name.to_string()))?;
        layer.enabled = enabled;
        Ok(())
    }

    /// Take every message produced by notify events since the last call.
    pub fn drain_notifications(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notifications)
    }

    // ========== Queries ==========

    /// Running, or still has an active layer or an active child.
    pub fn is_active(&self) -> bool {
        !self.halted
            && !self.disposed
            && (self.state == CompositeState::Running
                || self.layers.iter().any(|l| l.state == LayerState::Active)
                || self.children.iter().any(Composite::is_active))
    }

    /// Cancelled by [`stop`](Self::stop).
    pub fn is_stopped(&self) -> bool {
        self.halted
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn state(&self) -> CompositeState {
        self.state
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn position(&self) -> Vec3 {
        self.motion.position
    }

    pub fn velocity(&self) -> Vec3 {
        self.motion.velocity
    }

    pub fn rotation(&self) -> Quat {
        self.motion.rotation
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.name == name)
    }

    pub fn layer_state(&self, name: &str) -> Option<LayerState> {
        self.layer(name).map(Layer::state)
    }

    pub fn children(&self) -> &[Composite] {
        &self.children
    }

    /// First child effect named `name`.
    pub fn child(&self, name: &str) -> Option<&Composite> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn lights(&self) -> &[LightState] {
        &self.lights
    }

    /// Live particles of every layer, children excluded.
    pub fn particles(&self) -> impl Iterator<Item = &Particle> + '_ {
        self.layers.iter().flat_map(|l| l.simulation.particles())
    }

    /// Live particles across layers and all descendants.
    pub fn particle_count(&self) -> usize {
        self.layers
            .iter()
            .map(|l| l.simulation.particle_count())
            .sum::<usize>()
            + self.children.iter().map(Composite::particle_count).sum::<usize>()
    }

    /// Append vertices for every layer and descendant to `out`.
    pub fn write_vertices(&self, out: &mut Vec<ParticleVertex>) {
        for layer in &self.layers {
            layer.simulation.write_vertices(out);
        }
        for child in &self.children {
            child.write_vertices(out);
        }
    }
}

fn child_seed(seed: u64, stream: u64) -> u64 {
    Sampler::derive_seed(seed ^ CHILD_SEED_SALT, stream)
}

fn set_enabled(layers: &mut [Layer], name: &str, enabled: bool) {
    match layers.iter_mut().find(|l| l.name == name) {
        Some(layer) => layer.enabled = enabled,
        None => log::warn!("Timeline references unknown layer '{name}'"),
    }
}

fn spawn_child(
    template: &CompositeConfig,
    name: Option<&str>,
    position: Vec3,
    seed: u64,
    limits: &Limits,
) -> Option<Composite> {
    let mut config = template.clone();
    config.position += position;
    if let Some(name) = name {
        config.name = name.to_string();
    }
    match Composite::with_limits(&config, seed, limits.clone()) {
        Ok(child) => Some(child),
        Err(err) => {
            log::warn!("Failed to spawn child effect '{}': {err}", config.name);
            None
        }
    }
}
