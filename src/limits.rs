//! Resource ceilings for effect descriptions.
//!
//! Effects may come from untrusted JSON. Before anything is allocated, a
//! [`Limits`] table clamps the description in place: pool capacity, emitter
//! count, emission rate, lifetime, burst size and repeat interval, layer
//! count and turbulence octaves. Each change is
//! reported as a [`LimitAdjustment`] and logged at `warn` level, so an author
//! can see which numbers were cut.
//!
//! Clamping is applied again at runtime where values are sampled: the
//! emitter caps every sampled rate at `max_emit_rate`.

use crate::composite::CompositeConfig;
use crate::distribution::Distribution;
use crate::force::Force;
use crate::simulation::SimulationConfig;
use crate::timeline::EventKind;
use serde::{Deserialize, Serialize};

/// Upper bounds applied to every effect description.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Pool capacity per simulation.
    pub max_particles: usize,
    /// Particles per second per emitter.
    pub max_emit_rate: f32,
    /// Emitters per simulation.
    pub max_emitters: usize,
    /// Seconds.
    pub max_lifetime: f32,
    /// Layers per composite.
    pub max_layers: usize,
    /// Particles per single burst.
    pub max_burst_count: u32,
    /// Seconds between repeats of a repeating burst.
    pub min_burst_interval: f32,
    /// Noise octaves per turbulence force.
    pub max_octaves: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_particles: 50_000,
            max_emit_rate: 10_000.0,
            max_emitters: 16,
            max_lifetime: 60.0,
            max_layers: 32,
            max_burst_count: 10_000,
            min_burst_interval: 1.0 / 60.0,
            max_octaves: 8,
        }
    }
}

/// One value that was lowered to fit a [`Limits`] table.
#[derive(Clone, Debug, PartialEq)]
pub struct LimitAdjustment {
    /// Path of the clamped field, e.g. `layers[sparks].emitters[0].rate`.
    pub field: String,
    pub requested: f64,
    pub applied: f64,
}

impl Limits {
    /// No limits at all.
    pub fn unbounded() -> Self {
        Self {
            max_particles: usize::MAX,
            max_emit_rate: f32::MAX,
            max_emitters: usize::MAX,
            max_lifetime: f32::MAX,
            max_layers: usize::MAX,
            max_burst_count: u32::MAX,
            min_burst_interval: 0.0,
            max_octaves: u32::MAX,
        }
    }

    /// Clamp one simulation description in place.
    pub fn clamp_simulation(&self, config: &mut SimulationConfig) -> Vec<LimitAdjustment> {
        let mut adjustments = Vec::new();
        self.clamp_simulation_at("", config, &mut adjustments);
        adjustments
    }

    /// Clamp a composite, its layers and every child effect template.
    pub fn clamp_composite(&self, config: &mut CompositeConfig) -> Vec<LimitAdjustment> {
        let mut adjustments = Vec::new();
        self.clamp_composite_at("", config, &mut adjustments);
        adjustments
    }

    fn clamp_composite_at(
        &self,
        prefix: &str,
        config: &mut CompositeConfig,
        out: &mut Vec<LimitAdjustment>,
    ) {
        if config.layers.len() > self.max_layers {
            record(
                out,
                format!("{prefix}layers"),
                config.layers.len() as f64,
                self.max_layers as f64,
            );
            config.layers.truncate(self.max_layers);
        }

        for layer in &mut config.layers {
            let path = format!("{prefix}layers[{}].", layer.name);
            self.clamp_simulation_at(&path, &mut layer.simulation, out);
        }

        for (i, event) in config.timeline.iter_mut().enumerate() {
            if let EventKind::SpawnChild { effect, .. } = &mut event.kind {
                let path = format!("{prefix}timeline[{i}].");
                self.clamp_composite_at(&path, effect, out);
            }
        }

        if let Some(impact) = &mut config.on_impact {
            let path = format!("{prefix}on_impact.");
            self.clamp_composite_at(&path, impact, out);
        }
    }

    fn clamp_simulation_at(
        &self,
        prefix: &str,
        config: &mut SimulationConfig,
        out: &mut Vec<LimitAdjustment>,
    ) {
        if config.capacity > self.max_particles {
            record(
                out,
                format!("{prefix}capacity"),
                config.capacity as f64,
                self.max_particles as f64,
            );
            config.capacity = self.max_particles;
        }

        if config.emitters.len() > self.max_emitters {
            record(
                out,
                format!("{prefix}emitters"),
                config.emitters.len() as f64,
                self.max_emitters as f64,
            );
            config.emitters.truncate(self.max_emitters);
        }

        for (i, emitter) in config.emitters.iter_mut().enumerate() {
            let path = format!("{prefix}emitters[{i}]");
            clamp_distribution(
                out,
                format!("{path}.rate"),
                &mut emitter.rate,
                self.max_emit_rate,
            );
            clamp_distribution(
                out,
                format!("{path}.lifetime"),
                &mut emitter.lifetime,
                self.max_lifetime,
            );
            for (j, burst) in emitter.bursts.iter_mut().enumerate() {
                if burst.count > self.max_burst_count {
                    record(
                        out,
                        format!("{path}.bursts[{j}].count"),
                        burst.count as f64,
                        self.max_burst_count as f64,
                    );
                    burst.count = self.max_burst_count;
                }
                if let Some(interval) = burst.interval {
                    if interval > 0.0 && interval < self.min_burst_interval {
                        record(
                            out,
                            format!("{path}.bursts[{j}].interval"),
                            interval as f64,
                            self.min_burst_interval as f64,
                        );
                        burst.interval = Some(self.min_burst_interval);
                    }
                }
            }
        }

        for (i, force) in config.forces.iter_mut().enumerate() {
            if let Force::Turbulence { octaves, .. } = force {
                if *octaves > self.max_octaves {
                    record(
                        out,
                        format!("{prefix}forces[{i}].octaves"),
                        *octaves as f64,
                        self.max_octaves as f64,
                    );
                    *octaves = self.max_octaves;
                }
            }
        }
    }
}

fn clamp_distribution(
    out: &mut Vec<LimitAdjustment>,
    field: String,
    dist: &mut Distribution<f32>,
    max: f32,
) {
    let requested = dist.upper_bound();
    if requested > max {
        *dist = dist.map(|v| v.min(max));
        if let Distribution::Normal { mean, stddev } = dist {
            // Keep the three-sigma tail under the ceiling too.
            *stddev = (stddev.abs()).min(((max - *mean) / 3.0).max(0.0));
        }
        record(out, field, requested as f64, dist.upper_bound() as f64);
    }
}

fn record(out: &mut Vec<LimitAdjustment>, field: String, requested: f64, applied: f64) {
    log::warn!("Clamped {field} from {requested} to {applied}");
    out.push(LimitAdjustment {
        field,
        requested,
        applied,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composite::LayerConfig;
    use crate::emitter::{Burst, EmitterConfig};

    fn small() -> Limits {
        Limits {
            max_particles: 100,
            max_emit_rate: 50.0,
            max_emitters: 1,
            max_lifetime: 2.0,
            max_layers: 2,
            max_burst_count: 10,
            min_burst_interval: 0.1,
            max_octaves: 4,
        }
    }

    #[test]
    fn test_within_limits_untouched() {
        let mut config = SimulationConfig::new(10)
            .with_emitter(EmitterConfig::new().with_rate(Distribution::constant(5.0)));
        let before = config.clone();
        assert!(small().clamp_simulation(&mut config).is_empty());
        assert_eq!(config, before);
    }

    #[test]
    fn test_clamp_simulation() {
        let mut config = SimulationConfig::new(1_000)
            .with_emitter(
                EmitterConfig::new()
                    .with_rate(Distribution::uniform(10.0, 500.0))
                    .with_lifetime(Distribution::constant(30.0))
                    .with_burst(Burst::new(0.0, 400)),
            )
            .with_emitter(EmitterConfig::new());

        let adjustments = small().clamp_simulation(&mut config);
        let fields: Vec<&str> = adjustments.iter().map(|a| a.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "capacity",
                "emitters",
                "emitters[0].rate",
                "emitters[0].lifetime",
                "emitters[0].bursts[0].count",
            ]
        );
        assert_eq!(config.capacity, 100);
        assert_eq!(config.emitters.len(), 1);
        let emitter = &config.emitters[0];
        assert_eq!(emitter.rate, Distribution::uniform(10.0, 50.0));
        assert_eq!(emitter.lifetime, Distribution::constant(2.0));
        assert_eq!(emitter.bursts[0].count, 10);
        assert_eq!(adjustments[0].requested, 1_000.0);
        assert_eq!(adjustments[0].applied, 100.0);
    }

    #[test]
    fn test_burst_interval_and_octaves_clamped() {
        let mut config = SimulationConfig::new(10)
            .with_emitter(
                EmitterConfig::new()
                    .with_burst(Burst::new(0.0, 1).repeating(1.0e-30, None))
                    .with_burst(Burst::new(0.0, 1).repeating(0.5, None)),
            )
            .with_force(Force::Turbulence {
                strength: 1.0,
                frequency: 1.0,
                octaves: 200,
                speed: 1.0,
            });

        let adjustments = small().clamp_simulation(&mut config);
        let fields: Vec<&str> = adjustments.iter().map(|a| a.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["emitters[0].bursts[0].interval", "forces[0].octaves"]
        );
        let bursts = &config.emitters[0].bursts;
        assert_eq!(bursts[0].interval, Some(0.1));
        assert_eq!(bursts[1].interval, Some(0.5));
        assert!(matches!(config.forces[0], Force::Turbulence { octaves: 4, .. }));
    }

    #[test]
    fn test_normal_tail_clamped() {
        let mut config = SimulationConfig::new(10).with_emitter(
            EmitterConfig::new().with_rate(Distribution::normal(40.0, 10.0)),
        );
        small().clamp_simulation(&mut config);
        assert!(config.emitters[0].rate.upper_bound() <= 50.0 + 1e-4);
    }

    #[test]
    fn test_clamp_composite_layers_and_children() {
        let layer = |name: &str| LayerConfig::new(name, SimulationConfig::new(500));
        let mut config = CompositeConfig::new("blast")
            .with_layer(layer("core"))
            .with_layer(layer("smoke"))
            .with_layer(layer("sparks"))
            .with_impact(CompositeConfig::new("impact").with_layer(layer("flash")));

        let adjustments = small().clamp_composite(&mut config);
        let fields: Vec<&str> = adjustments.iter().map(|a| a.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "layers",
                "layers[core].capacity",
                "layers[smoke].capacity",
                "on_impact.layers[flash].capacity",
            ]
        );
        assert_eq!(config.layers.len(), 2);
    }

    #[test]
    fn test_unbounded_never_clamps() {
        let mut config = SimulationConfig::new(1_000_000)
            .with_emitter(EmitterConfig::new().with_rate(Distribution::constant(1.0e9)));
        assert!(Limits::unbounded().clamp_simulation(&mut config).is_empty());
    }
}
