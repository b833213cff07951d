//! Dynamic lights attached to a composite's root.
//!
//! A light has a color, a peak intensity, a start time and an optional
//! duration. Over its duration the intensity follows `intensity_curve`
//! (full intensity when no curve is given). The renderer reads
//! [`LightState`]s each frame; lights outside their window report zero
//! intensity.

use crate::curve::Curve;
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

fn default_intensity() -> f32 {
    1.0
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LightConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_color")]
    pub color: Vec3,
    #[serde(default = "default_intensity")]
    pub intensity: f32,
    /// Offset from the composite root, rotated with it.
    #[serde(default)]
    pub offset: Vec3,
    #[serde(default)]
    pub start: f32,
    #[serde(default)]
    pub duration: Option<f32>,
    #[serde(default)]
    pub intensity_curve: Option<Curve<f32>>,
}

fn default_color() -> Vec3 {
    Vec3::ONE
}

impl LightConfig {
    pub fn new(name: impl Into<String>, color: Vec3, intensity: f32) -> Self {
        Self {
            name: name.into(),
            color,
            intensity,
            offset: Vec3::ZERO,
            start: 0.0,
            duration: None,
            intensity_curve: None,
        }
    }

    pub fn with_window(mut self, start: f32, duration: f32) -> Self {
        self.start = start;
        self.duration = Some(duration);
        self
    }

    pub fn with_curve(mut self, curve: Curve<f32>) -> Self {
        self.intensity_curve = Some(curve);
        self
    }

    /// Intensity at `elapsed` seconds into the composite.
    pub fn intensity_at(&self, elapsed: f32) -> f32 {
        let age = elapsed - self.start;
        if age < 0.0 {
            return 0.0;
        }
        let t = match self.duration {
            Some(d) if age > d => return 0.0,
            Some(d) if d > 0.0 => age / d,
            _ => 0.0,
        };
        let scale = self.intensity_curve.as_ref().map_or(1.0, |c| c.evaluate(t));
        self.intensity * scale
    }
}

/// A light as the renderer sees it this frame.
#[derive(Clone, Debug, PartialEq)]
pub struct LightState {
    pub name: String,
    pub position: Vec3,
    pub color: Vec3,
    pub intensity: f32,
}

impl LightState {
    pub(crate) fn new(config: &LightConfig) -> Self {
        Self {
            name: config.name.clone(),
            position: config.offset,
            color: config.color,
            intensity: 0.0,
        }
    }

    pub(crate) fn update(
        &mut self,
        config: &LightConfig,
        root: Vec3,
        rotation: Quat,
        elapsed: f32,
    ) {
        self.position = root + rotation * config.offset;
        self.intensity = config.intensity_at(elapsed);
    }

    pub fn is_lit(&self) -> bool {
        self.intensity > 0.0
    }
}
