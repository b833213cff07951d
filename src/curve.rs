//! Keyframe curves over normalized age.
//!
//! A [`Curve`] maps `t` in `[0, 1]` to a value by interpolating between
//! keyframes. Curves drive per-particle visuals (size, color, opacity,
//! velocity scaling) as well as root motion paths and light intensity.
//!
//! Keyframes are sorted once when the curve is built; evaluation never
//! mutates, so one curve can be shared across every particle in a frame.
//!
//! # Example
//!
//! ```ignore
//! let fade = Curve::new(vec![
//!     Keyframe::new(0.0, 0.0),
//!     Keyframe::new(0.1, 1.0),
//!     Keyframe::new(1.0, 0.0).with_interpolation(Interpolation::EaseInOut),
//! ])?;
//! let opacity = fade.evaluate(particle.normalized_age());
//! ```

use crate::error::{EffectError, Result};
use glam::{Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// Control values of the fixed cubic bezier easing.
const BEZIER_P1: f32 = 0.1;
const BEZIER_P2: f32 = 1.0;

/// Shape of the transition from a keyframe to the next one.
///
/// The *left* keyframe's interpolation governs each segment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    #[default]
    Linear,
    /// Cubic ease-in-out.
    EaseInOut,
    /// Holds the left value until the segment midpoint, then jumps.
    Step,
    /// Cubic bezier easing with fixed control values.
    Bezier,
}

impl Interpolation {
    /// Remap a local segment parameter in `[0, 1]`.
    pub fn apply(self, t: f32) -> f32 {
        match self {
            Interpolation::Linear => t,
            Interpolation::EaseInOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    let u = -2.0 * t + 2.0;
                    1.0 - u * u * u / 2.0
                }
            }
            Interpolation::Step => {
                if t < 0.5 {
                    0.0
                } else {
                    1.0
                }
            }
            Interpolation::Bezier => {
                let u = 1.0 - t;
                3.0 * u * u * t * BEZIER_P1 + 3.0 * u * t * t * BEZIER_P2 + t * t * t
            }
        }
    }
}

/// Values a curve can interpolate.
pub trait Lerp: Copy {
    fn lerp(a: Self, b: Self, t: f32) -> Self;
}

impl Lerp for f32 {
    #[inline]
    fn lerp(a: Self, b: Self, t: f32) -> Self {
        a + (b - a) * t
    }
}

impl Lerp for Vec2 {
    #[inline]
    fn lerp(a: Self, b: Self, t: f32) -> Self {
        a.lerp(b, t)
    }
}

impl Lerp for Vec3 {
    #[inline]
    fn lerp(a: Self, b: Self, t: f32) -> Self {
        a.lerp(b, t)
    }
}

impl Lerp for Vec4 {
    #[inline]
    fn lerp(a: Self, b: Self, t: f32) -> Self {
        a.lerp(b, t)
    }
}

/// One control point of a [`Curve`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Keyframe<T> {
    pub time: f32,
    pub value: T,
    #[serde(default)]
    pub interpolation: Interpolation,
}

impl<T> Keyframe<T> {
    /// Linear keyframe at `time`.
    pub fn new(time: f32, value: T) -> Self {
        Self {
            time,
            value,
            interpolation: Interpolation::Linear,
        }
    }

    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }
}

/// Keyframe-interpolated function of normalized time.
///
/// Always holds at least one keyframe, sorted by time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "Vec<Keyframe<T>>",
    into = "Vec<Keyframe<T>>",
    bound(
        serialize = "T: Serialize + Clone",
        deserialize = "T: Deserialize<'de>"
    )
)]
pub struct Curve<T> {
    keyframes: Vec<Keyframe<T>>,
}

impl<T: Lerp> Curve<T> {
    /// Build a curve, sorting keyframes by time.
    ///
    /// Times are clamped into `[0, 1]`; keyframes sharing a time keep their
    /// declaration order. An empty keyframe list is rejected.
    pub fn new(keyframes: Vec<Keyframe<T>>) -> Result<Self> {
        Self::from_keyframes(keyframes)
    }

    /// A curve that returns `value` everywhere.
    pub fn constant(value: T) -> Self {
        Self {
            keyframes: vec![Keyframe::new(0.0, value)],
        }
    }

    /// Straight linear ramp from `from` at 0 to `to` at 1.
    pub fn linear(from: T, to: T) -> Self {
        Self {
            keyframes: vec![Keyframe::new(0.0, from), Keyframe::new(1.0, to)],
        }
    }

    /// Value at `t`, clamped into `[0, 1]`.
    pub fn evaluate(&self, t: f32) -> T {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let first = &self.keyframes[0];
        if self.keyframes.len() == 1 || t <= first.time {
            return first.value;
        }
        let last = &self.keyframes[self.keyframes.len() - 1];
        if t >= last.time {
            return last.value;
        }

        // First keyframe strictly after t; always in 1..len here.
        let right = self.keyframes.partition_point(|k| k.time <= t);
        let a = &self.keyframes[right - 1];
        let b = &self.keyframes[right];
        let span = b.time - a.time;
        let local = if span > 0.0 { (t - a.time) / span } else { 1.0 };
        T::lerp(a.value, b.value, a.interpolation.apply(local))
    }
}

impl<T> Curve<T> {
    fn from_keyframes(mut keyframes: Vec<Keyframe<T>>) -> Result<Self> {
        if keyframes.is_empty() {
            return Err(EffectError::EmptyCurve);
        }
        for k in &mut keyframes {
            k.time = if k.time.is_nan() { 0.0 } else { k.time.clamp(0.0, 1.0) };
        }
        keyframes.sort_by(|a, b| a.time.total_cmp(&b.time));
        Ok(Self { keyframes })
    }

    pub fn keyframes(&self) -> &[Keyframe<T>] {
        &self.keyframes
    }
}

impl<T> TryFrom<Vec<Keyframe<T>>> for Curve<T> {
    type Error = EffectError;

    fn try_from(keyframes: Vec<Keyframe<T>>) -> Result<Self> {
        Self::from_keyframes(keyframes)
    }
}

impl<T> From<Curve<T>> for Vec<Keyframe<T>> {
    fn from(curve: Curve<T>) -> Self {
        curve.keyframes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Curve<f32> {
        Curve::new(vec![
            Keyframe::new(0.0, 0.0),
            Keyframe::new(0.5, 1.0),
            Keyframe::new(1.0, 0.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_linear_triangle_exact() {
        let curve = triangle();
        assert_eq!(curve.evaluate(0.25), 0.5);
        assert_eq!(curve.evaluate(0.5), 1.0);
        assert_eq!(curve.evaluate(0.75), 0.5);
    }

    #[test]
    fn test_clamps_outside_range() {
        let curve = triangle();
        assert_eq!(curve.evaluate(-1.0), 0.0);
        assert_eq!(curve.evaluate(2.0), 0.0);
        assert_eq!(curve.evaluate(f32::NAN), 0.0);
    }

    #[test]
    fn test_single_keyframe_everywhere() {
        let curve = Curve::new(vec![Keyframe::new(0.3, 7.0)]).unwrap();
        for t in [-1.0, 0.0, 0.3, 0.9, 5.0] {
            assert_eq!(curve.evaluate(t), 7.0);
        }
    }

    #[test]
    fn test_empty_rejected() {
        let result = Curve::<f32>::new(Vec::new());
        assert!(matches!(result, Err(EffectError::EmptyCurve)));
    }

    #[test]
    fn test_sorted_on_construction() {
        let curve = Curve::new(vec![
            Keyframe::new(1.0, 10.0),
            Keyframe::new(0.0, 0.0),
            Keyframe::new(0.5, 5.0),
        ])
        .unwrap();
        let times: Vec<f32> = curve.keyframes().iter().map(|k| k.time).collect();
        assert_eq!(times, vec![0.0, 0.5, 1.0]);
        assert_eq!(curve.evaluate(0.25), 2.5);
    }

    #[test]
    fn test_values_beyond_end_keyframes() {
        let curve = Curve::new(vec![Keyframe::new(0.2, 1.0), Keyframe::new(0.8, 3.0)]).unwrap();
        assert_eq!(curve.evaluate(0.1), 1.0);
        assert_eq!(curve.evaluate(0.9), 3.0);
        assert!((curve.evaluate(0.5) - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_step_at_midpoint() {
        let curve = Curve::new(vec![
            Keyframe::new(0.0, 0.0).with_interpolation(Interpolation::Step),
            Keyframe::new(1.0, 10.0),
        ])
        .unwrap();
        assert_eq!(curve.evaluate(0.49), 0.0);
        assert_eq!(curve.evaluate(0.5), 10.0);
    }

    #[test]
    fn test_left_keyframe_governs_segment() {
        let curve = Curve::new(vec![
            Keyframe::new(0.0, 0.0),
            Keyframe::new(0.5, 1.0).with_interpolation(Interpolation::Step),
            Keyframe::new(1.0, 2.0),
        ])
        .unwrap();
        assert_eq!(curve.evaluate(0.25), 0.5);
        assert_eq!(curve.evaluate(0.7), 1.0);
    }

    #[test]
    fn test_easings_hit_endpoints() {
        for interp in [
            Interpolation::Linear,
            Interpolation::EaseInOut,
            Interpolation::Bezier,
        ] {
            assert!(interp.apply(0.0).abs() < 1e-6);
            assert!((interp.apply(1.0) - 1.0).abs() < 1e-6);
        }
        assert_eq!(Interpolation::EaseInOut.apply(0.5), 0.5);
    }

    #[test]
    fn test_vector_curves() {
        let color = Curve::linear(Vec4::new(1.0, 0.0, 0.0, 1.0), Vec4::new(0.0, 0.0, 1.0, 0.0));
        assert_eq!(color.evaluate(0.5), Vec4::new(0.5, 0.0, 0.5, 0.5));

        let path = Curve::linear(Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0));
        assert_eq!(path.evaluate(0.5).x, 5.0);
    }

    #[test]
    fn test_deserialize_sorts_and_validates() {
        let curve: Curve<f32> = serde_json::from_str(
            r#"[{ "time": 1, "value": 0 }, { "time": 0, "value": 1, "interpolation": "ease_in_out" }]"#,
        )
        .unwrap();
        assert_eq!(curve.keyframes()[0].interpolation, Interpolation::EaseInOut);
        assert_eq!(curve.evaluate(0.0), 1.0);

        let empty: std::result::Result<Curve<f32>, _> = serde_json::from_str("[]");
        assert!(empty.is_err());
    }
}
