//! Declarative value generators.
//!
//! A [`Distribution`] describes how to draw a scalar or vector from a
//! [`Sampler`]: a constant, a uniform range, or a normal distribution. The
//! operand type is fixed by the type parameter, so mixing a scalar minimum
//! with a vector maximum cannot be expressed.
//!
//! # JSON form
//!
//! ```json
//! { "type": "uniform", "min": 0.5, "max": 1.5 }
//! { "type": "normal", "mean": [0, 2, 0], "stddev": [0.1, 0.3, 0.1] }
//! 2.0
//! ```
//!
//! A bare value is shorthand for `{ "type": "constant", "value": ... }`.

use crate::sampler::Sampler;
use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// Values a [`Distribution`] can produce.
///
/// Vector implementations operate component-wise.
pub trait Sample: Copy {
    /// Uniform draw between `min` and `max`.
    fn uniform(min: Self, max: Self, sampler: &mut Sampler) -> Self;
    /// Normal draw with the given mean and standard deviation.
    fn normal(mean: Self, stddev: Self, sampler: &mut Sampler) -> Self;
}

impl Sample for f32 {
    fn uniform(min: Self, max: Self, sampler: &mut Sampler) -> Self {
        sampler.next_float(min, max)
    }

    fn normal(mean: Self, stddev: Self, sampler: &mut Sampler) -> Self {
        mean + stddev * sampler.next_gaussian()
    }
}

impl Sample for Vec3 {
    fn uniform(min: Self, max: Self, sampler: &mut Sampler) -> Self {
        Vec3::new(
            f32::uniform(min.x, max.x, sampler),
            f32::uniform(min.y, max.y, sampler),
            f32::uniform(min.z, max.z, sampler),
        )
    }

    fn normal(mean: Self, stddev: Self, sampler: &mut Sampler) -> Self {
        Vec3::new(
            f32::normal(mean.x, stddev.x, sampler),
            f32::normal(mean.y, stddev.y, sampler),
            f32::normal(mean.z, stddev.z, sampler),
        )
    }
}

impl Sample for Vec4 {
    fn uniform(min: Self, max: Self, sampler: &mut Sampler) -> Self {
        Vec4::new(
            f32::uniform(min.x, max.x, sampler),
            f32::uniform(min.y, max.y, sampler),
            f32::uniform(min.z, max.z, sampler),
            f32::uniform(min.w, max.w, sampler),
        )
    }

    fn normal(mean: Self, stddev: Self, sampler: &mut Sampler) -> Self {
        Vec4::new(
            f32::normal(mean.x, stddev.x, sampler),
            f32::normal(mean.y, stddev.y, sampler),
            f32::normal(mean.z, stddev.z, sampler),
            f32::normal(mean.w, stddev.w, sampler),
        )
    }
}

/// A rule for drawing a value of type `T`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "snake_case",
    from = "DistributionRepr<T>",
    bound(deserialize = "T: Deserialize<'de>")
)]
pub enum Distribution<T> {
    /// Always the same value. Consumes no randomness.
    Constant { value: T },
    /// Uniform between `min` and `max` (component-wise for vectors).
    Uniform { min: T, max: T },
    /// Normal with `mean` and `stddev`, two sampler draws per scalar.
    Normal { mean: T, stddev: T },
}

impl<T: Sample> Distribution<T> {
    /// Constant distribution.
    pub fn constant(value: T) -> Self {
        Distribution::Constant { value }
    }

    /// Uniform distribution.
    pub fn uniform(min: T, max: T) -> Self {
        Distribution::Uniform { min, max }
    }

    /// Normal distribution.
    pub fn normal(mean: T, stddev: T) -> Self {
        Distribution::Normal { mean, stddev }
    }

    /// Draw one value. Identical sampler state yields an identical value.
    pub fn sample(&self, sampler: &mut Sampler) -> T {
        match *self {
            Distribution::Constant { value } => value,
            Distribution::Uniform { min, max } => T::uniform(min, max, sampler),
            Distribution::Normal { mean, stddev } => T::normal(mean, stddev, sampler),
        }
    }

    /// Apply `f` to every operand, keeping the variant.
    pub fn map(self, f: impl Fn(T) -> T) -> Self {
        match self {
            Distribution::Constant { value } => Distribution::Constant { value: f(value) },
            Distribution::Uniform { min, max } => Distribution::Uniform {
                min: f(min),
                max: f(max),
            },
            Distribution::Normal { mean, stddev } => Distribution::Normal {
                mean: f(mean),
                stddev,
            },
        }
    }
}

impl Distribution<f32> {
    /// Largest value this distribution realistically produces.
    ///
    /// Normal distributions report `mean + 3 * stddev`.
    pub fn upper_bound(&self) -> f32 {
        match *self {
            Distribution::Constant { value } => value,
            Distribution::Uniform { min, max } => min.max(max),
            Distribution::Normal { mean, stddev } => mean + 3.0 * stddev.abs(),
        }
    }
}

impl<T: Sample> From<T> for Distribution<T> {
    fn from(value: T) -> Self {
        Distribution::Constant { value }
    }
}

impl<T: Sample + Default> Default for Distribution<T> {
    fn default() -> Self {
        Distribution::Constant { value: T::default() }
    }
}

/// Accepts both a bare value and the tagged object form.
#[derive(Deserialize)]
#[serde(untagged)]
enum DistributionRepr<T> {
    Fixed(T),
    Tagged(TaggedDistribution<T>),
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum TaggedDistribution<T> {
    Constant { value: T },
    Uniform { min: T, max: T },
    Normal { mean: T, stddev: T },
}

impl<T> From<DistributionRepr<T>> for Distribution<T> {
    fn from(repr: DistributionRepr<T>) -> Self {
        match repr {
            DistributionRepr::Fixed(value) => Distribution::Constant { value },
            DistributionRepr::Tagged(TaggedDistribution::Constant { value }) => {
                Distribution::Constant { value }
            }
            DistributionRepr::Tagged(TaggedDistribution::Uniform { min, max }) => {
                Distribution::Uniform { min, max }
            }
            DistributionRepr::Tagged(TaggedDistribution::Normal { mean, stddev }) => {
                Distribution::Normal { mean, stddev }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_consumes_nothing() {
        let mut sampler = Sampler::new(1);
        let before = sampler.clone();
        assert_eq!(Distribution::constant(3.5f32).sample(&mut sampler), 3.5);
        assert_eq!(sampler, before);
    }

    #[test]
    fn test_uniform_scalar_in_range() {
        let mut sampler = Sampler::new(2);
        let dist = Distribution::uniform(2.0f32, 4.0);
        for _ in 0..1_000 {
            let v = dist.sample(&mut sampler);
            assert!((2.0..4.0).contains(&v));
        }
    }

    #[test]
    fn test_uniform_vector_component_wise() {
        let mut sampler = Sampler::new(3);
        let dist = Distribution::uniform(Vec3::new(-1.0, 5.0, 0.0), Vec3::new(1.0, 6.0, 0.0));
        for _ in 0..500 {
            let v = dist.sample(&mut sampler);
            assert!(v.x >= -1.0 && v.x < 1.0);
            assert!(v.y >= 5.0 && v.y < 6.0);
            assert_eq!(v.z, 0.0);
        }
    }

    #[test]
    fn test_normal_statistics() {
        let mut sampler = Sampler::new(4);
        let dist = Distribution::normal(10.0f32, 2.0);
        let n = 20_000;
        let samples: Vec<f32> = (0..n).map(|_| dist.sample(&mut sampler)).collect();
        let mean = samples.iter().sum::<f32>() / n as f32;
        let var = samples.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / n as f32;
        assert!((mean - 10.0).abs() < 0.1, "mean was {mean}");
        assert!((var.sqrt() - 2.0).abs() < 0.1, "stddev was {}", var.sqrt());
    }

    #[test]
    fn test_same_state_same_value() {
        let dist = Distribution::normal(Vec3::ZERO, Vec3::ONE);
        let mut a = Sampler::new(9);
        let mut b = Sampler::new(9);
        assert_eq!(dist.sample(&mut a), dist.sample(&mut b));
    }

    #[test]
    fn test_deserialize_shorthand_and_tagged() {
        let d: Distribution<f32> = serde_json::from_str("2.5").unwrap();
        assert_eq!(d, Distribution::constant(2.5));

        let d: Distribution<f32> =
            serde_json::from_str(r#"{ "type": "uniform", "min": 1, "max": 2 }"#).unwrap();
        assert_eq!(d, Distribution::uniform(1.0, 2.0));

        let d: Distribution<Vec3> =
            serde_json::from_str(r#"{ "type": "normal", "mean": [0, 1, 0], "stddev": [1, 1, 1] }"#)
                .unwrap();
        assert_eq!(d, Distribution::normal(Vec3::Y, Vec3::ONE));
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let result: Result<Distribution<f32>, _> =
            serde_json::from_str(r#"{ "type": "poisson", "lambda": 3 }"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_serialized_form_reloads() {
        let d = Distribution::uniform(0.5f32, 0.75);
        let json = serde_json::to_string(&d).unwrap();
        assert!(json.contains("\"type\":\"uniform\""));
        let back: Distribution<f32> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
    }

    #[test]
    fn test_upper_bound_and_map() {
        assert_eq!(Distribution::uniform(3.0f32, 8.0).upper_bound(), 8.0);
        assert_eq!(Distribution::normal(1.0f32, 0.5).upper_bound(), 2.5);
        let clamped = Distribution::uniform(3.0f32, 8.0).map(|v| v.min(5.0));
        assert_eq!(clamped, Distribution::uniform(3.0, 5.0));
    }
}
