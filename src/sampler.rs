//! Deterministic random source for simulations.
//!
//! Every random decision in the engine flows through a [`Sampler`]. Two
//! samplers built from the same seed produce the same infinite stream, which
//! is what makes whole simulations reproducible frame for frame.
//!
//! The sampler implements [`rand::RngCore`], so the [`rand::Rng`] helpers
//! work on top of the same stream:
//!
//! ```ignore
//! use rand::Rng;
//!
//! let mut sampler = Sampler::new(42);
//! let dir = sampler.next_vec3_on_sphere();
//! let roll: u8 = sampler.gen_range(1..=6);
//! ```

use glam::{Quat, Vec3};
use rand::{Rng, RngCore};
use std::f32::consts::TAU;

/// Substitute state used when a seed folds down to zero.
const ZERO_SEED_REPLACEMENT: u32 = 0x9E37_79B9;

/// Squared length below which a rejection sample is considered degenerate.
const DEGENERATE_LENGTH_SQ: f32 = 1.0e-12;

/// Seeded pseudorandom generator with geometric sampling helpers.
///
/// Uses a 32-bit bit-mixing recurrence: cheap, stateless apart from one word,
/// and identical on every platform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sampler {
    seed: u32,
    state: u32,
}

impl Sampler {
    /// Create a sampler from an integer seed.
    ///
    /// The 64-bit seed is folded to 32 bits; a fold that lands on zero is
    /// replaced by a fixed non-zero constant.
    pub fn new(seed: u64) -> Self {
        let seed = fold_seed(seed);
        Self { seed, state: seed }
    }

    /// Re-seed in place. Afterwards the sampler is indistinguishable from
    /// `Sampler::new(seed)`.
    pub fn reset(&mut self, seed: u64) {
        *self = Self::new(seed);
    }

    /// The folded seed this sampler was built with.
    #[inline]
    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Derive an independent seed for a sub-stream (a layer, a child effect).
    ///
    /// Pure function of its inputs, so derived streams are reproducible.
    pub fn derive_seed(seed: u64, stream: u64) -> u64 {
        let mut z = seed
            .wrapping_add(stream.wrapping_mul(0x9E37_79B9_7F4A_7C15))
            .wrapping_add(0x9E37_79B9_7F4A_7C15);
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    // ========== Random primitives ==========

    /// Uniform float in `[0, 1)`.
    #[inline]
    pub fn next(&mut self) -> f32 {
        // 24 high bits fill the f32 mantissa exactly, so 1.0 is unreachable.
        (RngCore::next_u32(self) >> 8) as f32 * (1.0 / 16_777_216.0)
    }

    /// Uniform float in `[min, max)`. Returns `min` when the range is empty.
    #[inline]
    pub fn next_float(&mut self, min: f32, max: f32) -> f32 {
        min + (max - min) * self.next()
    }

    /// Uniform integer in `[min, max]` (both ends inclusive).
    ///
    /// Reversed bounds are swapped rather than rejected.
    pub fn next_int(&mut self, min: i32, max: i32) -> i32 {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        self.gen_range(lo..=hi)
    }

    /// Standard normal draw via the Box-Muller transform (two draws).
    pub fn next_gaussian(&mut self) -> f32 {
        // 1 - next() lies in (0, 1], keeping ln() finite.
        let u1 = 1.0 - self.next();
        let u2 = self.next();
        (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos()
    }

    // ========== Direction helpers ==========

    /// Uniformly distributed unit vector.
    ///
    /// Rejection-samples the unit ball, retrying on the degenerate near-zero
    /// sample, then normalizes.
    pub fn next_vec3_on_sphere(&mut self) -> Vec3 {
        loop {
            let v = Vec3::new(
                self.next() * 2.0 - 1.0,
                self.next() * 2.0 - 1.0,
                self.next() * 2.0 - 1.0,
            );
            let len_sq = v.length_squared();
            if len_sq > DEGENERATE_LENGTH_SQ && len_sq <= 1.0 {
                return v / len_sq.sqrt();
            }
        }
    }

    /// Unit vector inside a cone of `half_angle` radians around `axis`.
    ///
    /// Samples uniformly over the cone's solid angle. A zero axis falls back
    /// to +Y.
    pub fn next_vec3_in_cone(&mut self, half_angle: f32, axis: Vec3) -> Vec3 {
        let cos_max = half_angle.clamp(0.0, std::f32::consts::PI).cos();
        let cos_theta = 1.0 - self.next() * (1.0 - cos_max);
        let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
        let phi = TAU * self.next();
        let local = Vec3::new(sin_theta * phi.cos(), cos_theta, sin_theta * phi.sin());

        let axis = axis.try_normalize().unwrap_or(Vec3::Y);
        Quat::from_rotation_arc(Vec3::Y, axis) * local
    }

    // ========== Position helpers ==========

    /// Point uniformly distributed inside a ball of `radius`.
    pub fn next_vec3_in_sphere(&mut self, radius: f32) -> Vec3 {
        // Cube root for uniform volume distribution
        let r = radius * self.next().cbrt();
        self.next_vec3_on_sphere() * r
    }

    /// Point uniformly distributed inside an axis-aligned box centered on the
    /// origin with the given half extents.
    pub fn next_vec3_in_box(&mut self, half_extents: Vec3) -> Vec3 {
        Vec3::new(
            (self.next() * 2.0 - 1.0) * half_extents.x,
            (self.next() * 2.0 - 1.0) * half_extents.y,
            (self.next() * 2.0 - 1.0) * half_extents.z,
        )
    }
}

impl RngCore for Sampler {
    fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_add(0x6D2B_79F5);
        let mut t = self.state;
        t = (t ^ (t >> 15)).wrapping_mul(t | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        t ^ (t >> 14)
    }

    fn next_u64(&mut self) -> u64 {
        let hi = RngCore::next_u32(self) as u64;
        let lo = RngCore::next_u32(self) as u64;
        (hi << 32) | lo
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = RngCore::next_u32(self).to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

fn fold_seed(seed: u64) -> u32 {
    let folded = (seed ^ (seed >> 32)) as u32;
    if folded == 0 {
        ZERO_SEED_REPLACEMENT
    } else {
        folded
    }
}
