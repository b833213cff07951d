//! Effect documents.
//!
//! An [`EffectSpec`] is the persisted form of an effect: a seed, optional
//! resource limits, and the composite description. It round-trips through
//! JSON so effects can be authored by hand or by tools.
//!
//! ```json
//! {
//!   "seed": 42,
//!   "effect": {
//!     "name": "campfire",
//!     "layers": [
//!       { "name": "flames", "simulation": { "capacity": 500, "emitters": [ ... ] } }
//!     ]
//!   }
//! }
//! ```

use crate::composite::{Composite, CompositeConfig};
use crate::error::Result;
use crate::limits::{LimitAdjustment, Limits};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

fn default_seed() -> u64 {
    1
}

/// A complete, loadable effect.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EffectSpec {
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Overrides the default resource limits.
    #[serde(default)]
    pub limits: Limits,
    pub effect: CompositeConfig,
}

impl EffectSpec {
    pub fn new(effect: CompositeConfig, seed: u64) -> Self {
        Self {
            seed,
            limits: Limits::default(),
            effect,
        }
    }

    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        let spec: EffectSpec = serde_json::from_str(json)?;
        spec.effect.validate()?;
        Ok(spec)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load an effect from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Save the effect as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Clamp the effect to its limits, returning what changed.
    pub fn clamp(&mut self) -> Vec<LimitAdjustment> {
        self.limits.clamp_composite(&mut self.effect)
    }

    /// Instantiate the effect with its own seed.
    pub fn build(&self) -> Result<Composite> {
        self.build_with_seed(self.seed)
    }

    pub fn build_with_seed(&self, seed: u64) -> Result<Composite> {
        Composite::with_limits(&self.effect, seed, self.limits.clone())
    }
}
