//! Error types for effect construction and loading.
//!
//! Errors only ever surface while an effect is being built or loaded. Once a
//! [`Simulation`](crate::Simulation) or [`Composite`](crate::Composite) exists,
//! `update` is infallible: capacity exhaustion drops emissions silently and
//! numerical degeneracies resolve to zero force.

use std::io;
use thiserror::Error;

/// Errors raised while building or loading an effect.
#[derive(Error, Debug)]
pub enum EffectError {
    /// The effect document is not valid JSON, or names an unknown tag
    /// (force kind, emitter shape, distribution, event kind).
    #[error("Failed to parse effect description: {0}")]
    Parse(#[from] serde_json::Error),

    /// Failed to read or write an effect file.
    #[error("Failed to access effect file: {0}")]
    Io(#[from] io::Error),

    /// A curve was declared without any keyframes.
    #[error("Curve has no keyframes")]
    EmptyCurve,

    /// A timeline event or lookup referenced a layer that does not exist.
    #[error("Unknown layer: {0}")]
    UnknownLayer(String),

    /// Any other structurally invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type using [`EffectError`].
pub type Result<T> = std::result::Result<T, EffectError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = EffectError::EmptyCurve;
        assert_eq!(err.to_string(), "Curve has no keyframes");

        let err = EffectError::UnknownLayer("trail".into());
        assert_eq!(err.to_string(), "Unknown layer: trail");
    }

    #[test]
    fn test_parse_error_converts() {
        let parse = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: EffectError = parse.into();
        assert!(matches!(err, EffectError::Parse(_)));
    }
}
