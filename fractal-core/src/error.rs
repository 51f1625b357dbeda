//! Error types for fractal configuration and setup.
//!
//! Per-frame work (kernel, pipeline, rendering) never fails; everything in
//! here is reported when a configuration is loaded or a [`crate::fractal::Fractal`]
//! is created or reconfigured.

use thiserror::Error;

/// Errors that can occur while configuring a fractal.
#[derive(Error, Debug)]
pub enum FractalError {
    /// Depth outside the supported range.
    #[error("invalid depth {depth}: must be in {min}..={max}")]
    InvalidDepth {
        /// Requested depth.
        depth: u32,
        /// Smallest allowed depth.
        min: u32,
        /// Largest allowed depth.
        max: u32,
    },

    /// An angle range has a bound outside its allowed interval.
    #[error("invalid {name} range {a}..{b}: bounds must be within {min}..={max} degrees")]
    InvalidAngleRange {
        /// Which setting was rejected.
        name: &'static str,
        /// First bound.
        a: f32,
        /// Second bound.
        b: f32,
        /// Lowest allowed bound.
        min: f32,
        /// Highest allowed bound.
        max: f32,
    },

    /// Probability outside `0..=1`.
    #[error("invalid reverse spin chance {0}: must be in 0..=1")]
    InvalidProbability(f32),

    /// Batch size of zero.
    #[error("batch size must be at least 1")]
    InvalidBatchSize,

    /// Gradient without any color keys.
    #[error("gradient {0} has no color keys")]
    EmptyGradient(&'static str),

    /// Config file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid TOML for [`crate::config::FractalConfig`].
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Worker pool could not be started.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Result type for fractal operations.
pub type Result<T> = std::result::Result<T, FractalError>;
