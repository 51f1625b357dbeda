//! Fractal configuration.
//!
//! [`FractalConfig`] is plain data: it can be built in code, edited by the
//! viewer, or loaded from TOML. Missing TOML fields fall back to
//! [`FractalConfig::default`]. Angles are given in degrees here and
//! converted to radians when parts are created.

use crate::backend::{MaterialHandle, MeshHandle};
use crate::error::{FractalError, Result};
use crate::types::MAX_DEPTH;
use glam::Vec4;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Range of angles (or angular speeds) in degrees, sampled uniformly.
///
/// The bounds may be given in either order.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AngleRange {
    pub a: f32,
    pub b: f32,
}

impl AngleRange {
    pub const fn new(a: f32, b: f32) -> Self {
        Self { a, b }
    }

    /// Draws a value in degrees between the two bounds.
    pub fn sample(&self, rng: &mut impl Rng) -> f32 {
        let lo = self.a.min(self.b);
        let hi = self.a.max(self.b);
        if lo == hi {
            lo
        } else {
            rng.random_range(lo..=hi)
        }
    }

    fn validate(&self, name: &'static str, min: f32, max: f32) -> Result<()> {
        let ok = |v: f32| (min..=max).contains(&v);
        if ok(self.a) && ok(self.b) {
            Ok(())
        } else {
            Err(FractalError::InvalidAngleRange {
                name,
                a: self.a,
                b: self.b,
                min,
                max,
            })
        }
    }
}

/// One color stop of a [`Gradient`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColorKey {
    /// Position along the gradient in `0..=1`.
    pub time: f32,
    /// Linear RGBA; alpha is used as surface smoothness.
    pub color: Vec4,
}

/// Piecewise-linear color gradient.
///
/// Keys are kept sorted by time, whether the gradient is built in code or
/// deserialized.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "GradientKeys")]
pub struct Gradient {
    keys: Vec<ColorKey>,
}

#[derive(Deserialize)]
struct GradientKeys {
    keys: Vec<ColorKey>,
}

impl From<GradientKeys> for Gradient {
    fn from(raw: GradientKeys) -> Self {
        Self::new(raw.keys)
    }
}

impl Gradient {
    /// Creates a gradient, sorting the keys by time.
    pub fn new(mut keys: Vec<ColorKey>) -> Self {
        keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { keys }
    }

    /// Two-stop gradient from `from` at 0 to `to` at 1.
    pub fn linear(from: Vec4, to: Vec4) -> Self {
        Self::new(vec![
            ColorKey {
                time: 0.0,
                color: from,
            },
            ColorKey {
                time: 1.0,
                color: to,
            },
        ])
    }

    /// Samples the gradient at `t`.
    ///
    /// Values before the first key or after the last are clamped to those
    /// keys. An empty gradient evaluates to opaque black.
    pub fn evaluate(&self, t: f32) -> Vec4 {
        let (Some(first), Some(last)) = (self.keys.first(), self.keys.last()) else {
            return Vec4::new(0.0, 0.0, 0.0, 1.0);
        };
        if t <= first.time {
            return first.color;
        }
        if t >= last.time {
            return last.color;
        }
        for pair in self.keys.windows(2) {
            let (k0, k1) = (pair[0], pair[1]);
            if t <= k1.time {
                let span = k1.time - k0.time;
                if span <= 0.0 {
                    return k1.color;
                }
                return k0.color.lerp(k1.color, (t - k0.time) / span);
            }
        }
        last.color
    }

    /// Keys in time order.
    pub fn keys(&self) -> &[ColorKey] {
        &self.keys
    }
}

/// Everything needed to build and draw one fractal.
///
/// ### Fields
/// - `depth` - Number of levels, including the root level.
/// - `mesh` / `leaf_mesh` - Meshes for interior levels and for the deepest level.
/// - `material` - Material shared by every draw.
/// - `gradient_a` / `gradient_b` - Interior color pair, sampled by normalized level.
/// - `leaf_color_a` / `leaf_color_b` - Color pair for the deepest level.
/// - `sag_angle` - Maximum sag per node, degrees, within `0..=90`.
/// - `spin_speed` - Spin speed magnitude per node, degrees per second, within `0..=90`.
/// - `reverse_spin_chance` - Probability a node spins the other way.
/// - `seed` - Seed for part constants; `None` seeds from the OS.
/// - `batch_size` - Nodes per parallel work item.
/// - `worker_threads` - Size of the update pool; `None` lets rayon decide.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FractalConfig {
    pub depth: u32,
    pub mesh: MeshHandle,
    pub leaf_mesh: MeshHandle,
    pub material: MaterialHandle,
    pub gradient_a: Gradient,
    pub gradient_b: Gradient,
    pub leaf_color_a: Vec4,
    pub leaf_color_b: Vec4,
    pub sag_angle: AngleRange,
    pub spin_speed: AngleRange,
    pub reverse_spin_chance: f32,
    pub seed: Option<u64>,
    pub batch_size: usize,
    pub worker_threads: Option<usize>,
}

impl Default for FractalConfig {
    fn default() -> Self {
        Self {
            depth: 4,
            mesh: MeshHandle::BRANCH,
            leaf_mesh: MeshHandle::LEAF,
            material: MaterialHandle::DEFAULT,
            gradient_a: Gradient::linear(
                Vec4::new(0.35, 0.22, 0.12, 0.3),
                Vec4::new(0.55, 0.45, 0.25, 0.5),
            ),
            gradient_b: Gradient::linear(
                Vec4::new(0.25, 0.15, 0.08, 0.2),
                Vec4::new(0.45, 0.55, 0.25, 0.6),
            ),
            leaf_color_a: Vec4::new(0.3, 0.7, 0.2, 0.5),
            leaf_color_b: Vec4::new(0.6, 0.9, 0.3, 0.9),
            sag_angle: AngleRange::new(15.0, 25.0),
            spin_speed: AngleRange::new(20.0, 25.0),
            reverse_spin_chance: 0.25,
            seed: None,
            batch_size: 5,
            worker_threads: None,
        }
    }
}

impl FractalConfig {
    /// Parses a TOML document and validates it.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reads and parses a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let cfg = Self::from_toml_str(&text)?;
        log::info!("loaded fractal config from {}", path.as_ref().display());
        Ok(cfg)
    }

    /// Checks every setting against its allowed range.
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_DEPTH).contains(&self.depth) {
            return Err(FractalError::InvalidDepth {
                depth: self.depth,
                min: 1,
                max: MAX_DEPTH,
            });
        }
        self.sag_angle.validate("sag angle", 0.0, 90.0)?;
        self.spin_speed.validate("spin speed", 0.0, 90.0)?;
        if !(0.0..=1.0).contains(&self.reverse_spin_chance) {
            return Err(FractalError::InvalidProbability(self.reverse_spin_chance));
        }
        if self.batch_size == 0 {
            return Err(FractalError::InvalidBatchSize);
        }
        if self.gradient_a.keys().is_empty() {
            return Err(FractalError::EmptyGradient("a"));
        }
        if self.gradient_b.keys().is_empty() {
            return Err(FractalError::EmptyGradient("b"));
        }
        Ok(())
    }

    /// Number of levels as an index bound.
    #[inline]
    pub fn level_count(&self) -> usize {
        self.depth as usize
    }
}
