//! Per-frame update of the whole fractal.
//!
//! The update loop looks like:
//! 1. [`update_root`] - the root follows the external [`RootTransform`].
//! 2. [`update_levels`] - levels `1..depth` run the kernel in parallel,
//!    strictly in depth order, each level halving the scale.
//!
//! Rendering reads the matrix arrays only after [`update_levels`] returns.

use crate::level::LevelStore;
use crate::part::FractalPart;
use crate::schedule::LevelScheduler;
use crate::types::Float3x4;
use glam::{Quat, Vec3};

/// Transform of the object the fractal is attached to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RootTransform {
    pub position: Vec3,
    pub rotation: Quat,
    /// Uniform scale.
    pub scale: f32,
}

impl Default for RootTransform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: 1.0,
        }
    }
}

/// Scale of `level` for a fractal whose root has `root_scale`.
#[inline]
pub fn level_scale(root_scale: f32, level: usize) -> f32 {
    root_scale * 0.5f32.powi(level as i32)
}

/// Advances the root's spin and places it on `transform`.
///
/// ### Returns
/// The root's instance matrix, scaled by `transform.scale`.
pub fn update_root(root: &mut FractalPart, transform: &RootTransform, delta_time: f32) -> Float3x4 {
    root.spin_angle += root.spin_velocity * delta_time;
    root.world_rotation =
        transform.rotation * (root.local_rotation * Quat::from_rotation_y(root.spin_angle));
    root.world_position = transform.position;
    Float3x4::from_rotation_scale_translation(
        root.world_rotation,
        transform.scale,
        root.world_position,
    )
}

/// Updates every level of the fractal for one frame.
///
/// Level `i` starts only after level `i - 1` has completed, and reads the
/// parts level `i - 1` produced in this same call.
///
/// ### Parameters
/// - `levels` - All levels, root level first. Must not be empty.
/// - `transform` - External transform driving the root.
/// - `delta_time` - Seconds since the previous frame.
/// - `scheduler` - Pool used for the per-level parallel work.
pub fn update_levels(
    levels: &mut [LevelStore],
    transform: &RootTransform,
    delta_time: f32,
    scheduler: &LevelScheduler,
) {
    let Some(root_level) = levels.first_mut() else {
        return;
    };
    root_level.matrices[0] = update_root(&mut root_level.parts[0], transform, delta_time);

    for li in 1..levels.len() {
        let scale = level_scale(transform.scale, li);
        let (done, rest) = levels.split_at_mut(li);
        scheduler.run_level(&done[li - 1].parts, &mut rest[0], delta_time, scale);
    }
}
