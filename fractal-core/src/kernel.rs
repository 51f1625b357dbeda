//! Per-node update kernel.
//!
//! [`update_part`] is the unit of parallel work: it reads one parent and
//! rewrites one child, touching nothing else, so every node of a level can
//! be updated concurrently.

use crate::part::FractalPart;
use crate::types::Float3x4;
use glam::{Quat, Vec3};

/// Distance from a parent's origin to its children, before level scaling.
pub const CHILD_OFFSET: f32 = 1.5;

/// Recomputes `part`'s world transform from `parent` and returns its matrix.
///
/// The update is:
///
/// 1. Advance the spin angle by `spin_velocity * delta_time`.
/// 2. Find the part's nominal up direction
///    (`parent.world_rotation * local_rotation` applied to +Y).
/// 3. Sag the branch about `Y × up` by `max_sag_angle * |Y × up|`, so
///    vertical branches don't sag and horizontal ones sag the most. A
///    perfectly vertical branch skips the sag entirely and uses the
///    parent's rotation as its base.
/// 4. Compose `base * local_rotation * spin` into the world rotation.
/// 5. Place the part `CHILD_OFFSET * scale` along its own up axis from the
///    parent.
///
/// ### Parameters
/// - `parent` - Parent part, already updated this frame.
/// - `part` - Part to update in place.
/// - `delta_time` - Seconds since the previous frame.
/// - `scale` - Uniform scale of this part's level.
///
/// ### Returns
/// The part's instance matrix: world rotation scaled by `scale`, translated
/// to the world position.
#[inline]
pub fn update_part(
    parent: &FractalPart,
    part: &mut FractalPart,
    delta_time: f32,
    scale: f32,
) -> Float3x4 {
    let mut p = *part;

    p.spin_angle += p.spin_velocity * delta_time;

    let up_axis = parent.world_rotation * p.local_rotation * Vec3::Y;
    let mut sag_axis = Vec3::Y.cross(up_axis);
    let sag_magnitude = sag_axis.length();

    let base_rotation = if sag_magnitude > 0.0 {
        sag_axis /= sag_magnitude;
        let sag_rotation = Quat::from_axis_angle(sag_axis, p.max_sag_angle * sag_magnitude);
        sag_rotation * parent.world_rotation
    } else {
        parent.world_rotation
    };

    p.world_rotation = base_rotation * (p.local_rotation * Quat::from_rotation_y(p.spin_angle));
    p.world_position =
        parent.world_position + p.world_rotation * Vec3::new(0.0, CHILD_OFFSET * scale, 0.0);

    *part = p;
    Float3x4::from_rotation_scale_translation(p.world_rotation, scale, p.world_position)
}
