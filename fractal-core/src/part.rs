use crate::config::FractalConfig;
use crate::types::BRANCH_FACTOR;
use glam::{Quat, Vec3};
use rand::Rng;
use std::f32::consts::FRAC_PI_2;

/// Per-node state of the fractal.
///
/// `local_rotation`, `max_sag_angle` and `spin_velocity` are fixed when the
/// part is created. `world_rotation` and `world_position` are rewritten every
/// frame from the parent, and `spin_angle` accumulates over time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FractalPart {
    pub local_rotation: Quat,
    pub world_rotation: Quat,
    pub world_position: Vec3,
    /// Radians.
    pub max_sag_angle: f32,
    /// Radians, unbounded.
    pub spin_angle: f32,
    /// Radians per second.
    pub spin_velocity: f32,
}

impl Default for FractalPart {
    fn default() -> Self {
        Self {
            local_rotation: Quat::IDENTITY,
            world_rotation: Quat::IDENTITY,
            world_position: Vec3::ZERO,
            max_sag_angle: 0.0,
            spin_angle: 0.0,
            spin_velocity: 0.0,
        }
    }
}

/// Local orientation of each child slot: one pointing up, four to the sides.
///
/// ### Panics
/// Panics if `slot >= BRANCH_FACTOR`.
pub fn child_rotation(slot: usize) -> Quat {
    match slot {
        0 => Quat::IDENTITY,
        1 => Quat::from_rotation_z(-FRAC_PI_2),
        2 => Quat::from_rotation_z(FRAC_PI_2),
        3 => Quat::from_rotation_x(FRAC_PI_2),
        4 => Quat::from_rotation_x(-FRAC_PI_2),
        _ => panic!("child slot {slot} out of range 0..{BRANCH_FACTOR}"),
    }
}

impl FractalPart {
    /// Creates a part for child `slot`, drawing its sag and spin constants.
    ///
    /// ### Parameters
    /// - `slot` - Child slot in `0..BRANCH_FACTOR`; picks the local rotation.
    /// - `cfg` - Provides the sag range, spin range and reverse-spin chance.
    /// - `rng` - Source of the per-part random draws.
    ///
    /// ### Panics
    /// Panics if `slot` is not a valid child slot.
    pub fn new(slot: usize, cfg: &FractalConfig, rng: &mut impl Rng) -> Self {
        let max_sag_angle = cfg.sag_angle.sample(rng).to_radians();
        let direction = if rng.random::<f32>() < cfg.reverse_spin_chance {
            -1.0
        } else {
            1.0
        };
        let spin_velocity = direction * cfg.spin_speed.sample(rng).to_radians();

        Self {
            local_rotation: child_rotation(slot),
            max_sag_angle,
            spin_velocity,
            ..Self::default()
        }
    }
}
