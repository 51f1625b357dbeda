//! Per-instance coloring, as the fractal shader computes it.
//!
//! Every instance of a draw blends between the two colors of the
//! [`PropertyBlock`]. The blend factor comes from the instance id stepped
//! through the draw's sequence numbers, so neighbouring instances get
//! unrelated shades instead of a smooth band.

use crate::render::PropertyBlock;
use glam::Vec4;

#[inline]
fn frac(x: f32) -> f32 {
    x - x.floor()
}

/// Color of instance `instance_id` within a draw.
///
/// RGB blends by `frac(id * seq.x + seq.y)`; alpha (used as smoothness)
/// blends independently by `frac(id * seq.z + seq.w)`.
pub fn instance_color(block: &PropertyBlock, instance_id: u32) -> Vec4 {
    let id = instance_id as f32;
    let seq = block.sequence_numbers;
    let rgb = block
        .color_a
        .truncate()
        .lerp(block.color_b.truncate(), frac(id * seq.x + seq.y));
    let alpha = block.color_a.w + (block.color_b.w - block.color_a.w) * frac(id * seq.z + seq.w);
    rgb.extend(alpha)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sequence_numbers_give_color_a() {
        let block = PropertyBlock {
            color_a: Vec4::new(0.1, 0.2, 0.3, 0.4),
            color_b: Vec4::ONE,
            sequence_numbers: Vec4::ZERO,
        };
        for id in 0..10 {
            assert_eq!(instance_color(&block, id), block.color_a);
        }
    }

    #[test]
    fn blend_factor_steps_with_instance_id() {
        let block = PropertyBlock {
            color_a: Vec4::ZERO,
            color_b: Vec4::ONE,
            sequence_numbers: Vec4::new(0.25, 0.0, 0.5, 0.25),
        };

        let c1 = instance_color(&block, 1);
        assert!(c1.abs_diff_eq(Vec4::new(0.25, 0.25, 0.25, 0.75), 1e-6));

        // Factors wrap around instead of leaving the 0..1 range.
        let c5 = instance_color(&block, 5);
        assert!(c5.abs_diff_eq(Vec4::new(0.25, 0.25, 0.25, 0.75), 1e-6));
    }

    #[test]
    fn colors_stay_between_the_pair() {
        let block = PropertyBlock {
            color_a: Vec4::new(0.2, 0.2, 0.2, 0.2),
            color_b: Vec4::new(0.8, 0.8, 0.8, 0.8),
            sequence_numbers: Vec4::new(0.731, 0.19, 0.377, 0.52),
        };
        for id in 0..1000 {
            let c = instance_color(&block, id);
            assert!(c.cmpge(Vec4::splat(0.2 - 1e-6)).all());
            assert!(c.cmple(Vec4::splat(0.8 + 1e-6)).all());
        }
    }
}
