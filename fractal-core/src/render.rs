//! Upload and draw of the per-level matrix arrays.
//!
//! Every level owns one instance buffer sized exactly to the level. Each
//! frame, after the update has finished, [`draw_levels`] uploads every
//! level's matrices and issues one instanced draw per level.

use crate::backend::{Bounds, DrawCall, InstanceBackend, InstanceBuffer, MeshHandle};
use crate::config::FractalConfig;
use crate::level::LevelStore;
use glam::{Vec3, Vec4};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rand::Rng;

/// Per-draw overrides handed to the shader alongside the instance buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PropertyBlock {
    pub color_a: Vec4,
    pub color_b: Vec4,
    pub sequence_numbers: Vec4,
}

/// Property block shared by every fractal in the process.
///
/// Created on first use. Each draw holds the lock only while it fills the
/// block and submits.
static PROPERTY_BLOCK: Lazy<Mutex<PropertyBlock>> =
    Lazy::new(|| Mutex::new(PropertyBlock::default()));

pub fn shared_property_block() -> &'static Mutex<PropertyBlock> {
    &PROPERTY_BLOCK
}

/// Mesh and colors used to draw one level.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LevelAppearance {
    pub mesh: MeshHandle,
    pub color_a: Vec4,
    pub color_b: Vec4,
}

/// Picks the appearance of `level` out of `level_count` levels.
///
/// The deepest level is drawn with the leaf mesh and leaf colors. Other
/// levels use the shared mesh and sample both gradients at
/// `level / (level_count - 2)`, so the first level gets the start of the
/// gradients and the last interior level gets the end.
pub fn level_appearance(cfg: &FractalConfig, level: usize, level_count: usize) -> LevelAppearance {
    if level + 1 == level_count {
        return LevelAppearance {
            mesh: cfg.leaf_mesh,
            color_a: cfg.leaf_color_a,
            color_b: cfg.leaf_color_b,
        };
    }

    let t = if level_count > 2 {
        level as f32 / (level_count - 2) as f32
    } else {
        0.0
    };
    LevelAppearance {
        mesh: cfg.mesh,
        color_a: cfg.gradient_a.evaluate(t),
        color_b: cfg.gradient_b.evaluate(t),
    }
}

/// Draw bounds: a cube of edge `3 * root_scale` around the root.
pub fn fractal_bounds(root_position: Vec3, root_scale: f32) -> Bounds {
    Bounds::from_center_size(root_position, Vec3::splat(3.0 * root_scale))
}

/// Random per-level shader inputs, each component in `0..1`.
pub fn random_sequence_numbers(rng: &mut impl Rng) -> Vec4 {
    Vec4::new(rng.random(), rng.random(), rng.random(), rng.random())
}

/// Uploads every level's matrices and draws each level once.
///
/// ### Parameters
/// - `backend` - Renderer receiving the draws.
/// - `cfg` - Source of meshes, material and colors.
/// - `levels` - Levels whose matrices were written this frame.
/// - `buffers` - One buffer per level, sized to the level.
/// - `sequence_numbers` - One tuple per level, passed through unchanged.
/// - `bounds` - Bounding volume shared by all draws.
///
/// ### Returns
/// Number of draw calls issued, which equals the number of levels.
pub fn draw_levels<B: InstanceBackend>(
    backend: &mut B,
    cfg: &FractalConfig,
    levels: &[LevelStore],
    buffers: &mut [B::Buffer],
    sequence_numbers: &[Vec4],
    bounds: Bounds,
) -> usize {
    draw_levels_with(
        shared_property_block(),
        backend,
        cfg,
        levels,
        buffers,
        sequence_numbers,
        bounds,
    )
}

fn draw_levels_with<B: InstanceBackend>(
    property_block: &Mutex<PropertyBlock>,
    backend: &mut B,
    cfg: &FractalConfig,
    levels: &[LevelStore],
    buffers: &mut [B::Buffer],
    sequence_numbers: &[Vec4],
    bounds: Bounds,
) -> usize {
    debug_assert_eq!(levels.len(), buffers.len());
    debug_assert_eq!(levels.len(), sequence_numbers.len());

    let mut draws = 0;

    for (li, ((level, buffer), &seq)) in levels
        .iter()
        .zip(buffers.iter_mut())
        .zip(sequence_numbers)
        .enumerate()
    {
        buffer.upload(&level.matrices);
        let appearance = level_appearance(cfg, li, levels.len());

        let mut block = property_block.lock();
        block.color_a = appearance.color_a;
        block.color_b = appearance.color_b;
        block.sequence_numbers = seq;

        backend.draw_instanced(DrawCall {
            mesh: appearance.mesh,
            material: cfg.material,
            buffer: &*buffer,
            properties: &*block,
            bounds,
            instance_count: buffer.count(),
        });
        drop(block);
        draws += 1;
    }

    draws
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RecordingBackend;
    use crate::config::Gradient;
    use crate::level::build_levels;
    use crate::types::Float3x4;
    use glam::Quat;
    use rand::{SeedableRng, rngs::StdRng};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Backend that notes whether the property block is locked during
    /// uploads and draws.
    struct LockWatch {
        block: Arc<Mutex<PropertyBlock>>,
        uploads_while_locked: Arc<AtomicUsize>,
        draws_while_locked: usize,
    }

    struct WatchedBuffer {
        count: usize,
        block: Arc<Mutex<PropertyBlock>>,
        uploads_while_locked: Arc<AtomicUsize>,
    }

    impl InstanceBuffer for WatchedBuffer {
        fn count(&self) -> usize {
            self.count
        }

        fn upload(&mut self, matrices: &[Float3x4]) {
            assert_eq!(matrices.len(), self.count);
            if self.block.is_locked() {
                self.uploads_while_locked.fetch_add(1, Ordering::Relaxed);
            }
        }

        fn release(self) {}
    }

    impl InstanceBackend for LockWatch {
        type Buffer = WatchedBuffer;

        fn create_buffer(&mut self, count: usize, _stride: usize) -> WatchedBuffer {
            WatchedBuffer {
                count,
                block: Arc::clone(&self.block),
                uploads_while_locked: Arc::clone(&self.uploads_while_locked),
            }
        }

        fn draw_instanced(&mut self, _call: DrawCall<'_, WatchedBuffer>) {
            if self.block.is_locked() {
                self.draws_while_locked += 1;
            }
        }
    }

    fn gradient_cfg(depth: u32) -> FractalConfig {
        let mut cfg = FractalConfig::default();
        cfg.depth = depth;
        cfg.gradient_a = Gradient::linear(Vec4::ZERO, Vec4::ONE);
        cfg.gradient_b = Gradient::linear(Vec4::ONE, Vec4::ZERO);
        cfg
    }

    #[test]
    fn deepest_level_uses_leaf_appearance() {
        let cfg = gradient_cfg(5);
        let a = level_appearance(&cfg, 4, 5);
        assert_eq!(a.mesh, cfg.leaf_mesh);
        assert_eq!(a.color_a, cfg.leaf_color_a);
        assert_eq!(a.color_b, cfg.leaf_color_b);
    }

    #[test]
    fn interior_levels_walk_the_gradients() {
        let cfg = gradient_cfg(5);
        // Interior levels 0..=3 sample at 0, 1/3, 2/3, 1.
        for level in 0..4 {
            let t = level as f32 / 3.0;
            let a = level_appearance(&cfg, level, 5);
            assert_eq!(a.mesh, cfg.mesh);
            assert!(a.color_a.abs_diff_eq(Vec4::splat(t), 1e-6));
            assert!(a.color_b.abs_diff_eq(Vec4::splat(1.0 - t), 1e-6));
        }
    }

    #[test]
    fn single_interior_level_samples_gradient_start() {
        let cfg = gradient_cfg(2);
        let a = level_appearance(&cfg, 0, 2);
        assert_eq!(a.color_a, Vec4::ZERO);
        assert!(a.color_a.is_finite());
    }

    #[test]
    fn bounds_cover_the_whole_fractal() {
        let b = fractal_bounds(Vec3::new(1.0, 2.0, 3.0), 2.0);
        assert_eq!(b.center, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(b.size(), Vec3::splat(6.0));
    }

    #[test]
    fn sequence_numbers_are_unit_interval() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..50 {
            let s = random_sequence_numbers(&mut rng);
            assert!(s.cmpge(Vec4::ZERO).all() && s.cmplt(Vec4::ONE).all());
        }
    }

    #[test]
    fn one_draw_per_level_with_uploaded_matrices() {
        let cfg = gradient_cfg(3);
        let mut rng = StdRng::seed_from_u64(8);
        let mut levels = build_levels(&cfg, &mut rng);
        for (li, level) in levels.iter_mut().enumerate() {
            for (id, m) in level.matrices.iter_mut().enumerate() {
                *m = Float3x4::from_rotation_scale_translation(
                    Quat::IDENTITY,
                    1.0,
                    Vec3::new(li as f32, id as f32, 0.0),
                );
            }
        }

        let mut backend = RecordingBackend::new();
        let mut buffers: Vec<_> = levels
            .iter()
            .map(|l| backend.create_buffer(l.len(), Float3x4::STRIDE))
            .collect();
        let seqs: Vec<_> = (0..levels.len()).map(|_| random_sequence_numbers(&mut rng)).collect();
        let bounds = fractal_bounds(Vec3::ZERO, 1.0);

        let draws = draw_levels(&mut backend, &cfg, &levels, &mut buffers, &seqs, bounds);

        assert_eq!(draws, 3);
        assert_eq!(backend.draws.len(), 3);
        for (li, draw) in backend.draws.iter().enumerate() {
            assert_eq!(draw.instance_count, levels[li].len());
            assert_eq!(draw.matrices, levels[li].matrices);
            assert_eq!(draw.sequence_numbers, seqs[li]);
            assert_eq!(draw.bounds, bounds);
            assert_eq!(draw.material, cfg.material);
        }
        assert_eq!(backend.draws[2].mesh, cfg.leaf_mesh);
        assert_eq!(backend.draws[2].color_a, cfg.leaf_color_a);
        assert_eq!(backend.draws[0].mesh, cfg.mesh);

        for b in buffers {
            b.release();
        }
        assert_eq!(backend.live_buffers(), 0);
    }

    #[test]
    fn property_block_is_locked_per_draw_only() {
        let cfg = gradient_cfg(4);
        let mut rng = StdRng::seed_from_u64(12);
        let levels = build_levels(&cfg, &mut rng);

        let block = Arc::new(Mutex::new(PropertyBlock::default()));
        let mut backend = LockWatch {
            block: Arc::clone(&block),
            uploads_while_locked: Arc::new(AtomicUsize::new(0)),
            draws_while_locked: 0,
        };
        let mut buffers: Vec<_> = levels
            .iter()
            .map(|l| backend.create_buffer(l.len(), Float3x4::STRIDE))
            .collect();
        let seqs: Vec<_> = (0..levels.len()).map(|_| random_sequence_numbers(&mut rng)).collect();

        let draws = draw_levels_with(
            &block,
            &mut backend,
            &cfg,
            &levels,
            &mut buffers,
            &seqs,
            fractal_bounds(Vec3::ZERO, 1.0),
        );

        assert_eq!(draws, 4);
        assert_eq!(backend.draws_while_locked, 4);
        assert_eq!(backend.uploads_while_locked.load(Ordering::Relaxed), 0);
        assert!(!block.is_locked());
        assert_eq!(block.lock().sequence_numbers, seqs[3]);
    }
}
