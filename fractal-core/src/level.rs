use crate::config::FractalConfig;
use crate::part::FractalPart;
use crate::types::{Float3x4, NodeId, child_slot, level_len};
use rand::Rng;

/// All nodes of one fractal level, stored as parallel arrays.
///
/// For each `NodeId`, this store holds:
///
/// - The node's [`FractalPart`] (simulation state).
/// - The node's output [`Float3x4`] (written by the update, read by rendering).
///
/// `parts[i]` and `matrices[i]` always describe the same node.
#[derive(Debug)]
pub struct LevelStore {
    pub parts: Vec<FractalPart>,
    pub matrices: Vec<Float3x4>,
}

impl LevelStore {
    /// Creates level `level` with every node populated for its child slot.
    ///
    /// The root level holds a single slot-0 part.
    pub fn populated(level: usize, cfg: &FractalConfig, rng: &mut impl Rng) -> Self {
        let len = level_len(level);
        let parts = (0..len)
            .map(|id: NodeId| FractalPart::new(child_slot(id), cfg, rng))
            .collect();
        Self {
            parts,
            matrices: vec![Float3x4::default(); len],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

/// Builds levels `0..cfg.depth`, sized `5^0, 5^1, ...`.
pub fn build_levels(cfg: &FractalConfig, rng: &mut impl Rng) -> Vec<LevelStore> {
    (0..cfg.level_count())
        .map(|level| LevelStore::populated(level, cfg, rng))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::part::child_rotation;
    use crate::types::{BRANCH_FACTOR, total_nodes};
    use rand::{SeedableRng, rngs::StdRng};

    #[test]
    fn level_sizes_grow_by_five_for_every_depth() {
        let mut rng = StdRng::seed_from_u64(0);
        for depth in 3..=8 {
            let mut cfg = FractalConfig::default();
            cfg.depth = depth;
            let levels = build_levels(&cfg, &mut rng);

            assert_eq!(levels.len(), depth as usize);
            assert_eq!(levels[0].len(), 1);
            for i in 1..levels.len() {
                assert_eq!(levels[i].len(), levels[i - 1].len() * BRANCH_FACTOR);
                assert_eq!(levels[i].matrices.len(), levels[i].len());
            }

            let total: usize = levels.iter().map(LevelStore::len).sum();
            assert_eq!(total, total_nodes(depth as usize));
        }
    }

    #[test]
    fn nodes_get_rotation_of_their_child_slot() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut cfg = FractalConfig::default();
        cfg.depth = 3;
        let levels = build_levels(&cfg, &mut rng);

        assert_eq!(levels[0].parts[0].local_rotation, child_rotation(0));
        for level in &levels[1..] {
            for (id, part) in level.parts.iter().enumerate() {
                assert_eq!(part.local_rotation, child_rotation(id % BRANCH_FACTOR));
            }
        }
    }

    #[test]
    fn same_seed_builds_identical_constants() {
        let mut cfg = FractalConfig::default();
        cfg.depth = 5;

        let a = build_levels(&cfg, &mut StdRng::seed_from_u64(99));
        let b = build_levels(&cfg, &mut StdRng::seed_from_u64(99));

        for (la, lb) in a.iter().zip(&b) {
            assert_eq!(la.parts, lb.parts);
        }
    }

    #[test]
    fn different_seeds_build_different_constants() {
        let mut cfg = FractalConfig::default();
        cfg.depth = 3;

        let a = build_levels(&cfg, &mut StdRng::seed_from_u64(1));
        let b = build_levels(&cfg, &mut StdRng::seed_from_u64(2));

        assert_ne!(a[2].parts, b[2].parts);
    }
}
