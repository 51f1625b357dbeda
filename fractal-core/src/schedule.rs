//! Parallel dispatch of the update kernel over one level.

use crate::error::Result;
use crate::kernel::update_part;
use crate::level::LevelStore;
use crate::part::FractalPart;
use crate::types::parent_index;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

/// Runs [`update_part`] over every node of a level on a worker pool.
///
/// Each call to [`LevelScheduler::run_level`] blocks until the whole level
/// is done, so running levels one after another gives a full barrier
/// between them. Nodes within a level run in batches of `batch_size`
/// consecutive ids, in no particular order.
pub struct LevelScheduler {
    pool: ThreadPool,
    batch_size: usize,
}

impl LevelScheduler {
    /// Builds the worker pool.
    ///
    /// ### Parameters
    /// - `worker_threads` - Pool size; `None` uses rayon's default.
    /// - `batch_size` - Nodes per work item, at least 1.
    pub fn new(worker_threads: Option<usize>, batch_size: usize) -> Result<Self> {
        let mut builder =
            ThreadPoolBuilder::new().thread_name(|i| format!("fractal-level-{i}"));
        if let Some(n) = worker_threads {
            builder = builder.num_threads(n);
        }
        let pool = builder.build()?;
        log::debug!(
            "level scheduler ready: {} threads, batch size {}",
            pool.current_num_threads(),
            batch_size
        );

        Ok(Self {
            pool,
            batch_size: batch_size.max(1),
        })
    }

    #[inline]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Updates every node of `level` from `parents` and waits for completion.
    ///
    /// ### Parameters
    /// - `parents` - Previous level's parts, already updated this frame.
    /// - `level` - Level to update; node `i`'s parent is `parents[i / 5]`.
    /// - `delta_time` - Seconds since the previous frame.
    /// - `scale` - Uniform scale of `level`.
    ///
    /// ### Panics
    /// Panics if `parents` is too short for `level`.
    pub fn run_level(
        &self,
        parents: &[FractalPart],
        level: &mut LevelStore,
        delta_time: f32,
        scale: f32,
    ) {
        let batch = self.batch_size;
        let LevelStore { parts, matrices } = level;

        self.pool.install(|| {
            parts
                .par_chunks_mut(batch)
                .zip(matrices.par_chunks_mut(batch))
                .enumerate()
                .for_each(|(batch_index, (parts, matrices))| {
                    let first = batch_index * batch;
                    for (offset, (part, matrix)) in
                        parts.iter_mut().zip(matrices.iter_mut()).enumerate()
                    {
                        let parent = &parents[parent_index(first + offset)];
                        *matrix = update_part(parent, part, delta_time, scale);
                    }
                });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FractalConfig;
    use crate::level::build_levels;
    use rand::{SeedableRng, rngs::StdRng};

    fn sequential(parents: &[FractalPart], level: &mut LevelStore, dt: f32, scale: f32) {
        for (i, (part, matrix)) in level.parts.iter_mut().zip(&mut level.matrices).enumerate() {
            *matrix = update_part(&parents[parent_index(i)], part, dt, scale);
        }
    }

    #[test]
    fn parallel_level_matches_sequential_for_any_batch_size() {
        let mut cfg = FractalConfig::default();
        cfg.depth = 4;

        for batch in [1, 3, 5, 7, 64] {
            let mut a = build_levels(&cfg, &mut StdRng::seed_from_u64(5));
            let mut b = build_levels(&cfg, &mut StdRng::seed_from_u64(5));

            let scheduler = LevelScheduler::new(Some(3), batch).unwrap();
            for li in 1..a.len() {
                let (done, rest) = a.split_at_mut(li);
                scheduler.run_level(&done[li - 1].parts, &mut rest[0], 0.1, 0.5);

                let (done, rest) = b.split_at_mut(li);
                sequential(&done[li - 1].parts, &mut rest[0], 0.1, 0.5);
            }

            for (la, lb) in a.iter().zip(&b) {
                assert_eq!(la.parts, lb.parts, "batch {batch}");
                assert_eq!(la.matrices, lb.matrices, "batch {batch}");
            }
        }
    }

    #[test]
    fn zero_batch_size_is_clamped() {
        let scheduler = LevelScheduler::new(Some(1), 0).unwrap();
        assert_eq!(scheduler.batch_size(), 1);
        assert_eq!(scheduler.num_threads(), 1);
    }
}
