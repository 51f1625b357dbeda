//! Fractal lifecycle: build, per-frame update and draw, teardown.
//!
//! A [`Fractal`] is either inactive (configuration only) or active. All
//! level arrays and instance buffers live inside [`ActiveFractal`], which
//! exists only while the fractal is active and releases everything when it
//! is dropped. Arrays can't be touched before activation or after
//! deactivation because there is nothing to touch.

use crate::backend::{InstanceBackend, InstanceBuffer};
use crate::config::FractalConfig;
use crate::error::Result;
use crate::level::{LevelStore, build_levels};
use crate::pipeline::{RootTransform, update_levels};
use crate::render::{draw_levels, fractal_bounds, random_sequence_numbers};
use crate::schedule::LevelScheduler;
use crate::types::Float3x4;
use glam::Vec4;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::time::{Duration, Instant};

/// Numbers describing one rendered frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameStats {
    pub levels: usize,
    pub nodes: usize,
    pub draw_calls: usize,
    /// Time spent in the level update, excluding upload and draw.
    pub update_time: Duration,
}

/// Resources owned by an active fractal.
struct ActiveFractal<Buf: InstanceBuffer> {
    levels: Vec<LevelStore>,
    buffers: Vec<Buf>,
    sequence_numbers: Vec<Vec4>,
}

impl<Buf: InstanceBuffer> ActiveFractal<Buf> {
    fn build<B>(cfg: &FractalConfig, rng: &mut StdRng, backend: &mut B) -> Self
    where
        B: InstanceBackend<Buffer = Buf>,
    {
        let levels = build_levels(cfg, rng);
        let buffers = levels
            .iter()
            .map(|level| backend.create_buffer(level.len(), Float3x4::STRIDE))
            .collect();
        let sequence_numbers = levels.iter().map(|_| random_sequence_numbers(rng)).collect();

        let active = Self {
            levels,
            buffers,
            sequence_numbers,
        };
        log::info!(
            "built fractal: {} levels, {} nodes",
            active.levels.len(),
            active.node_count()
        );
        active
    }

    fn node_count(&self) -> usize {
        self.levels.iter().map(LevelStore::len).sum()
    }
}

impl<Buf: InstanceBuffer> Drop for ActiveFractal<Buf> {
    fn drop(&mut self) {
        let released = self.buffers.len();
        for buffer in self.buffers.drain(..) {
            buffer.release();
        }
        log::debug!("released fractal: {released} buffers");
    }
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

/// A fractal tree drawn through backend `B`.
///
/// The typical frame looks like:
/// 1. [`Fractal::enable`] once, to allocate and populate the levels.
/// 2. [`Fractal::update`] every frame, to run the level update and draw.
/// 3. [`Fractal::disable`] (or drop) to release everything.
pub struct Fractal<B: InstanceBackend> {
    cfg: FractalConfig,
    rng: StdRng,
    scheduler: LevelScheduler,
    active: Option<ActiveFractal<B::Buffer>>,
}

impl<B: InstanceBackend> Fractal<B> {
    /// Creates an inactive fractal after validating `cfg`.
    ///
    /// Part constants are drawn from an RNG seeded with `cfg.seed`, or from
    /// the OS when no seed is set. The RNG keeps running across rebuilds.
    pub fn new(cfg: FractalConfig) -> Result<Self> {
        cfg.validate()?;
        let rng = seeded_rng(cfg.seed);
        let scheduler = LevelScheduler::new(cfg.worker_threads, cfg.batch_size)?;
        Ok(Self {
            cfg,
            rng,
            scheduler,
            active: None,
        })
    }

    pub fn config(&self) -> &FractalConfig {
        &self.cfg
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Allocates and populates all levels and buffers.
    ///
    /// Does nothing if the fractal is already active.
    pub fn enable(&mut self, backend: &mut B) {
        if self.active.is_some() {
            log::warn!("fractal already enabled, ignoring");
            return;
        }
        self.active = Some(ActiveFractal::build(&self.cfg, &mut self.rng, backend));
    }

    /// Releases all levels and buffers. Does nothing if already inactive.
    pub fn disable(&mut self) {
        self.active = None;
    }

    /// Replaces the configuration.
    ///
    /// An active fractal is torn down and rebuilt from scratch with the new
    /// configuration; an inactive one just stores it. A changed seed restarts
    /// the RNG, so the result matches a fresh fractal with that seed. On
    /// error nothing changes.
    pub fn reconfigure(&mut self, cfg: FractalConfig, backend: &mut B) -> Result<()> {
        cfg.validate()?;
        if cfg.worker_threads != self.cfg.worker_threads || cfg.batch_size != self.cfg.batch_size {
            self.scheduler = LevelScheduler::new(cfg.worker_threads, cfg.batch_size)?;
        }
        if cfg.seed != self.cfg.seed {
            log::debug!("reseeding fractal rng: {:?} -> {:?}", self.cfg.seed, cfg.seed);
            self.rng = seeded_rng(cfg.seed);
        }
        log::debug!("reconfiguring fractal: depth {} -> {}", self.cfg.depth, cfg.depth);
        self.cfg = cfg;

        if self.active.is_some() {
            self.rebuild(backend);
        }
        Ok(())
    }

    /// Tears down and rebuilds the active fractal with fresh random draws.
    ///
    /// An inactive fractal stays inactive.
    pub fn rebuild(&mut self, backend: &mut B) {
        if self.active.is_some() {
            self.disable();
            self.enable(backend);
        }
    }

    /// Runs one frame: root refresh, level updates, upload and draw.
    ///
    /// ### Returns
    /// Frame statistics, or `None` if the fractal is inactive.
    pub fn update(
        &mut self,
        transform: &RootTransform,
        delta_time: f32,
        backend: &mut B,
    ) -> Option<FrameStats> {
        let active = self.active.as_mut()?;

        let start = Instant::now();
        update_levels(&mut active.levels, transform, delta_time, &self.scheduler);
        let update_time = start.elapsed();

        let bounds = fractal_bounds(transform.position, transform.scale);
        let draw_calls = draw_levels(
            backend,
            &self.cfg,
            &active.levels,
            &mut active.buffers,
            &active.sequence_numbers,
            bounds,
        );

        let stats = FrameStats {
            levels: active.levels.len(),
            nodes: active.node_count(),
            draw_calls,
            update_time,
        };
        log::trace!("frame: {stats:?}");
        Some(stats)
    }

    /// Levels of the active fractal, root level first.
    pub fn levels(&self) -> Option<&[LevelStore]> {
        self.active.as_ref().map(|a| a.levels.as_slice())
    }

    /// Sequence numbers of the active fractal, one per level.
    pub fn sequence_numbers(&self) -> Option<&[Vec4]> {
        self.active.as_ref().map(|a| a.sequence_numbers.as_slice())
    }
}
