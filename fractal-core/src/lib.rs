//! Core fractal-tree library: flat per-level storage, parallel level
//! update and instanced drawing.
//!
//! Main components:
//! - [`types`] - node ids, parent/child index math, the instance matrix.
//! - [`part`] - per-node state and the child rotation table.
//! - [`level`] - per-level arrays of parts and matrices.
//! - [`kernel`] - the per-node update run in parallel.
//! - [`schedule`] - worker pool running one level at a time.
//! - [`pipeline`] - the per-frame update of all levels.
//! - [`backend`] - the renderer interface (buffers and instanced draws).
//! - [`render`] - per-level upload, appearance and draw.
//! - [`shading`] - per-instance color function.
//! - [`config`] - configuration and TOML loading.
//! - [`error`] - error type.
//! - [`fractal`] - build/update/teardown lifecycle.

pub mod backend;
pub mod config;
pub mod error;
pub mod fractal;
pub mod kernel;
pub mod level;
pub mod part;
pub mod pipeline;
pub mod render;
pub mod schedule;
pub mod shading;
pub mod types;

pub use error::{FractalError, Result};
