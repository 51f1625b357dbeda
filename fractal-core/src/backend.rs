//! Interface to the renderer that draws the fractal.
//!
//! The core never talks to a graphics API directly. It allocates one
//! [`InstanceBuffer`] per level through an [`InstanceBackend`], uploads the
//! level's matrices into it every frame, and asks the backend for one
//! instanced draw per level.
//!
//! [`SoftwareBuffer`] is a plain in-memory buffer, and [`RecordingBackend`]
//! records draw calls instead of drawing them. Both work without a GPU.

use crate::render::PropertyBlock;
use crate::types::Float3x4;
use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Opaque mesh identifier understood by the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MeshHandle(pub u32);

impl MeshHandle {
    pub const BRANCH: Self = Self(0);
    pub const LEAF: Self = Self(1);
}

/// Opaque material identifier understood by the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MaterialHandle(pub u32);

impl MaterialHandle {
    pub const DEFAULT: Self = Self(0);
}

/// Axis-aligned bounding box given by center and half extents.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub center: Vec3,
    pub extents: Vec3,
}

impl Bounds {
    /// Box centered on `center` with full edge lengths `size`.
    pub fn from_center_size(center: Vec3, size: Vec3) -> Self {
        Self {
            center,
            extents: size * 0.5,
        }
    }

    #[inline]
    pub fn size(&self) -> Vec3 {
        self.extents * 2.0
    }

    pub fn contains(&self, p: Vec3) -> bool {
        let d = (p - self.center).abs();
        d.cmple(self.extents).all()
    }
}

/// GPU-visible buffer holding one level's instance matrices.
pub trait InstanceBuffer {
    /// Number of matrices the buffer holds.
    fn count(&self) -> usize;

    /// Replaces the buffer contents.
    ///
    /// `matrices.len()` must equal [`InstanceBuffer::count`].
    fn upload(&mut self, matrices: &[Float3x4]);

    /// Frees the buffer. Consuming `self` makes a second release impossible.
    fn release(self);
}

/// One instanced draw: `instance_count` copies of `mesh`, each placed by
/// the matching matrix in `buffer`.
pub struct DrawCall<'a, B> {
    pub mesh: MeshHandle,
    pub material: MaterialHandle,
    pub buffer: &'a B,
    pub properties: &'a PropertyBlock,
    pub bounds: Bounds,
    pub instance_count: usize,
}

/// Renderer the fractal draws through.
pub trait InstanceBackend {
    type Buffer: InstanceBuffer;

    /// Allocates a buffer of `count` elements of `stride` bytes.
    fn create_buffer(&mut self, count: usize, stride: usize) -> Self::Buffer;

    /// Issues one instanced draw.
    fn draw_instanced(&mut self, call: DrawCall<'_, Self::Buffer>);
}

/// In-memory instance buffer.
///
/// Every live buffer is counted in the shared `live` counter of the backend
/// that created it, which makes leaks and double releases observable.
#[derive(Debug)]
pub struct SoftwareBuffer {
    data: Vec<Float3x4>,
    stride: usize,
    live: Arc<AtomicUsize>,
}

impl SoftwareBuffer {
    pub fn new(count: usize, stride: usize, live: Arc<AtomicUsize>) -> Self {
        debug_assert_eq!(stride, Float3x4::STRIDE);
        live.fetch_add(1, Ordering::Relaxed);
        Self {
            data: vec![Float3x4::default(); count],
            stride,
            live,
        }
    }

    /// Current contents.
    #[inline]
    pub fn matrices(&self) -> &[Float3x4] {
        &self.data
    }
}

impl InstanceBuffer for SoftwareBuffer {
    fn count(&self) -> usize {
        self.data.len()
    }

    /// Copies the matrices in as raw bytes, the way a GPU buffer write would.
    fn upload(&mut self, matrices: &[Float3x4]) {
        let src: &[u8] = bytemuck::cast_slice(matrices);
        let expected = self.data.len() * self.stride;
        assert_eq!(src.len(), expected, "upload size must match the buffer");
        let dst: &mut [u8] = bytemuck::cast_slice_mut(&mut self.data);
        dst.copy_from_slice(src);
    }

    fn release(self) {
        self.live.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Snapshot of one draw recorded by [`RecordingBackend`].
#[derive(Clone, Debug, PartialEq)]
pub struct DrawRecord {
    pub mesh: MeshHandle,
    pub material: MaterialHandle,
    pub color_a: Vec4,
    pub color_b: Vec4,
    pub sequence_numbers: Vec4,
    pub bounds: Bounds,
    pub instance_count: usize,
    pub matrices: Vec<Float3x4>,
}

/// Backend that records draws instead of rendering them.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub draws: Vec<DrawRecord>,
    pub buffers_created: usize,
    live: Arc<AtomicUsize>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of buffers created and not yet released.
    pub fn live_buffers(&self) -> usize {
        self.live.load(Ordering::Relaxed)
    }
}

impl InstanceBackend for RecordingBackend {
    type Buffer = SoftwareBuffer;

    fn create_buffer(&mut self, count: usize, stride: usize) -> SoftwareBuffer {
        self.buffers_created += 1;
        SoftwareBuffer::new(count, stride, Arc::clone(&self.live))
    }

    fn draw_instanced(&mut self, call: DrawCall<'_, SoftwareBuffer>) {
        self.draws.push(DrawRecord {
            mesh: call.mesh,
            material: call.material,
            color_a: call.properties.color_a,
            color_b: call.properties.color_b,
            sequence_numbers: call.properties.sequence_numbers,
            bounds: call.bounds,
            instance_count: call.instance_count,
            matrices: call.buffer.matrices().to_vec(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    #[test]
    fn software_buffer_tracks_live_count() {
        let mut backend = RecordingBackend::new();
        let a = backend.create_buffer(1, Float3x4::STRIDE);
        let b = backend.create_buffer(5, Float3x4::STRIDE);
        assert_eq!(backend.live_buffers(), 2);
        assert_eq!(backend.buffers_created, 2);

        a.release();
        assert_eq!(backend.live_buffers(), 1);
        b.release();
        assert_eq!(backend.live_buffers(), 0);
    }

    #[test]
    fn upload_replaces_contents() {
        let mut backend = RecordingBackend::new();
        let mut buf = backend.create_buffer(2, Float3x4::STRIDE);
        assert_eq!(buf.count(), 2);

        let m = Float3x4::from_rotation_scale_translation(Quat::IDENTITY, 2.0, Vec3::ONE);
        buf.upload(&[Float3x4::default(), m]);

        assert_eq!(buf.matrices(), &[Float3x4::default(), m]);
        assert_eq!(buf.matrices()[1].translation(), Vec3::ONE);
        buf.release();
    }

    #[test]
    #[should_panic]
    fn upload_of_wrong_length_panics() {
        let mut backend = RecordingBackend::new();
        let mut buf = backend.create_buffer(2, Float3x4::STRIDE);
        buf.upload(&[Float3x4::default()]);
    }

    #[test]
    fn bounds_size_and_containment() {
        let b = Bounds::from_center_size(Vec3::new(1.0, 0.0, 0.0), Vec3::splat(3.0));
        assert_eq!(b.extents, Vec3::splat(1.5));
        assert_eq!(b.size(), Vec3::splat(3.0));
        assert!(b.contains(Vec3::new(2.5, 1.5, -1.5)));
        assert!(!b.contains(Vec3::new(2.6, 0.0, 0.0)));
    }
}
