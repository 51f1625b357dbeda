use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Quat, Vec3};

/// Identifier for a node inside one [`crate::level::LevelStore`].
///
/// This is a flat index into the level's arrays and is only meaningful
/// together with the level it belongs to.
pub type NodeId = usize;

/// Number of children every non-leaf node owns.
pub const BRANCH_FACTOR: usize = 5;

/// Deepest fractal a configuration may request.
pub const MAX_DEPTH: u32 = 8;

/// Index of the parent (on the previous level) of node `id`.
#[inline]
pub const fn parent_index(id: NodeId) -> NodeId {
    id / BRANCH_FACTOR
}

/// Which of its parent's five children node `id` is.
///
/// Always in `0..BRANCH_FACTOR`.
#[inline]
pub const fn child_slot(id: NodeId) -> usize {
    id % BRANCH_FACTOR
}

/// Number of nodes on `level` (root level is 0).
#[inline]
pub const fn level_len(level: usize) -> usize {
    BRANCH_FACTOR.pow(level as u32)
}

/// Number of nodes in a fractal with `depth` levels.
pub const fn total_nodes(depth: usize) -> usize {
    let mut total = 0;
    let mut level = 0;
    while level < depth {
        total += level_len(level);
        level += 1;
    }
    total
}

/// Packed 3x4 transform: three linear columns followed by a translation.
///
/// This is the per-instance record uploaded to instance buffers, so its
/// layout is fixed at 12 floats with no projective row.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Float3x4 {
    pub cols: [[f32; 3]; 4],
}

impl Float3x4 {
    /// Size of one matrix in bytes, used as the instance buffer stride.
    pub const STRIDE: usize = std::mem::size_of::<Self>();

    /// Builds the matrix for a node rotated by `rotation`, uniformly scaled
    /// by `scale` and placed at `translation`.
    pub fn from_rotation_scale_translation(rotation: Quat, scale: f32, translation: Vec3) -> Self {
        let r = Mat3::from_quat(rotation) * scale;
        Self {
            cols: [
                r.x_axis.to_array(),
                r.y_axis.to_array(),
                r.z_axis.to_array(),
                translation.to_array(),
            ],
        }
    }

    /// Returns the translation column.
    #[inline]
    pub fn translation(&self) -> Vec3 {
        Vec3::from_array(self.cols[3])
    }

    /// Returns the linear (rotation * scale) part.
    #[inline]
    pub fn linear(&self) -> Mat3 {
        Mat3::from_cols(
            Vec3::from_array(self.cols[0]),
            Vec3::from_array(self.cols[1]),
            Vec3::from_array(self.cols[2]),
        )
    }

    /// Transforms a point from instance space to world space.
    #[inline]
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        self.linear() * p + self.translation()
    }
}
