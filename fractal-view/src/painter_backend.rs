//! [`InstanceBackend`] that draws instances as egui shapes.
//!
//! Branch instances become line segments along their local Y axis and leaf
//! instances become discs. Each instance is colored with
//! [`shading::instance_color`], so the viewer shows the same per-instance
//! variation a GPU shader would.

use fractal_core::backend::{DrawCall, InstanceBackend, MeshHandle, SoftwareBuffer};
use fractal_core::shading;
use glam::{Quat, Vec3, Vec4};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Orthographic view used to map world space to the screen.
///
/// ### Fields
/// - `rotation` - World-to-view rotation.
/// - `zoom` - Pixels per world unit.
/// - `pan` - Screen-space offset in pixels.
/// - `rect` - Screen-space drawing area.
#[derive(Clone, Copy, Debug)]
pub struct View {
    pub rotation: Quat,
    pub zoom: f32,
    pub pan: egui::Vec2,
    pub rect: egui::Rect,
}

impl View {
    /// Converts a world-space position to screen-space.
    ///
    /// The point is rotated into view space, then scaled by `zoom`, offset
    /// by `pan`, and centered inside `rect`. The y-axis is flipped so that
    /// positive y goes up.
    pub fn world_to_screen(&self, p: Vec3) -> egui::Pos2 {
        let v = self.rotation * p;
        let center = self.rect.center();
        egui::pos2(
            center.x + v.x * self.zoom + self.pan.x,
            center.y - v.y * self.zoom + self.pan.y,
        )
    }
}

impl Default for View {
    fn default() -> Self {
        Self {
            rotation: Quat::IDENTITY,
            zoom: 1.0,
            pan: egui::Vec2::ZERO,
            rect: egui::Rect::from_min_size(egui::Pos2::ZERO, egui::vec2(1.0, 1.0)),
        }
    }
}

fn to_color32(c: Vec4) -> egui::Color32 {
    let [r, g, b, _] = (c.clamp(Vec4::ZERO, Vec4::ONE) * 255.0).to_array();
    egui::Color32::from_rgb(r as u8, g as u8, b as u8)
}

/// Collects egui shapes for every instance drawn during a frame.
pub struct PainterBackend {
    view: View,
    shapes: Vec<egui::Shape>,
    draw_calls: usize,
    culled_draws: usize,
    live: Arc<AtomicUsize>,
}

impl PainterBackend {
    pub fn new() -> Self {
        Self {
            view: View::default(),
            shapes: Vec::new(),
            draw_calls: 0,
            culled_draws: 0,
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Starts a frame with `view`, discarding shapes from the previous one.
    pub fn begin_frame(&mut self, view: View) {
        self.view = view;
        self.shapes.clear();
        self.draw_calls = 0;
        self.culled_draws = 0;
    }

    /// Hands over the shapes collected since [`PainterBackend::begin_frame`].
    pub fn take_shapes(&mut self) -> Vec<egui::Shape> {
        std::mem::take(&mut self.shapes)
    }

    /// Draws submitted this frame, including culled ones.
    pub fn draw_calls(&self) -> usize {
        self.draw_calls
    }

    /// Draws skipped because their bounds were off screen.
    pub fn culled_draws(&self) -> usize {
        self.culled_draws
    }

    pub fn live_buffers(&self) -> usize {
        self.live.load(Ordering::Relaxed)
    }
}

impl Default for PainterBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InstanceBackend for PainterBackend {
    type Buffer = SoftwareBuffer;

    fn create_buffer(&mut self, count: usize, stride: usize) -> SoftwareBuffer {
        SoftwareBuffer::new(count, stride, Arc::clone(&self.live))
    }

    fn draw_instanced(&mut self, call: DrawCall<'_, SoftwareBuffer>) {
        self.draw_calls += 1;

        // Cull the whole draw when the bounds' bounding circle misses the screen.
        let center = self.view.world_to_screen(call.bounds.center);
        let radius = call.bounds.extents.length() * self.view.zoom;
        if !self.view.rect.expand(radius).contains(center) {
            self.culled_draws += 1;
            return;
        }

        let zoom = self.view.zoom;
        for (id, m) in call.buffer.matrices().iter().take(call.instance_count).enumerate() {
            let color = to_color32(shading::instance_color(call.properties, id as u32));
            let scale = m.linear().x_axis.length();

            if call.mesh == MeshHandle::LEAF {
                let p = self.view.world_to_screen(m.translation());
                let r = (scale * 0.5 * zoom).max(1.0);
                self.shapes.push(egui::Shape::circle_filled(p, r, color));
            } else {
                let a = self.view.world_to_screen(m.transform_point(Vec3::new(0.0, -0.5, 0.0)));
                let b = self.view.world_to_screen(m.transform_point(Vec3::new(0.0, 0.5, 0.0)));
                let width = (scale * zoom * 0.5).max(1.0);
                self.shapes
                    .push(egui::Shape::line_segment([a, b], egui::Stroke::new(width, color)));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fractal_core::config::FractalConfig;
    use fractal_core::fractal::Fractal;
    use fractal_core::pipeline::RootTransform;
    use fractal_core::types::total_nodes;

    fn test_view(zoom: f32) -> View {
        View {
            rotation: Quat::IDENTITY,
            zoom,
            pan: egui::Vec2::ZERO,
            rect: egui::Rect::from_min_size(egui::Pos2::ZERO, egui::vec2(800.0, 600.0)),
        }
    }

    #[test]
    fn world_origin_maps_to_rect_center_and_y_points_up() {
        let view = test_view(10.0);
        assert_eq!(view.world_to_screen(Vec3::ZERO), egui::pos2(400.0, 300.0));
        assert_eq!(view.world_to_screen(Vec3::Y), egui::pos2(400.0, 290.0));
    }

    #[test]
    fn view_rotation_is_applied_before_projection() {
        let mut view = test_view(10.0);
        view.rotation = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
        // +Z rotates onto +X.
        let p = view.world_to_screen(Vec3::Z);
        assert!((p.x - 410.0).abs() < 1e-3 && (p.y - 300.0).abs() < 1e-3, "{p:?}");
    }

    #[test]
    fn every_instance_becomes_one_shape() {
        let mut cfg = FractalConfig::default();
        cfg.depth = 3;
        cfg.seed = Some(1);

        let mut backend = PainterBackend::new();
        let mut fractal = Fractal::new(cfg).unwrap();
        fractal.enable(&mut backend);

        backend.begin_frame(test_view(100.0));
        fractal.update(&RootTransform::default(), 0.0, &mut backend);

        assert_eq!(backend.draw_calls(), 3);
        assert_eq!(backend.culled_draws(), 0);
        assert_eq!(backend.take_shapes().len(), total_nodes(3));
    }

    #[test]
    fn off_screen_draws_are_culled() {
        let mut cfg = FractalConfig::default();
        cfg.depth = 3;
        cfg.seed = Some(1);

        let mut backend = PainterBackend::new();
        let mut fractal = Fractal::new(cfg).unwrap();
        fractal.enable(&mut backend);

        let far = RootTransform {
            position: Vec3::new(1000.0, 0.0, 0.0),
            ..RootTransform::default()
        };
        backend.begin_frame(test_view(100.0));
        fractal.update(&far, 0.0, &mut backend);

        assert_eq!(backend.culled_draws(), 3);
        assert!(backend.take_shapes().is_empty());
    }

    #[test]
    fn buffers_are_released_with_the_fractal() {
        let mut backend = PainterBackend::new();
        let mut fractal = Fractal::new(FractalConfig::default()).unwrap();
        fractal.enable(&mut backend);
        assert_eq!(backend.live_buffers(), 4);

        fractal.disable();
        assert_eq!(backend.live_buffers(), 0);
    }
}
