//! Interactive fractal-tree viewer built with eframe/egui.
//!
//! This module defines [`Viewer`], which owns the fractal, the
//! [`PainterBackend`] it draws through, and the camera, and implements
//! [`eframe::App`] to run and control the fractal through an egui UI.

use crate::painter_backend::{PainterBackend, View};
use eframe::App;
use fractal_core::{
    config::FractalConfig,
    fractal::{Fractal, FrameStats},
    pipeline::RootTransform,
    types::MAX_DEPTH,
};
use glam::{Quat, Vec3};

/// Time advanced by a single "Step" click, in seconds.
const STEP_DT: f32 = 1.0 / 60.0;

/// Main application state for the interactive viewer.
///
/// [`Viewer`] glues together:
/// - The fractal core: [`Fractal`] and its [`FractalConfig`].
/// - The [`PainterBackend`] turning instanced draws into egui shapes.
/// - UI state (camera, root transform, run/pause, timing).
///
/// The typical per-frame update is:
/// 1. Handle UI interactions; apply config edits with [`Viewer::apply_config`].
/// 2. Advance the fractal by the frame time if `running` (or one step).
/// 3. Paint the shapes the backend collected.
///
/// ### Fields
/// - `fractal` - The fractal being animated.
/// - `backend` - Renderer the fractal draws into.
/// - `cfg` - Config being edited in the side panel.
/// - `config_error` - Last rejected config and the reason it was rejected.
///
/// - `root_yaw` - Rotation of the root transform about Y, degrees.
/// - `root_scale` - Uniform scale of the root transform.
///
/// - `running` - Whether time is advancing.
/// - `pending_step` - Advance one fixed step on the next frame.
/// - `time_scale` - Multiplier applied to frame time.
///
/// - `yaw` / `pitch` - Camera orbit angles, degrees.
/// - `zoom` - Pixels per world unit.
/// - `pan` - Screen-space pan offset in pixels.
///
/// - `last_stats` - Statistics of the last rendered frame.
pub struct Viewer {
    fractal: Fractal<PainterBackend>,
    backend: PainterBackend,
    cfg: FractalConfig,
    config_error: Option<(FractalConfig, String)>,

    root_yaw: f32,
    root_scale: f32,

    running: bool,
    pending_step: bool,
    time_scale: f32,

    yaw: f32,
    pitch: f32,
    zoom: f32,
    pan: egui::Vec2,

    last_stats: Option<FrameStats>,
}

impl Viewer {
    /// Creates a viewer with an active fractal built from `cfg`.
    ///
    /// ### Returns
    /// The viewer, or the error that kept the fractal from being created.
    pub fn new(cfg: FractalConfig) -> fractal_core::Result<Self> {
        let mut backend = PainterBackend::new();
        let mut fractal = Fractal::new(cfg.clone())?;
        fractal.enable(&mut backend);

        Ok(Self {
            fractal,
            backend,
            cfg,
            config_error: None,
            root_yaw: 0.0,
            root_scale: 1.0,
            running: true,
            pending_step: false,
            time_scale: 1.0,
            yaw: 30.0,
            pitch: 15.0,
            zoom: 150.0,
            pan: egui::vec2(0.0, 120.0),
            last_stats: None,
        })
    }

    /// Rebuilds the fractal with fresh random constants, keeping the config.
    fn reset(&mut self) {
        self.fractal.rebuild(&mut self.backend);
        self.last_stats = None;
    }

    /// Applies the edited config if it differs from the fractal's.
    ///
    /// A rejected config is kept in the panel and its error shown, while
    /// the fractal keeps running with its previous config.
    fn apply_config(&mut self) {
        if &self.cfg == self.fractal.config() {
            self.config_error = None;
            return;
        }
        if matches!(&self.config_error, Some((rejected, _)) if *rejected == self.cfg) {
            return;
        }
        match self.fractal.reconfigure(self.cfg.clone(), &mut self.backend) {
            Ok(()) => self.config_error = None,
            Err(e) => {
                log::warn!("rejected config edit: {e}");
                self.config_error = Some((self.cfg.clone(), e.to_string()));
            }
        }
    }

    fn root_transform(&self) -> RootTransform {
        RootTransform {
            position: Vec3::ZERO,
            rotation: Quat::from_rotation_y(self.root_yaw.to_radians()),
            scale: self.root_scale,
        }
    }

    fn view(&self, rect: egui::Rect) -> View {
        View {
            rotation: Quat::from_rotation_x(self.pitch.to_radians())
                * Quat::from_rotation_y(self.yaw.to_radians()),
            zoom: self.zoom,
            pan: self.pan,
            rect,
        }
    }

    /// Time to advance this frame given the real frame time `frame_dt`.
    fn frame_delta(&mut self, frame_dt: f32) -> f32 {
        if self.pending_step {
            self.pending_step = false;
            STEP_DT * self.time_scale
        } else if self.running {
            frame_dt * self.time_scale
        } else {
            0.0
        }
    }

    /// Runs one fractal frame into `rect` and returns the shapes to paint.
    fn render_frame(&mut self, rect: egui::Rect, delta_time: f32) -> Vec<egui::Shape> {
        let view = self.view(rect);
        self.backend.begin_frame(view);
        let transform = self.root_transform();
        self.last_stats = self.fractal.update(&transform, delta_time, &mut self.backend);
        self.backend.take_shapes()
    }

    /// Builds the top panel UI (run controls, stepping, zoom).
    fn ui_top_panel(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui
                    .button(if self.running { "⏸ Pause" } else { "▶ Run" })
                    .clicked()
                {
                    self.running = !self.running;
                }

                if ui.button("Step").clicked() {
                    self.pending_step = true;
                }

                if ui.button("Reset").clicked() {
                    self.reset();
                }

                ui.add(
                    egui::DragValue::new(&mut self.time_scale)
                        .prefix("time × ")
                        .range(0.0..=10.0)
                        .speed(0.05),
                );

                ui.separator();
                ui.add(egui::Slider::new(&mut self.zoom, 10.0..=1000.0).text("Zoom"));
            });
        });
    }

    /// Builds the bottom status bar (levels, nodes, draw calls, timing).
    fn ui_status_bar(&self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                match &self.last_stats {
                    Some(stats) => {
                        ui.label(format!(
                            "update = {:.3} ms",
                            stats.update_time.as_secs_f64() * 1000.0
                        ));
                        ui.separator();
                        ui.label(format!(
                            "draw calls = {} (culled {})",
                            self.backend.draw_calls(),
                            self.backend.culled_draws()
                        ));
                        ui.label(format!("nodes = {}", stats.nodes));
                        ui.label(format!("levels = {}", stats.levels));
                    }
                    None => {
                        ui.label("inactive");
                    }
                }
            });
        });
    }

    /// Helper to draw a labeled `f32` [`egui::DragValue`].
    fn labeled_drag_f32(
        ui: &mut egui::Ui,
        label: &str,
        value: &mut f32,
        range: std::ops::RangeInclusive<f32>,
        speed: f64,
    ) {
        ui.horizontal(|ui| {
            ui.label(label);
            ui.add(egui::DragValue::new(value).range(range).speed(speed));
        });
    }

    /// Builds the right-hand configuration panel for fractal parameters.
    fn ui_config_panel(&mut self, ctx: &egui::Context) {
        egui::SidePanel::right("config_panel")
            .resizable(true)
            .default_width(220.0)
            .show(ctx, |ui| {
                ui.heading("Config");

                ui.separator();
                ui.label("Structure");
                ui.add(egui::Slider::new(&mut self.cfg.depth, 3..=MAX_DEPTH).text("depth"));
                ui.horizontal(|ui| {
                    ui.label("batch_size:");
                    ui.add(
                        egui::DragValue::new(&mut self.cfg.batch_size)
                            .range(1..=1024)
                            .speed(1.0),
                    );
                });

                ui.separator();
                ui.label("Sag (degrees)");
                Self::labeled_drag_f32(ui, "sag a:", &mut self.cfg.sag_angle.a, 0.0..=90.0, 0.5);
                Self::labeled_drag_f32(ui, "sag b:", &mut self.cfg.sag_angle.b, 0.0..=90.0, 0.5);

                ui.separator();
                ui.label("Spin (degrees / s)");
                Self::labeled_drag_f32(ui, "spin a:", &mut self.cfg.spin_speed.a, 0.0..=90.0, 0.5);
                Self::labeled_drag_f32(ui, "spin b:", &mut self.cfg.spin_speed.b, 0.0..=90.0, 0.5);
                Self::labeled_drag_f32(
                    ui,
                    "reverse chance:",
                    &mut self.cfg.reverse_spin_chance,
                    0.0..=1.0,
                    0.01,
                );

                ui.separator();
                ui.label("Root");
                Self::labeled_drag_f32(ui, "yaw:", &mut self.root_yaw, -180.0..=180.0, 1.0);
                Self::labeled_drag_f32(ui, "scale:", &mut self.root_scale, 0.1..=10.0, 0.05);

                ui.separator();
                ui.label("Camera");
                Self::labeled_drag_f32(ui, "yaw:", &mut self.yaw, -180.0..=180.0, 1.0);
                Self::labeled_drag_f32(ui, "pitch:", &mut self.pitch, -89.0..=89.0, 1.0);

                ui.separator();
                if ui.button("Reset cfg to default").clicked() {
                    self.cfg = FractalConfig::default();
                }

                if let Some((_, err)) = &self.config_error {
                    ui.colored_label(egui::Color32::RED, err.as_str());
                }
            });

        self.apply_config();
    }

    /// Builds the central panel where the fractal is drawn and the camera is driven.
    fn ui_central_panel(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let response = ui.allocate_response(ui.available_size(), egui::Sense::click_and_drag());
            let rect = response.rect;
            let painter = ui.painter_at(rect);

            // Orbit with the primary button, pan with the secondary.
            if response.dragged_by(egui::PointerButton::Primary) {
                let delta = response.drag_delta();
                self.yaw = (self.yaw + delta.x * 0.5 + 180.0).rem_euclid(360.0) - 180.0;
                self.pitch = (self.pitch + delta.y * 0.5).clamp(-89.0, 89.0);
            }
            if response.dragged_by(egui::PointerButton::Secondary) {
                self.pan += response.drag_delta();
            }

            // Zoom with the scroll wheel.
            let scroll = ui.ctx().input(|i| i.raw_scroll_delta.y);
            if scroll != 0.0 && response.hovered() {
                let factor = (1.0 + scroll * 0.001).clamp(0.5, 2.0);
                self.zoom = (self.zoom * factor).clamp(10.0, 1000.0);
            }

            let frame_dt = ctx.input(|i| i.stable_dt);
            let dt = self.frame_delta(frame_dt);
            painter.extend(self.render_frame(rect, dt));

            if self.running {
                ctx.request_repaint();
            }
        });
    }
}

impl App for Viewer {
    /// eframe callback that builds all UI panels for each frame.
    ///
    /// This method:
    /// - Renders the top control bar and status bar.
    /// - Renders the config side panel and applies edits.
    /// - Runs the fractal and draws it in the central view.
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.ui_top_panel(ctx);
        self.ui_status_bar(ctx);
        self.ui_config_panel(ctx);
        self.ui_central_panel(ctx);
    }
}
