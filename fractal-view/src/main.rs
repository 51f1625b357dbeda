//! Application entry point for the fractal tree viewer.
//!
//! This binary sets up logging and eframe/egui and delegates all
//! interactive logic and rendering to [`Viewer`] from the `viewer` module.

mod painter_backend;
mod viewer;

use fractal_core::config::FractalConfig;
use viewer::Viewer;

/// Reads the config named by the first command-line argument.
///
/// Falls back to [`FractalConfig::default`] when no path is given or the
/// file can't be loaded.
fn load_config() -> FractalConfig {
    let Some(path) = std::env::args().nth(1) else {
        return FractalConfig::default();
    };
    match FractalConfig::load(&path) {
        Ok(cfg) => cfg,
        Err(e) => {
            log::error!("{path}: {e}; using default config");
            FractalConfig::default()
        }
    }
}

/// Starts the native eframe application.
///
/// ### Returns
/// - `Ok(())` if the application runs to completion without errors.
/// - `Err` if the fractal can't be created or eframe fails to create the
///   native window or event loop.
fn main() -> eframe::Result<()> {
    env_logger::init();

    let cfg = load_config();
    let options = eframe::NativeOptions::default();

    eframe::run_native(
        "Fractal Tree",
        options,
        Box::new(move |_cc| Ok(Box::new(Viewer::new(cfg)?))),
    )
}
