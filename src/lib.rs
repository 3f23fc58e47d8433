// Camgrid - multi-camera mosaic capture with event-triggered clip recording
// Main library entry point

pub mod analytics;
pub mod capture;
pub mod config;
pub mod devices;
pub mod encoding;
pub mod gstreamer_init;
pub mod recording;
pub mod video;

pub use capture::{CameraChannel, MosaicCompositor, PacingMode};
pub use config::Config;
pub use recording::{EventRecorder, RecordingStatus};

/// Set up logging (honours `RUST_LOG`) and GStreamer.
///
/// Safe to call more than once; later logger installs are ignored.
pub fn init() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
    gstreamer_init::init_gstreamer_env();
}
