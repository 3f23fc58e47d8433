// Camera acquisition and mosaic composition

pub mod channel;
pub mod mosaic;

pub use channel::{CameraChannel, ChannelSettings, ChannelStats};
pub use mosaic::MosaicCompositor;

use serde::{Deserialize, Serialize};

/// Maximum number of camera slots on the 2×2 mosaic
pub const MAX_CHANNELS: usize = 4;

/// How a channel paces its decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PacingMode {
    /// Decode continuously; the consumer sees whatever frame is newest
    #[default]
    FreeRun,
    /// Decode the next frame only after the consumer has pulled the mosaic
    /// ("video mode", keeps file playback in step with the consumer)
    Synchronized,
}

/// Error type for channel and mosaic setup
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Failed to spawn acquisition thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Invalid placement: {0}")]
    Placement(String),
}

pub type Result<T> = std::result::Result<T, CaptureError>;
