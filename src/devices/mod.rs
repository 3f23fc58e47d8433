// Capture sources and their health bookkeeping

pub mod gst_source;
pub mod health;

pub use gst_source::GstCaptureSource;
pub use health::{FailureTracker, FailureVerdict, DEFAULT_REOPEN_THRESHOLD};

use crate::video::Frame;

/// Error type for source operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum SourceError {
    #[error("Failed to open {address}: {reason}")]
    Open { address: String, reason: String },

    #[error("Read error: {0}")]
    Read(String),

    #[error("No frame within {0} ms")]
    Timeout(u64),

    #[error("End of stream")]
    EndOfStream,

    #[error("Source not opened")]
    NotOpen,
}

pub type Result<T> = std::result::Result<T, SourceError>;

/// A single video stream (network URI or local file) read one frame at a time.
///
/// `open` may be called again at any point to re-establish the stream;
/// implementations release whatever they held before reconnecting.
pub trait CaptureSource: Send {
    fn open(&mut self) -> Result<()>;

    /// Block until the next frame is decoded or the read fails
    fn read_frame(&mut self) -> Result<Frame>;

    /// Address used in log messages
    fn address(&self) -> &str;
}

/// Whether an address names a network stream rather than a local file
pub fn is_network_address(address: &str) -> bool {
    let lower = address.to_ascii_lowercase();
    ["rtsp://", "rtsps://", "rtmp://", "http://", "https://", "udp://", "srt://"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_addresses_are_detected() {
        assert!(is_network_address("rtsp://admin:pw@10.0.0.1/profile1"));
        assert!(is_network_address("HTTP://cam/stream"));
        assert!(!is_network_address("data/videos/cam1_demo.mp4"));
        assert!(!is_network_address("/abs/path.mkv"));
    }
}
