// Event recording: pre-roll buffering, session state and the clip writer

pub mod fps;
pub mod preroll;
pub mod recorder;
pub mod writer;

pub use fps::{FpsEstimator, FpsGate};
pub use preroll::FramePrerollBuffer;
pub use recorder::{EventRecorder, RecorderSettings, StartOutcome};
pub use writer::ClipSummary;

use serde::{Deserialize, Serialize};

use crate::encoding::EncoderError;

/// Current recording state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecordingStatus {
    /// Buffering pre-roll only
    Idle,
    /// Queueing every ingested frame
    Recording,
    /// Queueing post-roll frames after a stop signal
    Draining,
    /// The clip writer gave up; cleared by the next start
    Failed,
}

impl RecordingStatus {
    /// A session is open and frames are being queued
    pub fn is_active(&self) -> bool {
        matches!(self, RecordingStatus::Recording | RecordingStatus::Draining)
    }
}

/// Error type for recorder operations
#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encoder error: {0}")]
    Encoder(#[from] EncoderError),

    #[error("Clip write failed: {0}")]
    WriteFailed(String),

    #[error("Failed to spawn clip writer: {0}")]
    Spawn(std::io::Error),

    #[error("Clip writer panicked")]
    WriterPanicked,

    #[error("A recording session is still open")]
    SessionActive,
}

pub type Result<T> = std::result::Result<T, RecorderError>;
