// Frame handling module
//
// Frames travel through the crate as packed BGR buffers. This module owns the
// `Frame` type, the placement rectangles used by the mosaic, the external
// transform seams and the conversions to and from GStreamer buffers.

pub mod frame;
pub mod snapshot;
pub mod transform;

pub use frame::{Frame, GridRect, CHANNELS};
pub use snapshot::save_jpeg;
pub use transform::{CrossPlaceholder, Passthrough, PlaceholderRenderer, Rectifier, Transforms};

use gstreamer as gst;
use gstreamer_video as gst_video;
use gstreamer_video::prelude::VideoFrameExt;

/// Error type for frame operations
#[derive(Debug, thiserror::Error)]
pub enum VideoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("GStreamer error: {0}")]
    Gst(String),
}

pub type Result<T> = std::result::Result<T, VideoError>;

/// Raw BGR video info for a frame size at a whole-number frame rate
pub fn bgr_video_info(width: u32, height: u32, fps: u32) -> Result<gst_video::VideoInfo> {
    gst_video::VideoInfo::builder(gst_video::VideoFormat::Bgr, width, height)
        .fps(gst::Fraction::new(fps.max(1) as i32, 1))
        .build()
        .map_err(|e| VideoError::Gst(format!("Failed to build video info: {}", e)))
}

/// Copy a packed frame into a GStreamer buffer laid out per `info`.
///
/// GStreamer pads BGR rows to 4-byte strides, so rows are copied one at a
/// time whenever the stride differs from the packed row size.
pub fn frame_to_buffer(frame: &Frame, info: &gst_video::VideoInfo) -> Result<gst::Buffer> {
    if info.width() != frame.width() || info.height() != frame.height() {
        return Err(VideoError::InvalidFrame(format!(
            "frame is {}x{}, stream expects {}x{}",
            frame.width(),
            frame.height(),
            info.width(),
            info.height()
        )));
    }

    let stride = info.stride()[0] as usize;
    let row_bytes = frame.width() as usize * CHANNELS;
    if stride == row_bytes {
        return Ok(gst::Buffer::from_slice(frame.data().to_vec()));
    }

    let mut padded = vec![0u8; info.size()];
    for (row, chunk) in frame.data().chunks_exact(row_bytes).enumerate() {
        padded[row * stride..row * stride + row_bytes].copy_from_slice(chunk);
    }
    Ok(gst::Buffer::from_slice(padded))
}

/// Read a BGR GStreamer sample back into a packed frame
pub fn sample_to_frame(sample: &gst::Sample) -> Result<Frame> {
    let caps = sample
        .caps()
        .ok_or_else(|| VideoError::Gst("Sample has no caps".into()))?;
    let info = gst_video::VideoInfo::from_caps(caps)
        .map_err(|e| VideoError::Gst(format!("Unreadable caps {}: {}", caps, e)))?;
    if info.format() != gst_video::VideoFormat::Bgr {
        return Err(VideoError::InvalidFrame(format!(
            "expected BGR samples, got {:?}",
            info.format()
        )));
    }

    let buffer = sample
        .buffer()
        .ok_or_else(|| VideoError::Gst("Sample has no buffer".into()))?;
    let vframe = gst_video::VideoFrameRef::from_buffer_ref_readable(buffer, &info)
        .map_err(|e| VideoError::Gst(format!("Failed to map frame: {}", e)))?;

    let width = vframe.width();
    let height = vframe.height();
    let stride = vframe.plane_stride()[0] as usize;
    let plane = vframe
        .plane_data(0)
        .map_err(|e| VideoError::Gst(format!("Failed to read plane: {}", e)))?;

    let row_bytes = width as usize * CHANNELS;
    let mut data = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let line = plane.get(start..start + row_bytes).ok_or_else(|| {
            VideoError::InvalidFrame(format!("plane too short for row {}", row))
        })?;
        data.extend_from_slice(line);
    }

    Frame::new(width, height, data)
}
