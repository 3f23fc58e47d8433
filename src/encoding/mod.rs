// Clip encoding and container format support
//
// This module defines the codecs a clip can be written with and their
// container mappings. To add a new codec:
// 1. Add variant to ClipCodec
// 2. Add its encoder candidates in encoder_candidates()
// 3. Add container mapping in container()

pub mod encoder;

pub use encoder::{
    ClipSink, ClipSinkFactory, ClipStats, EncoderError, GstClipWriter, GstClipWriterFactory,
};

use gstreamer as gst;
use serde::{Deserialize, Serialize};

/// Supported codecs for recorded clips
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClipCodec {
    /// H.264/AVC in MP4 - widely supported
    #[default]
    H264,
    /// Motion JPEG in MKV - always available, larger files
    Mjpeg,
}

impl ClipCodec {
    /// GStreamer encoder elements for this codec, in order of preference
    pub fn encoder_candidates(&self) -> &'static [&'static str] {
        match self {
            ClipCodec::H264 => &["x264enc", "openh264enc", "vah264enc", "vaapih264enc"],
            ClipCodec::Mjpeg => &["jpegenc"],
        }
    }

    /// Parser placed between encoder and muxer, if the codec needs one
    pub fn gst_parser(&self) -> Option<&'static str> {
        match self {
            ClipCodec::H264 => Some("h264parse"),
            ClipCodec::Mjpeg => None,
        }
    }

    /// Get the appropriate container format for this codec
    pub fn container(&self) -> ContainerFormat {
        match self {
            ClipCodec::H264 => ContainerFormat::Mp4,
            ClipCodec::Mjpeg => ContainerFormat::Mkv,
        }
    }

    /// Human-readable display name
    pub fn display_name(&self) -> &'static str {
        match self {
            ClipCodec::H264 => "H.264",
            ClipCodec::Mjpeg => "MJPEG",
        }
    }
}

/// Supported container formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFormat {
    /// Matroska (.mkv) - flexible, supports any codec
    Mkv,
    /// MP4 (.mp4) - widely compatible
    Mp4,
}

impl ContainerFormat {
    /// Get the file extension for this container
    pub fn extension(&self) -> &'static str {
        match self {
            ContainerFormat::Mkv => "mkv",
            ContainerFormat::Mp4 => "mp4",
        }
    }

    /// Get the GStreamer muxer element name
    pub fn gst_muxer(&self) -> &'static str {
        match self {
            ContainerFormat::Mkv => "matroskamux",
            ContainerFormat::Mp4 => "mp4mux",
        }
    }
}

/// First installed encoder element for `codec`, if any
pub fn find_encoder(codec: ClipCodec) -> Option<&'static str> {
    codec
        .encoder_candidates()
        .iter()
        .copied()
        .find(|name| gst::ElementFactory::find(name).is_some())
}

/// Resolve the codec to actually use: the preferred one when an encoder for it
/// is installed, otherwise MJPEG.
pub fn resolve_codec(preferred: ClipCodec) -> ClipCodec {
    if gst::init().is_err() {
        return preferred;
    }
    if find_encoder(preferred).is_some() {
        return preferred;
    }
    log::warn!(
        "No {} encoder installed, falling back to {}",
        preferred.display_name(),
        ClipCodec::Mjpeg.display_name()
    );
    ClipCodec::Mjpeg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codecs_map_to_containers() {
        assert_eq!(ClipCodec::H264.container().extension(), "mp4");
        assert_eq!(ClipCodec::Mjpeg.container().extension(), "mkv");
        assert_eq!(ClipCodec::Mjpeg.gst_parser(), None);
        assert_eq!(ClipCodec::default(), ClipCodec::H264);
    }
}
