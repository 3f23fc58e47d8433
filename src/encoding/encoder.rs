//! Clip output containers
//!
//! The recorder's writer thread pushes raw BGR frames into a [`ClipSink`].
//! [`GstClipWriter`] is the production sink; tests and other backends plug in
//! through [`ClipSinkFactory`].
//!
//! Pipeline: appsrc → queue → videoconvert → encoder → [parser] → muxer → filesink

use std::path::{Path, PathBuf};
use std::time::Duration;

use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;

use super::{find_encoder, resolve_codec, ClipCodec};
use crate::video::{bgr_video_info, frame_to_buffer, Frame};

/// Error type for encoder operations
#[derive(Debug, thiserror::Error)]
pub enum EncoderError {
    #[error("GStreamer error: {0}")]
    Gst(String),

    #[error("Encoder not available: {0}")]
    NotAvailable(String),

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("Frame rejected: {0}")]
    Frame(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EncoderError>;

/// Statistics of a finished clip
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClipStats {
    pub frames_written: u64,
    pub bytes_written: u64,
    pub content_duration: Duration,
}

/// An open output container accepting frames of one fixed size
pub trait ClipSink: Send {
    fn write_frame(&mut self, frame: &Frame) -> Result<()>;

    /// Flush and close the container
    fn finish(self: Box<Self>) -> Result<ClipStats>;
}

/// Opens output containers for the recorder
pub trait ClipSinkFactory: Send + Sync {
    /// File extension of the containers this factory creates
    fn extension(&self) -> &str;

    fn create(&self, path: &Path, width: u32, height: u32, fps: u32) -> Result<Box<dyn ClipSink>>;
}

/// GStreamer-encoded clip file
pub struct GstClipWriter {
    pipeline: gst::Pipeline,
    appsrc: gst_app::AppSrc,
    info: gst_video::VideoInfo,
    output_path: PathBuf,
    frame_duration_ns: u64,
    frames_written: u64,
}

impl GstClipWriter {
    pub fn new(path: &Path, codec: ClipCodec, width: u32, height: u32, fps: u32) -> Result<Self> {
        gst::init().map_err(|e| EncoderError::Gst(e.to_string()))?;

        let fps = fps.max(1);
        let info = bgr_video_info(width, height, fps).map_err(|e| EncoderError::Gst(e.to_string()))?;
        let caps = info
            .to_caps()
            .map_err(|e| EncoderError::Gst(format!("Failed to build caps: {}", e)))?;

        let encoder_name = find_encoder(codec)
            .ok_or_else(|| EncoderError::NotAvailable(codec.display_name().to_string()))?;

        log::info!(
            "Creating {} clip writer ({}, {}x{} @ {}fps) at {:?}",
            codec.container().extension(),
            encoder_name,
            width,
            height,
            fps,
            path
        );

        let pipeline = gst::Pipeline::new();

        let appsrc = gst_app::AppSrc::builder()
            .name("src")
            .caps(&caps)
            .format(gst::Format::Time)
            .stream_type(gst_app::AppStreamType::Stream)
            .build();

        // Queue to decouple appsrc from the encoder
        let queue = gst::ElementFactory::make("queue")
            .property("max-size-buffers", 30u32)
            .property("max-size-time", 0u64)
            .property("max-size-bytes", 0u32)
            .build()
            .map_err(|e| EncoderError::Pipeline(format!("Failed to create queue: {}", e)))?;

        let videoconvert = gst::ElementFactory::make("videoconvert")
            .build()
            .map_err(|e| EncoderError::Pipeline(format!("Failed to create videoconvert: {}", e)))?;

        let encoder = Self::create_encoder(encoder_name)?;

        let muxer_name = codec.container().gst_muxer();
        let muxer = gst::ElementFactory::make(muxer_name)
            .build()
            .map_err(|e| EncoderError::Pipeline(format!("Failed to create {}: {}", muxer_name, e)))?;

        let filesink = gst::ElementFactory::make("filesink")
            .property("location", path.to_string_lossy().to_string())
            .property("async", false)
            .property("sync", false)
            .build()
            .map_err(|e| EncoderError::Pipeline(format!("Failed to create filesink: {}", e)))?;

        let mut elements: Vec<gst::Element> = vec![
            appsrc.clone().upcast(),
            queue,
            videoconvert,
            encoder,
        ];
        if let Some(parser_name) = codec.gst_parser() {
            let parser = gst::ElementFactory::make(parser_name)
                .build()
                .map_err(|e| EncoderError::Pipeline(format!("Failed to create {}: {}", parser_name, e)))?;
            elements.push(parser);
        }
        elements.push(muxer);
        elements.push(filesink);

        pipeline
            .add_many(elements.iter())
            .map_err(|e| EncoderError::Pipeline(format!("Failed to add elements: {}", e)))?;
        gst::Element::link_many(elements.iter())
            .map_err(|e| EncoderError::Pipeline(format!("Failed to link elements: {}", e)))?;

        pipeline
            .set_state(gst::State::Playing)
            .map_err(|e| EncoderError::Pipeline(format!("Failed to start pipeline: {:?}", e)))?;

        Ok(Self {
            pipeline,
            appsrc,
            info,
            output_path: path.to_path_buf(),
            frame_duration_ns: 1_000_000_000 / fps as u64,
            frames_written: 0,
        })
    }

    /// Create the encoder element with settings suited to offline clip writing
    fn create_encoder(name: &str) -> Result<gst::Element> {
        let encoder = gst::ElementFactory::make(name)
            .build()
            .map_err(|e| EncoderError::NotAvailable(format!("Failed to create {}: {}", name, e)))?;

        match name {
            "x264enc" => {
                encoder.set_property_from_str("speed-preset", "veryfast");
            }
            "jpegenc" => {
                encoder.set_property("quality", 85i32);
            }
            _ => {}
        }

        Ok(encoder)
    }

    /// First error posted on the bus since the last check
    fn bus_error(&self) -> Option<String> {
        let bus = self.pipeline.bus()?;
        let msg = bus.pop_filtered(&[gst::MessageType::Error])?;
        match msg.view() {
            gst::MessageView::Error(err) => Some(format!("{} ({:?})", err.error(), err.debug())),
            _ => None,
        }
    }
}

impl ClipSink for GstClipWriter {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        if let Some(err) = self.bus_error() {
            return Err(EncoderError::Pipeline(err));
        }

        let mut buffer =
            frame_to_buffer(frame, &self.info).map_err(|e| EncoderError::Frame(e.to_string()))?;
        {
            let buffer_ref = buffer
                .get_mut()
                .ok_or_else(|| EncoderError::Pipeline("Buffer is shared".into()))?;
            buffer_ref.set_pts(gst::ClockTime::from_nseconds(
                self.frames_written * self.frame_duration_ns,
            ));
            buffer_ref.set_duration(gst::ClockTime::from_nseconds(self.frame_duration_ns));
        }

        self.appsrc
            .push_buffer(buffer)
            .map_err(|e| EncoderError::Pipeline(format!("Failed to push buffer: {:?}", e)))?;
        self.frames_written += 1;
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<ClipStats> {
        if let Err(e) = self.appsrc.end_of_stream() {
            log::warn!("Failed to send EOS to clip writer: {:?}", e);
        }

        // Wait for EOS so the muxer can finalize the container
        let mut pipeline_error = None;
        if let Some(bus) = self.pipeline.bus() {
            for msg in bus.iter_timed(gst::ClockTime::from_seconds(30)) {
                match msg.view() {
                    gst::MessageView::Eos(..) => break,
                    gst::MessageView::Error(err) => {
                        pipeline_error = Some(format!("{} ({:?})", err.error(), err.debug()));
                        break;
                    }
                    _ => {}
                }
            }
        }

        let _ = self.pipeline.set_state(gst::State::Null);

        if let Some(err) = pipeline_error {
            return Err(EncoderError::Pipeline(err));
        }

        let bytes_written = std::fs::metadata(&self.output_path)
            .map(|m| m.len())
            .unwrap_or(0);

        Ok(ClipStats {
            frames_written: self.frames_written,
            bytes_written,
            content_duration: Duration::from_nanos(self.frames_written * self.frame_duration_ns),
        })
    }
}

impl Drop for GstClipWriter {
    fn drop(&mut self) {
        // Covers error paths where finish() was never reached
        let _ = self.pipeline.set_state(gst::State::Null);
    }
}

/// Creates [`GstClipWriter`]s for one codec
#[derive(Debug, Clone, Copy)]
pub struct GstClipWriterFactory {
    codec: ClipCodec,
}

impl GstClipWriterFactory {
    /// Use `preferred` when an encoder for it is installed, MJPEG otherwise
    pub fn new(preferred: ClipCodec) -> Self {
        Self {
            codec: resolve_codec(preferred),
        }
    }

    pub fn codec(&self) -> ClipCodec {
        self.codec
    }
}

impl ClipSinkFactory for GstClipWriterFactory {
    fn extension(&self) -> &str {
        self.codec.container().extension()
    }

    fn create(&self, path: &Path, width: u32, height: u32, fps: u32) -> Result<Box<dyn ClipSink>> {
        let writer = GstClipWriter::new(path, self.codec, width, height, fps)?;
        Ok(Box::new(writer))
    }
}
