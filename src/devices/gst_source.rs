// GStreamer-backed capture source
//
// Pipeline: uridecodebin → videoconvert → appsink (video/x-raw, BGR)
//
// uridecodebin handles both network streams (RTSP/HTTP) and local files; the
// appsink hands out one decoded frame per `read_frame` call. Network streams
// keep only the freshest frame, files are decoded in order at the pace the
// reader pulls them.

use std::path::{Path, PathBuf};
use std::time::Duration;

use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;

use super::{is_network_address, CaptureSource, Result, SourceError};
use crate::video::{sample_to_frame, Frame};

pub struct GstCaptureSource {
    address: String,
    read_timeout: Duration,
    live: bool,
    pipeline: Option<gst::Pipeline>,
    appsink: Option<gst_app::AppSink>,
}

impl GstCaptureSource {
    pub fn new(address: impl Into<String>, read_timeout: Duration) -> Self {
        let address = address.into();
        let live = is_network_address(&address);
        Self {
            address,
            read_timeout,
            live,
            pipeline: None,
            appsink: None,
        }
    }

    fn open_error(&self, reason: impl Into<String>) -> SourceError {
        SourceError::Open {
            address: self.address.clone(),
            reason: reason.into(),
        }
    }

    /// URI for uridecodebin; local paths are made absolute first
    fn uri(&self) -> Result<String> {
        if self.live || self.address.contains("://") {
            return Ok(self.address.clone());
        }

        let path = Path::new(&self.address);
        let absolute: PathBuf = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(|e| self.open_error(format!("no working directory: {}", e)))?
                .join(path)
        };

        gst::glib::filename_to_uri(&absolute, None)
            .map(|uri| uri.to_string())
            .map_err(|e| self.open_error(format!("bad path: {}", e)))
    }

    fn build_pipeline(&self) -> Result<(gst::Pipeline, gst_app::AppSink)> {
        gst::init().map_err(|e| self.open_error(e.to_string()))?;

        let uri = self.uri()?;
        let pipeline = gst::Pipeline::new();

        let decodebin = gst::ElementFactory::make("uridecodebin")
            .property("uri", uri.as_str())
            .build()
            .map_err(|e| self.open_error(format!("Failed to create uridecodebin: {}", e)))?;

        let videoconvert = gst::ElementFactory::make("videoconvert")
            .build()
            .map_err(|e| self.open_error(format!("Failed to create videoconvert: {}", e)))?;

        let caps = gst::Caps::builder("video/x-raw").field("format", "BGR").build();

        // Live streams keep only the newest frame; files block upstream so
        // no frame is skipped.
        let appsink = gst_app::AppSink::builder()
            .name("sink")
            .caps(&caps)
            .sync(false)
            .max_buffers(if self.live { 1 } else { 2 })
            .drop(self.live)
            .build();

        pipeline
            .add_many([&decodebin, &videoconvert, appsink.upcast_ref()])
            .map_err(|e| self.open_error(format!("Failed to add elements: {}", e)))?;

        videoconvert
            .link(&appsink)
            .map_err(|e| self.open_error(format!("Failed to link videoconvert → appsink: {}", e)))?;

        // Link only the video pad once the stream type is known
        let videoconvert_weak = videoconvert.downgrade();
        let address = self.address.clone();
        decodebin.connect_pad_added(move |_decodebin, src_pad| {
            let Some(videoconvert) = videoconvert_weak.upgrade() else {
                return;
            };

            let caps = src_pad
                .current_caps()
                .unwrap_or_else(|| src_pad.query_caps(None));
            let Some(structure) = caps.structure(0) else {
                return;
            };

            let name = structure.name().as_str();
            if !name.starts_with("video/") {
                log::debug!("{}: ignoring non-video pad '{}'", address, name);
                return;
            }

            if let Some(sink_pad) = videoconvert.static_pad("sink") {
                if !sink_pad.is_linked() {
                    if let Err(e) = src_pad.link(&sink_pad) {
                        log::warn!("{}: failed to link video pad: {:?}", address, e);
                    }
                }
            }
        });

        Ok((pipeline, appsink))
    }

    fn close(&mut self) {
        self.appsink = None;
        if let Some(pipeline) = self.pipeline.take() {
            let _ = pipeline.set_state(gst::State::Null);
        }
    }

    /// Drain the bus and return the first error found, if any
    fn pending_error(&self) -> Option<SourceError> {
        let bus = self.pipeline.as_ref()?.bus()?;
        let mut found = None;
        while let Some(msg) = bus.pop_filtered(&[gst::MessageType::Error, gst::MessageType::Eos]) {
            let error = match msg.view() {
                gst::MessageView::Error(err) => SourceError::Read(format!(
                    "{} ({:?})",
                    err.error(),
                    err.debug()
                )),
                _ => SourceError::EndOfStream,
            };
            found.get_or_insert(error);
        }
        found
    }
}

impl CaptureSource for GstCaptureSource {
    fn open(&mut self) -> Result<()> {
        self.close();

        let (pipeline, appsink) = self.build_pipeline()?;
        if let Err(e) = pipeline.set_state(gst::State::Playing) {
            let _ = pipeline.set_state(gst::State::Null);
            return Err(self.open_error(format!("Failed to start pipeline: {:?}", e)));
        }

        self.pipeline = Some(pipeline);
        self.appsink = Some(appsink);
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Frame> {
        let appsink = self.appsink.as_ref().ok_or(SourceError::NotOpen)?;
        let timeout_ms = self.read_timeout.as_millis() as u64;

        match appsink.try_pull_sample(gst::ClockTime::from_mseconds(timeout_ms)) {
            Some(sample) => sample_to_frame(&sample).map_err(|e| SourceError::Read(e.to_string())),
            None => {
                if appsink.is_eos() {
                    return Err(SourceError::EndOfStream);
                }
                Err(self.pending_error().unwrap_or(SourceError::Timeout(timeout_ms)))
            }
        }
    }

    fn address(&self) -> &str {
        &self.address
    }
}

impl Drop for GstCaptureSource {
    fn drop(&mut self) {
        self.close();
    }
}
