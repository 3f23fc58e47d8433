// Single-frame JPEG export
//
// Pipeline: appsrc → videoconvert → jpegenc → filesink

use std::path::Path;

use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;

use super::{bgr_video_info, frame_to_buffer, Frame, Result, VideoError};

/// Encode one frame as a JPEG file
pub fn save_jpeg(frame: &Frame, path: &Path) -> Result<()> {
    gst::init().map_err(|e| VideoError::Gst(e.to_string()))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let info = bgr_video_info(frame.width(), frame.height(), 1)?;
    let caps = info
        .to_caps()
        .map_err(|e| VideoError::Gst(format!("Failed to build caps: {}", e)))?;

    let pipeline = gst::Pipeline::new();

    let appsrc = gst_app::AppSrc::builder()
        .caps(&caps)
        .format(gst::Format::Time)
        .build();

    let videoconvert = gst::ElementFactory::make("videoconvert")
        .build()
        .map_err(|e| VideoError::Gst(format!("Failed to create videoconvert: {}", e)))?;

    let jpegenc = gst::ElementFactory::make("jpegenc")
        .property("quality", 95i32)
        .build()
        .map_err(|e| VideoError::Gst(format!("Failed to create jpegenc: {}", e)))?;

    let filesink = gst::ElementFactory::make("filesink")
        .property("location", path.to_string_lossy().to_string())
        .property("async", false)
        .build()
        .map_err(|e| VideoError::Gst(format!("Failed to create filesink: {}", e)))?;

    pipeline
        .add_many([appsrc.upcast_ref(), &videoconvert, &jpegenc, &filesink])
        .map_err(|e| VideoError::Gst(format!("Failed to add elements: {}", e)))?;
    gst::Element::link_many([appsrc.upcast_ref(), &videoconvert, &jpegenc, &filesink])
        .map_err(|e| VideoError::Gst(format!("Failed to link elements: {}", e)))?;

    pipeline
        .set_state(gst::State::Playing)
        .map_err(|e| VideoError::Gst(format!("Failed to start snapshot pipeline: {:?}", e)))?;

    let mut buffer = frame_to_buffer(frame, &info)?;
    if let Some(buffer_ref) = buffer.get_mut() {
        buffer_ref.set_pts(gst::ClockTime::ZERO);
    }

    let push = appsrc
        .push_buffer(buffer)
        .map_err(|e| VideoError::Gst(format!("Failed to push snapshot buffer: {:?}", e)))
        .and_then(|_| {
            appsrc
                .end_of_stream()
                .map_err(|e| VideoError::Gst(format!("Failed to send EOS: {:?}", e)))
        });

    let mut outcome = push.map(|_| ());
    if outcome.is_ok() {
        if let Some(bus) = pipeline.bus() {
            for msg in bus.iter_timed(gst::ClockTime::from_seconds(5)) {
                match msg.view() {
                    gst::MessageView::Eos(..) => break,
                    gst::MessageView::Error(err) => {
                        outcome = Err(VideoError::Gst(format!(
                            "Snapshot pipeline error: {} ({:?})",
                            err.error(),
                            err.debug()
                        )));
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    let _ = pipeline.set_state(gst::State::Null);
    outcome
}
