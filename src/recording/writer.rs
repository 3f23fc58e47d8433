//! Background clip writer
//!
//! One writer thread runs per recording session. It drains the session queue
//! in arrival order into a [`ClipSink`] and exits once the recorder drops the
//! sending half and the queue is empty.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use crossbeam_channel::{Receiver, TryRecvError};
use parking_lot::Mutex;

use super::fps::FpsGate;
use super::{RecorderError, Result};
use crate::encoding::{ClipSink, ClipSinkFactory, ClipStats};
use crate::video::Frame;

/// How long the writer waits on the rate gate before checking its queue again
const FPS_WAIT_SLICE: Duration = Duration::from_millis(20);

/// Result of one finished clip
#[derive(Debug, Clone, PartialEq)]
pub struct ClipSummary {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub stats: ClipStats,
}

/// `YYYYMMDD_HHMMSS.<ext>` for the given local time
pub fn clip_file_name(now: DateTime<Local>, extension: &str) -> String {
    format!("{}.{}", now.format("%Y%m%d_%H%M%S"), extension)
}

/// Avoid clobbering a clip started within the same second
fn unique_path(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }
    let (stem, ext) = file_name.rsplit_once('.').unwrap_or((file_name, ""));
    (1..)
        .map(|n| dir.join(format!("{}_{}.{}", stem, n, ext)))
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

pub(crate) struct WriterJob {
    pub queue: Receiver<Arc<Frame>>,
    pub output_dir: PathBuf,
    pub factory: Arc<dyn ClipSinkFactory>,
    pub fps: Arc<FpsGate>,
    pub failure: Arc<Mutex<Option<String>>>,
}

impl WriterJob {
    /// Write the session's clip. `Ok(None)` when the session closed without frames.
    pub fn run(self) -> Result<Option<ClipSummary>> {
        match self.write_clip() {
            Ok(summary) => Ok(summary),
            Err(e) => {
                log::error!("Clip writer failed: {}", e);
                *self.failure.lock() = Some(e.to_string());
                Err(e)
            }
        }
    }

    fn write_clip(&self) -> Result<Option<ClipSummary>> {
        let file_name = clip_file_name(Local::now(), self.factory.extension());
        let path = unique_path(&self.output_dir, &file_name);

        let mut staged = VecDeque::new();
        let fps = self.wait_for_fps(&mut staged);

        let first = match staged.front() {
            Some(frame) => frame.clone(),
            None => match self.queue.recv() {
                Ok(frame) => {
                    staged.push_back(frame.clone());
                    frame
                }
                Err(_) => {
                    log::info!("Session closed before any frame arrived; no clip written");
                    return Ok(None);
                }
            },
        };
        let (width, height) = (first.width(), first.height());

        let mut sink = self.factory.create(&path, width, height, fps)?;
        log::info!(
            "Recording clip {:?} ({}x{} @ {}fps)",
            path,
            width,
            height,
            fps
        );

        let mut resized_warned = false;
        for frame in staged.drain(..).chain(self.queue.iter()) {
            if frame.width() == width && frame.height() == height {
                write_one(sink.as_mut(), &frame)?;
            } else {
                if !resized_warned {
                    log::warn!(
                        "Frame size {}x{} differs from clip size {}x{}; resizing",
                        frame.width(),
                        frame.height(),
                        width,
                        height
                    );
                    resized_warned = true;
                }
                write_one(sink.as_mut(), &frame.resize(width, height))?;
            }
        }

        let stats = sink.finish().map_err(|e| RecorderError::WriteFailed(e.to_string()))?;
        log::info!(
            "Finished clip {:?}: {} frames, {} bytes",
            path,
            stats.frames_written,
            stats.bytes_written
        );

        Ok(Some(ClipSummary {
            path,
            width,
            height,
            fps,
            stats,
        }))
    }

    /// Block until the frame rate is known, staging queued frames meanwhile.
    /// A session that closes first gets the provisional estimate.
    fn wait_for_fps(&self, staged: &mut VecDeque<Arc<Frame>>) -> u32 {
        loop {
            if let Some(fps) = self.fps.wait_resolved(FPS_WAIT_SLICE) {
                return fps;
            }
            loop {
                match self.queue.try_recv() {
                    Ok(frame) => staged.push_back(frame),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        let fps = self.fps.provisional();
                        log::warn!(
                            "Session closed before the ingest rate was measured; using {} fps",
                            fps
                        );
                        return fps;
                    }
                }
            }
        }
    }
}

fn write_one(sink: &mut dyn ClipSink, frame: &Frame) -> Result<()> {
    sink.write_frame(frame)
        .map_err(|e| RecorderError::WriteFailed(e.to_string()))
}
