// Shared fixtures for the integration tests
#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use camgrid_lib::devices::{CaptureSource, SourceError};
use camgrid_lib::encoding::{ClipSink, ClipSinkFactory, ClipStats, EncoderError};
use camgrid_lib::video::{Frame, Passthrough, PlaceholderRenderer, Transforms};
use parking_lot::Mutex;

pub const PLACEHOLDER_BGR: [u8; 3] = [7, 7, 7];

/// Solid tile, easy to recognise on the canvas
pub struct SolidPlaceholder;

impl PlaceholderRenderer for SolidPlaceholder {
    fn render_disconnected(&self, size: u32) -> Frame {
        Frame::filled(size, size, PLACEHOLDER_BGR)
    }
}

pub fn transforms() -> Transforms {
    Transforms::new(Arc::new(Passthrough), Arc::new(SolidPlaceholder))
}

/// 2×2 frame whose blue channel carries `tag`
pub fn tagged(tag: u8) -> Frame {
    Frame::filled(2, 2, [tag, 0, 0])
}

pub fn tag_of(frame: &Frame) -> u8 {
    frame.pixel(0, 0)[0]
}

/// Poll `cond` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    cond()
}

#[derive(Debug, Clone)]
pub enum Step {
    Frame(Frame),
    Fail,
}

/// What a scripted source does once its script runs out
#[derive(Debug, Clone)]
pub enum Then {
    /// Yield frames tagged 1, 2, 3, … forever
    Count,
    Repeat(Frame),
    FailForever,
}

/// Capture source replaying a fixed script of reads
pub struct ScriptedSource {
    script: VecDeque<Step>,
    then: Then,
    counter: u8,
    opens: Arc<AtomicUsize>,
    reads: Arc<AtomicUsize>,
    fail_open: bool,
}

impl ScriptedSource {
    pub fn new(script: Vec<Step>, then: Then) -> Self {
        Self {
            script: script.into(),
            then,
            counter: 0,
            opens: Arc::new(AtomicUsize::new(0)),
            reads: Arc::new(AtomicUsize::new(0)),
            fail_open: false,
        }
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn opens(&self) -> Arc<AtomicUsize> {
        self.opens.clone()
    }

    pub fn reads(&self) -> Arc<AtomicUsize> {
        self.reads.clone()
    }
}

impl CaptureSource for ScriptedSource {
    fn open(&mut self) -> Result<(), SourceError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.fail_open {
            return Err(SourceError::Open {
                address: self.address().to_string(),
                reason: "scripted".into(),
            });
        }
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Frame, SourceError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(step) = self.script.pop_front() {
            return match step {
                Step::Frame(frame) => Ok(frame),
                Step::Fail => Err(SourceError::Read("scripted failure".into())),
            };
        }
        match &self.then {
            Then::Count => {
                self.counter = self.counter.wrapping_add(1);
                Ok(tagged(self.counter))
            }
            Then::Repeat(frame) => Ok(frame.clone()),
            Then::FailForever => {
                // Keep a dead source from spinning the test machine
                std::thread::sleep(Duration::from_micros(200));
                Err(SourceError::Read("scripted failure".into()))
            }
        }
    }

    fn address(&self) -> &str {
        "scripted://test"
    }
}

/// A clip captured in memory
#[derive(Debug, Clone)]
pub struct MemoryClip {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub frames: Vec<Frame>,
    pub finished: bool,
}

/// Clip factory keeping every written frame; optionally fails a write
#[derive(Default)]
pub struct MemoryClipFactory {
    pub clips: Arc<Mutex<Vec<MemoryClip>>>,
    /// Fail the write of the frame at this index (0-based)
    pub fail_at: Option<usize>,
}

impl MemoryClipFactory {
    pub fn failing_at(index: usize) -> Self {
        Self {
            fail_at: Some(index),
            ..Self::default()
        }
    }

    pub fn clips(&self) -> Vec<MemoryClip> {
        self.clips.lock().clone()
    }
}

struct MemorySink {
    index: usize,
    clips: Arc<Mutex<Vec<MemoryClip>>>,
    fail_at: Option<usize>,
}

impl ClipSink for MemorySink {
    fn write_frame(&mut self, frame: &Frame) -> Result<(), EncoderError> {
        let mut clips = self.clips.lock();
        let clip = &mut clips[self.index];
        if self.fail_at == Some(clip.frames.len()) {
            return Err(EncoderError::Pipeline("disk full".into()));
        }
        clip.frames.push(frame.clone());
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<ClipStats, EncoderError> {
        let mut clips = self.clips.lock();
        let clip = &mut clips[self.index];
        clip.finished = true;
        Ok(ClipStats {
            frames_written: clip.frames.len() as u64,
            bytes_written: 0,
            content_duration: Duration::from_secs_f64(
                clip.frames.len() as f64 / clip.fps.max(1) as f64,
            ),
        })
    }
}

impl ClipSinkFactory for MemoryClipFactory {
    fn extension(&self) -> &str {
        "mkv"
    }

    fn create(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        fps: u32,
    ) -> Result<Box<dyn ClipSink>, EncoderError> {
        // Reserve the name on disk like a real container would
        std::fs::write(path, b"")?;
        let mut clips = self.clips.lock();
        clips.push(MemoryClip {
            path: path.to_path_buf(),
            width,
            height,
            fps,
            frames: Vec::new(),
            finished: false,
        });
        Ok(Box::new(MemorySink {
            index: clips.len() - 1,
            clips: self.clips.clone(),
            fail_at: self.fail_at,
        }))
    }
}
