//! Event-triggered clip recorder
//!
//! Frames flow in through [`EventRecorder::ingest_frame`] and always land in
//! the pre-roll buffer. A start signal seeds a new session queue with the
//! buffered frames and spawns a writer thread; a stop signal lets a fixed
//! number of post-roll frames through before the queue is closed.
//!
//! ```text
//! Idle ──start──▶ Recording ──stop──▶ Draining ──P frames──▶ Idle
//!                     ▲                   │
//!                     └──────start────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::Sender;
use parking_lot::Mutex;

use super::fps::FpsGate;
use super::preroll::FramePrerollBuffer;
use super::writer::{ClipSummary, WriterJob};
use super::{RecorderError, RecordingStatus, Result};
use crate::config::RecorderConfig;
use crate::encoding::{ClipSinkFactory, GstClipWriterFactory};
use crate::video::Frame;

/// Recorder parameters
#[derive(Debug, Clone)]
pub struct RecorderSettings {
    pub output_dir: PathBuf,
    /// Clip frame rate; measured from the first ingested frames when `None`
    pub fps: Option<u32>,
    /// Pre-roll capacity (B)
    pub pre_roll_frames: usize,
    /// Frames written after a stop signal (P)
    pub post_roll_frames: usize,
}

impl From<&RecorderConfig> for RecorderSettings {
    fn from(config: &RecorderConfig) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            fps: config.fps,
            pre_roll_frames: config.pre_roll_frames,
            post_roll_frames: config.post_roll_frames,
        }
    }
}

/// What a start signal did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new session and writer were started
    Started,
    /// A session was already recording
    AlreadyRecording,
    /// A pending drain was cancelled; the session continues
    Resumed,
}

struct SessionState {
    status: RecordingStatus,
    preroll: FramePrerollBuffer,
    /// Open while a session is active; dropping it ends the writer
    queue: Option<Sender<Arc<Frame>>>,
    post_roll_appended: usize,
    /// Filled by the current writer if it fails
    writer_failure: Arc<Mutex<Option<String>>>,
}

pub struct EventRecorder {
    settings: RecorderSettings,
    factory: Arc<dyn ClipSinkFactory>,
    fps: Arc<FpsGate>,
    session: Mutex<SessionState>,
    /// Serializes start signals and owns the latest writer thread
    writer: Mutex<Option<JoinHandle<Result<Option<ClipSummary>>>>>,
    last_failure: Mutex<Option<String>>,
}

impl EventRecorder {
    pub fn new(settings: RecorderSettings, factory: Arc<dyn ClipSinkFactory>) -> Self {
        log::info!(
            "Event recorder: pre-roll {} frames, post-roll {} frames, fps {}, output {:?}",
            settings.pre_roll_frames,
            settings.post_roll_frames,
            settings
                .fps
                .map(|fps| fps.to_string())
                .unwrap_or_else(|| "auto".into()),
            settings.output_dir
        );

        Self {
            fps: Arc::new(FpsGate::new(settings.fps)),
            session: Mutex::new(SessionState {
                status: RecordingStatus::Idle,
                preroll: FramePrerollBuffer::new(settings.pre_roll_frames),
                queue: None,
                post_roll_appended: 0,
                writer_failure: Arc::new(Mutex::new(None)),
            }),
            writer: Mutex::new(None),
            last_failure: Mutex::new(None),
            settings,
            factory,
        }
    }

    /// Recorder writing GStreamer-encoded clips with the configured codec
    pub fn from_config(config: &RecorderConfig) -> Self {
        Self::new(
            RecorderSettings::from(config),
            Arc::new(GstClipWriterFactory::new(config.codec)),
        )
    }

    /// Feed one frame. Errors only when the session's writer has failed.
    pub fn ingest_frame(&self, frame: impl Into<Arc<Frame>>) -> Result<()> {
        let frame = frame.into();
        self.fps.record_ingest(Instant::now());

        let mut session = self.session.lock();
        session.preroll.push(frame.clone());

        match session.status {
            RecordingStatus::Recording => self.enqueue(&mut session, frame),
            RecordingStatus::Draining => {
                self.enqueue(&mut session, frame)?;
                session.post_roll_appended += 1;
                if session.post_roll_appended >= self.settings.post_roll_frames {
                    close_session(&mut session);
                }
                Ok(())
            }
            RecordingStatus::Idle | RecordingStatus::Failed => Ok(()),
        }
    }

    fn enqueue(&self, session: &mut SessionState, frame: Arc<Frame>) -> Result<()> {
        let Some(queue) = &session.queue else {
            return Ok(());
        };
        if queue.send(frame).is_ok() {
            return Ok(());
        }

        // Receiver gone: the writer exited early
        let reason = session
            .writer_failure
            .lock()
            .clone()
            .unwrap_or_else(|| "clip writer stopped".to_string());
        Err(self.fail_session(session, reason))
    }

    /// Move an active session to `Failed` if its writer has already reported an error
    fn check_writer_failure(&self, session: &mut SessionState) {
        if !session.status.is_active() {
            return;
        }
        let reason = session.writer_failure.lock().clone();
        if let Some(reason) = reason {
            self.fail_session(session, reason);
        }
    }

    fn fail_session(&self, session: &mut SessionState, reason: String) -> RecorderError {
        session.queue = None;
        session.status = RecordingStatus::Failed;
        session.post_roll_appended = 0;
        *self.last_failure.lock() = Some(reason.clone());
        log::error!("Recording session failed: {}", reason);
        RecorderError::WriteFailed(reason)
    }

    /// Start a session, or keep the current one going.
    ///
    /// Blocks until the previous session's writer has finished.
    pub fn start_record(&self) -> Result<StartOutcome> {
        let mut writer = self.writer.lock();

        {
            let mut session = self.session.lock();
            self.check_writer_failure(&mut session);
            match session.status {
                RecordingStatus::Recording => {
                    session.post_roll_appended = 0;
                    return Ok(StartOutcome::AlreadyRecording);
                }
                RecordingStatus::Draining => {
                    session.status = RecordingStatus::Recording;
                    session.post_roll_appended = 0;
                    log::info!("Start during post-roll; continuing the current clip");
                    return Ok(StartOutcome::Resumed);
                }
                RecordingStatus::Idle | RecordingStatus::Failed => {}
            }
        }

        if let Some(previous) = writer.take() {
            log::debug!("Waiting for the previous clip writer to finish");
            if let Err(e) = self.join_writer(previous) {
                log::warn!("Previous clip did not finish cleanly: {}", e);
            }
        }

        std::fs::create_dir_all(&self.settings.output_dir)?;

        let (tx, rx) = crossbeam_channel::unbounded();
        let failure = Arc::new(Mutex::new(None));

        let mut session = self.session.lock();
        for frame in session.preroll.frames() {
            // Receiver is held locally, send cannot fail
            let _ = tx.send(frame.clone());
        }
        let seeded = session.preroll.len();

        let job = WriterJob {
            queue: rx,
            output_dir: self.settings.output_dir.clone(),
            factory: self.factory.clone(),
            fps: self.fps.clone(),
            failure: failure.clone(),
        };
        let handle = thread::Builder::new()
            .name("camgrid-clip-writer".into())
            .spawn(move || job.run())
            .map_err(RecorderError::Spawn)?;

        session.queue = Some(tx);
        session.status = RecordingStatus::Recording;
        session.post_roll_appended = 0;
        session.writer_failure = failure;
        *writer = Some(handle);

        log::info!("Recording started with {} pre-roll frames", seeded);
        Ok(StartOutcome::Started)
    }

    /// Begin the post-roll. No-op unless recording.
    pub fn stop_record(&self) {
        let mut session = self.session.lock();
        self.check_writer_failure(&mut session);
        if session.status != RecordingStatus::Recording {
            log::debug!("Stop ignored in state {:?}", session.status);
            return;
        }

        if self.settings.post_roll_frames == 0 {
            close_session(&mut session);
        } else {
            session.status = RecordingStatus::Draining;
            session.post_roll_appended = 0;
            log::info!(
                "Recording stopping after {} post-roll frames",
                self.settings.post_roll_frames
            );
        }
    }

    pub fn status(&self) -> RecordingStatus {
        let mut session = self.session.lock();
        self.check_writer_failure(&mut session);
        session.status
    }

    pub fn is_recording(&self) -> bool {
        self.status().is_active()
    }

    pub fn preroll_len(&self) -> usize {
        self.session.lock().preroll.len()
    }

    /// Clip rate once configured or measured
    pub fn resolved_fps(&self) -> Option<u32> {
        self.fps.resolved()
    }

    /// Message of the most recent writer failure
    pub fn last_failure(&self) -> Option<String> {
        self.last_failure.lock().clone()
    }

    pub fn settings(&self) -> &RecorderSettings {
        &self.settings
    }

    /// Wait for the last closed session's writer to finish.
    ///
    /// Returns `Ok(None)` when no writer ran or the session had no frames.
    pub fn wait_for_writer(&self) -> Result<Option<ClipSummary>> {
        let mut writer = self.writer.lock();
        if self.status().is_active() {
            return Err(RecorderError::SessionActive);
        }
        match writer.take() {
            Some(handle) => self.join_writer(handle),
            None => Ok(None),
        }
    }

    fn join_writer(
        &self,
        handle: JoinHandle<Result<Option<ClipSummary>>>,
    ) -> Result<Option<ClipSummary>> {
        let result = handle.join().map_err(|_| RecorderError::WriterPanicked)?;
        if let Err(e) = &result {
            let mut session = self.session.lock();
            *self.last_failure.lock() = Some(e.to_string());
            if session.status == RecordingStatus::Idle {
                session.status = RecordingStatus::Failed;
            }
        }
        result
    }
}

/// Drop the queue sender so the writer finishes after the queued frames
fn close_session(session: &mut SessionState) {
    session.queue = None;
    session.status = RecordingStatus::Idle;
    session.post_roll_appended = 0;
    log::info!("Recording session closed; writer draining");
}

impl Drop for EventRecorder {
    fn drop(&mut self) {
        self.session.get_mut().queue = None;
        if let Some(handle) = self.writer.get_mut().take() {
            if let Ok(Err(e)) = handle.join() {
                log::warn!("Clip writer failed during shutdown: {}", e);
            }
        }
    }
}
