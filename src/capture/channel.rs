// Per-camera acquisition loop
//
// Each enabled channel owns its source on a dedicated thread. The thread
// reads, rectifies and resizes frames into a shared slot that the mosaic
// reads without blocking the decoder. Read failures swap in the placeholder;
// a long enough streak reopens the source. Channels never disable
// themselves at runtime.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::RwLock;

use super::{PacingMode, Result};
use crate::devices::{CaptureSource, FailureTracker, DEFAULT_REOPEN_THRESHOLD};
use crate::video::{save_jpeg, Frame, GridRect, Rectifier, Transforms};

/// Static configuration of one channel
#[derive(Debug, Clone)]
pub struct ChannelSettings {
    /// 1-based camera slot, used in logs and snapshot names
    pub slot: usize,
    /// Edge length of the square frames the channel produces
    pub size: u32,
    pub pacing: PacingMode,
    pub placement: GridRect,
    pub reopen_threshold: u32,
    /// Pause between loop iterations
    pub loop_interval: Duration,
    /// Where to save the first rectified frame, if anywhere
    pub snapshot_dir: Option<PathBuf>,
}

impl ChannelSettings {
    pub fn new(slot: usize, size: u32, placement: GridRect) -> Self {
        Self {
            slot,
            size,
            pacing: PacingMode::FreeRun,
            placement,
            reopen_threshold: DEFAULT_REOPEN_THRESHOLD,
            loop_interval: Duration::from_micros(100),
            snapshot_dir: None,
        }
    }
}

/// Counters published by the acquisition thread
#[derive(Debug, Default)]
pub struct ChannelStats {
    frames_captured: AtomicU64,
    consecutive_failures: AtomicU32,
    reopens: AtomicU64,
    failing: AtomicBool,
}

impl ChannelStats {
    pub fn frames_captured(&self) -> u64 {
        self.frames_captured.load(Ordering::Relaxed)
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    /// Forced reopens after a failure streak (not counting the initial open)
    pub fn reopens(&self) -> u64 {
        self.reopens.load(Ordering::Relaxed)
    }

    pub fn is_failing(&self) -> bool {
        self.failing.load(Ordering::Relaxed)
    }
}

/// One camera slot of the mosaic
pub struct CameraChannel {
    slot: usize,
    placement: GridRect,
    enabled: bool,
    current: Arc<RwLock<Arc<Frame>>>,
    /// Capacity-1 release rendezvous, present in synchronized pacing only
    release_tx: Option<Sender<()>>,
    stop: Arc<AtomicBool>,
    stats: Arc<ChannelStats>,
    worker: Option<JoinHandle<()>>,
}

impl CameraChannel {
    /// Start acquiring from `source` on a background thread
    pub fn spawn(
        settings: ChannelSettings,
        source: Box<dyn CaptureSource>,
        transforms: &Transforms,
    ) -> Result<Self> {
        let placeholder = Arc::new(transforms.placeholder.render_disconnected(settings.size));
        let current = Arc::new(RwLock::new(placeholder.clone()));
        let stop = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(ChannelStats::default());

        let (release_tx, release_rx) = match settings.pacing {
            PacingMode::Synchronized => {
                let (tx, rx) = bounded::<()>(1);
                (Some(tx), Some(rx))
            }
            PacingMode::FreeRun => (None, None),
        };

        let slot = settings.slot;
        let placement = settings.placement;
        let worker = ChannelWorker {
            tracker: FailureTracker::new(settings.reopen_threshold),
            settings,
            source,
            rectifier: transforms.rectifier.clone(),
            placeholder,
            current: current.clone(),
            release_rx,
            stop: stop.clone(),
            stats: stats.clone(),
            snapshot_taken: false,
        };

        let handle = std::thread::Builder::new()
            .name(format!("camgrid-cam{}", slot))
            .spawn(move || worker.run())?;

        Ok(Self {
            slot,
            placement,
            enabled: true,
            current,
            release_tx,
            stop,
            stats,
            worker: Some(handle),
        })
    }

    /// A slot with no source: always shows the placeholder
    pub fn disabled(settings: &ChannelSettings, transforms: &Transforms) -> Self {
        let placeholder = Arc::new(transforms.placeholder.render_disconnected(settings.size));
        Self {
            slot: settings.slot,
            placement: settings.placement,
            enabled: false,
            current: Arc::new(RwLock::new(placeholder)),
            release_tx: None,
            stop: Arc::new(AtomicBool::new(true)),
            stats: Arc::new(ChannelStats::default()),
            worker: None,
        }
    }

    /// Latest frame, live or placeholder
    pub fn current_frame(&self) -> Arc<Frame> {
        self.current.read().clone()
    }

    /// Let a synchronized channel decode its next frame. No-op in free-run.
    pub fn release(&self) {
        if let Some(tx) = &self.release_tx {
            // A pending release already covers this one
            let _ = tx.try_send(());
        }
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn placement(&self) -> GridRect {
        self.placement
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn stats(&self) -> &ChannelStats {
        &self.stats
    }

    /// Stop the acquisition thread and wait for it to exit.
    /// The thread may first finish a read in progress.
    pub fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(tx) = self.release_tx.take() {
            let _ = tx.try_send(());
        }
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                log::error!("cam{}: acquisition thread panicked", self.slot);
            }
        }
    }
}

impl Drop for CameraChannel {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// State owned by the acquisition thread
struct ChannelWorker {
    settings: ChannelSettings,
    source: Box<dyn CaptureSource>,
    rectifier: Arc<dyn Rectifier>,
    placeholder: Arc<Frame>,
    current: Arc<RwLock<Arc<Frame>>>,
    release_rx: Option<Receiver<()>>,
    stop: Arc<AtomicBool>,
    stats: Arc<ChannelStats>,
    tracker: FailureTracker,
    snapshot_taken: bool,
}

impl ChannelWorker {
    fn run(mut self) {
        let slot = self.settings.slot;
        match self.source.open() {
            Ok(()) => log::info!("cam{}: opened {}", slot, self.source.address()),
            // Keep going: reads fail until the reopen logic reconnects
            Err(e) => log::error!("cam{}: {}", slot, e),
        }

        while !self.stop.load(Ordering::SeqCst) {
            match self.source.read_frame() {
                Ok(frame) => self.on_frame(frame),
                Err(e) => self.on_failure(&e),
            }
            std::thread::sleep(self.settings.loop_interval);
        }

        log::debug!("cam{}: acquisition stopped", slot);
    }

    fn on_frame(&mut self, frame: Frame) {
        let slot = self.settings.slot;
        if self.tracker.record_success() {
            log::info!("cam{}: connected", slot);
        }
        self.stats.consecutive_failures.store(0, Ordering::Relaxed);
        self.stats.failing.store(false, Ordering::Relaxed);

        let rectified = self.rectifier.rectify(frame);
        if !self.snapshot_taken {
            self.snapshot_taken = true;
            if let Some(dir) = &self.settings.snapshot_dir {
                let path = dir.join(format!("{}.jpg", slot));
                if let Err(e) = save_jpeg(&rectified, &path) {
                    log::warn!("cam{}: failed to save snapshot {:?}: {}", slot, path, e);
                }
            }
        }

        let size = self.settings.size;
        *self.current.write() = Arc::new(rectified.resize(size, size));
        self.stats.frames_captured.fetch_add(1, Ordering::Relaxed);

        if self.settings.pacing == PacingMode::Synchronized {
            self.wait_for_release();
        }
    }

    fn on_failure(&mut self, error: &crate::devices::SourceError) {
        let slot = self.settings.slot;
        let verdict = self.tracker.record_failure();
        self.stats
            .consecutive_failures
            .store(self.tracker.consecutive_failures(), Ordering::Relaxed);
        self.stats.failing.store(true, Ordering::Relaxed);

        if verdict.onset {
            log::error!("cam{}: capture lost ({})", slot, error);
        }

        if verdict.reopen {
            log::debug!("cam{}: reloading {}", slot, self.source.address());
            self.stats.reopens.fetch_add(1, Ordering::Relaxed);
            if let Err(e) = self.source.open() {
                log::debug!("cam{}: reopen failed: {}", slot, e);
            }
        } else {
            *self.current.write() = self.placeholder.clone();
        }
    }

    /// Block until the consumer has pulled the frame just stored
    fn wait_for_release(&self) {
        let Some(rx) = &self.release_rx else {
            return;
        };

        // A release sent before this frame was stored belongs to the previous one
        while rx.try_recv().is_ok() {}

        if self.stop.load(Ordering::SeqCst) {
            return;
        }
        // Disconnected means the channel handle is gone; either way, move on
        let _ = rx.recv();
    }
}
