// Frame-rate measurement for clips without a configured rate

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Ingestion timestamps sampled before the rate is fixed
pub const FPS_SAMPLE_COUNT: usize = 10;

/// Rate used when a session ends before two frames were timed
pub const DEFAULT_FPS: u32 = 30;

/// Measures the ingestion rate from the first [`FPS_SAMPLE_COUNT`] frames
#[derive(Debug, Default, Clone)]
pub struct FpsEstimator {
    samples: Vec<Instant>,
    measured: Option<u32>,
}

impl FpsEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one ingestion. Returns the measured rate once enough samples exist.
    pub fn record(&mut self, at: Instant) -> Option<u32> {
        if self.measured.is_none() {
            self.samples.push(at);
            if self.samples.len() >= FPS_SAMPLE_COUNT {
                self.measured = Some(rate_of(&self.samples));
            }
        }
        self.measured
    }

    pub fn measured(&self) -> Option<u32> {
        self.measured
    }

    /// Best estimate from whatever has been sampled so far
    pub fn provisional(&self) -> u32 {
        self.measured.unwrap_or_else(|| {
            if self.samples.len() >= 2 {
                rate_of(&self.samples)
            } else {
                DEFAULT_FPS
            }
        })
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}

/// `max(1, round((n - 1) / elapsed))` over the sampled timestamps.
///
/// Samples sharing a single timestamp carry no rate; they fall back to [`DEFAULT_FPS`].
fn rate_of(samples: &[Instant]) -> u32 {
    let (Some(first), Some(last)) = (samples.first(), samples.last()) else {
        return DEFAULT_FPS;
    };
    let elapsed = last.saturating_duration_since(*first).as_secs_f64();
    if elapsed <= 0.0 {
        return DEFAULT_FPS;
    }
    let intervals = (samples.len() - 1) as f64;
    ((intervals / elapsed).round() as u32).max(1)
}

struct GateState {
    configured: Option<u32>,
    estimator: FpsEstimator,
}

impl GateState {
    fn resolved(&self) -> Option<u32> {
        self.configured.or(self.estimator.measured())
    }
}

/// Shared frame-rate resolution between the ingest path and the clip writer.
///
/// The writer blocks here until the rate is configured or measured.
pub struct FpsGate {
    state: Mutex<GateState>,
    resolved: Condvar,
}

impl FpsGate {
    pub fn new(configured: Option<u32>) -> Self {
        Self {
            state: Mutex::new(GateState {
                configured,
                estimator: FpsEstimator::new(),
            }),
            resolved: Condvar::new(),
        }
    }

    /// Feed one ingestion timestamp. Ignored once the rate is known.
    pub fn record_ingest(&self, at: Instant) {
        let mut state = self.state.lock();
        if state.resolved().is_some() {
            return;
        }
        if let Some(fps) = state.estimator.record(at) {
            log::info!("Measured ingest rate: {} fps", fps);
            self.resolved.notify_all();
        }
    }

    pub fn resolved(&self) -> Option<u32> {
        self.state.lock().resolved()
    }

    /// Wait up to `timeout` for the rate to become known
    pub fn wait_resolved(&self, timeout: Duration) -> Option<u32> {
        let mut state = self.state.lock();
        if let Some(fps) = state.resolved() {
            return Some(fps);
        }
        self.resolved.wait_for(&mut state, timeout);
        state.resolved()
    }

    /// Resolved rate, or an estimate from the samples collected so far
    pub fn provisional(&self) -> u32 {
        let state = self.state.lock();
        state.resolved().unwrap_or_else(|| state.estimator.provisional())
    }
}
