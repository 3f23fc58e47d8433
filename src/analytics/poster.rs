//! Periodic uploader for occupancy analytics
//!
//! Callers push the latest area counts and heatmap, and queue visit records as
//! visitors leave. A background thread uploads them every `post_interval_secs`
//! unless the daily reset is pending or midnight is close.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDate, NaiveDateTime};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use super::client::{AnalyticsTransport, HttpTransport};
use super::schedule::{DailyReset, Gate, PostSchedule};
use super::{parse_init_response, visit_noid, HeatmapPoint, InitData, Result, VisitRecord};
use crate::config::AnalyticsConfig;

/// Pause between gate checks while uploads are suspended
const IDLE_POLL: Duration = Duration::from_secs(1);

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// What one pass of the posting loop did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    AwaitingReset,
    QuietWindow,
    /// Data missing or the interval has not elapsed
    NotDue,
    Posted {
        /// Visit records uploaded from at most one queued batch
        visits_posted: usize,
    },
}

#[derive(Default)]
struct PendingData {
    area_visitor: Option<Vec<(&'static str, String)>>,
    heatmap_count: Option<Vec<(&'static str, String)>>,
}

pub struct AnalyticsPoster {
    config: AnalyticsConfig,
    transport: Arc<dyn AnalyticsTransport>,
    reset: Arc<DailyReset>,
    pending: Mutex<PendingData>,
    schedule: Mutex<PostSchedule>,
    visits_tx: Sender<Vec<VisitRecord>>,
    visits_rx: Receiver<Vec<VisitRecord>>,
}

impl AnalyticsPoster {
    pub fn new(
        config: AnalyticsConfig,
        transport: Arc<dyn AnalyticsTransport>,
        reset: Arc<DailyReset>,
        run_date: NaiveDate,
    ) -> Self {
        let (visits_tx, visits_rx) = crossbeam_channel::unbounded();
        let interval = Duration::from_secs(config.post_interval_secs);
        Self {
            config,
            transport,
            reset,
            pending: Mutex::new(PendingData::default()),
            schedule: Mutex::new(PostSchedule::new(run_date, interval)),
            visits_tx,
            visits_rx,
        }
    }

    /// Poster using HTTP and today's local date
    pub fn with_http(config: AnalyticsConfig, reset: Arc<DailyReset>) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(HTTP_TIMEOUT)?);
        Ok(Self::new(config, transport, reset, Local::now().date_naive()))
    }

    pub fn daily_reset(&self) -> &Arc<DailyReset> {
        &self.reset
    }

    /// Latest visitor count per area, in `area_names` order
    pub fn update_area_visitor(&self, counts: &[u32]) {
        let form = vec![
            ("area", json_text(&self.config.area_names)),
            ("count", json_text(counts)),
        ];
        self.pending.lock().area_visitor = Some(form);
    }

    /// Current occupancy, heatmap cells and today's accumulated visitor count
    pub fn update_heatmap_and_count(&self, people: u32, heatmap: &[HeatmapPoint], acc_count: u64) {
        let form = vec![
            ("all_count", people.to_string()),
            ("acc_count", acc_count.to_string()),
            ("data", json_text(heatmap)),
        ];
        self.pending.lock().heatmap_count = Some(form);
    }

    /// Queue records of visitors that left. Empty batches are dropped.
    pub fn queue_visit_records(&self, records: Vec<VisitRecord>) {
        if records.is_empty() {
            return;
        }
        // Receiver lives in self
        let _ = self.visits_tx.send(records);
    }

    pub fn queued_visit_batches(&self) -> usize {
        self.visits_rx.len()
    }

    /// Last stored totals, or a fresh day when the backend cannot be read
    pub fn fetch_init_data(&self) -> InitData {
        self.fetch_init_data_for(Local::now().date_naive())
    }

    pub fn fetch_init_data_for(&self, today: NaiveDate) -> InitData {
        let parsed = self
            .transport
            .get_json(&self.config.init_url)
            .and_then(|value| parse_init_response(&value, today));
        match parsed {
            Ok(init) => {
                log::info!(
                    "Init data: {} visitors today, next ids {:?}",
                    init.count_today,
                    init.next_ids
                );
                init
            }
            Err(e) => {
                log::warn!("Could not fetch init data: {}", e);
                InitData::fallback()
            }
        }
    }

    /// One pass of the posting loop at local time `now`
    pub fn post_cycle(&self, now: NaiveDateTime, at: Instant) -> CycleOutcome {
        let gate = self.schedule.lock().gate(now, &self.reset);
        match gate {
            Gate::AwaitingReset => return CycleOutcome::AwaitingReset,
            Gate::QuietWindow => return CycleOutcome::QuietWindow,
            Gate::Open => {}
        }

        let (area_visitor, heatmap_count) = {
            let pending = self.pending.lock();
            match (&pending.area_visitor, &pending.heatmap_count) {
                (Some(area), Some(heatmap)) => (area.clone(), heatmap.clone()),
                _ => return CycleOutcome::NotDue,
            }
        };
        {
            let mut schedule = self.schedule.lock();
            if !schedule.is_due(at) {
                return CycleOutcome::NotDue;
            }
            schedule.mark_posted(at);
        }

        if let Err(e) = self
            .transport
            .post_form(&self.config.area_visitor_url, &area_visitor)
        {
            log::error!("Area visitor upload failed: {}", e);
        }
        if let Err(e) = self.transport.post_form(&self.config.heatmap_url, &heatmap_count) {
            log::error!("Heatmap upload failed: {}", e);
        }

        let visits_posted = match self.visits_rx.try_recv() {
            Ok(batch) => self.post_visits(&batch, now.date()),
            Err(_) => 0,
        };

        CycleOutcome::Posted { visits_posted }
    }

    /// Upload one batch, stopping at the first failure
    fn post_visits(&self, batch: &[VisitRecord], date: NaiveDate) -> usize {
        let mut posted = 0;
        for record in batch {
            let form = [
                ("noid", visit_noid(date, record.visitor_id, record.area)),
                ("area_num", record.area.to_string()),
                ("time_in", record.time_in.clone()),
                ("time_out", record.time_out.clone()),
                ("duration", record.duration.to_string()),
            ];
            if let Err(e) = self
                .transport
                .post_form(&self.config.visit_duration_url, &form)
            {
                log::error!(
                    "Visit upload failed after {} of {} records: {}",
                    posted,
                    batch.len(),
                    e
                );
                break;
            }
            posted += 1;
        }
        posted
    }

    /// Run the posting loop on a background thread until the handle is stopped
    pub fn start(self: Arc<Self>) -> std::io::Result<PosterHandle> {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
        let poster = self.clone();
        let handle = thread::Builder::new()
            .name("camgrid-analytics".into())
            .spawn(move || poster.run(stop_rx))?;
        log::info!(
            "Analytics poster started (interval {}s)",
            self.config.post_interval_secs
        );
        Ok(PosterHandle {
            stop: Some(stop_tx),
            handle: Some(handle),
        })
    }

    fn run(&self, stop: Receiver<()>) {
        loop {
            let outcome = self.post_cycle(Local::now().naive_local(), Instant::now());
            let pause = match outcome {
                CycleOutcome::Posted { .. } => Duration::ZERO,
                CycleOutcome::NotDue => Duration::from_secs(self.config.post_interval_secs),
                CycleOutcome::AwaitingReset | CycleOutcome::QuietWindow => IDLE_POLL,
            };
            match stop.recv_timeout(pause) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        log::info!("Analytics poster stopped");
    }
}

fn json_text<T: serde::Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "[]".to_string())
}

/// Stops the posting thread when dropped
pub struct PosterHandle {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl PosterHandle {
    pub fn stop(&mut self) {
        self.stop.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for PosterHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
