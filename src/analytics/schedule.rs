// Posting schedule: daily reset gating, the midnight quiet window and the post interval

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

/// No uploads this close to midnight, on either side
pub const MIDNIGHT_QUIET_WINDOW: Duration = Duration::from_secs(3 * 60);

/// Signalled by whoever resets the day's counters; consumed by the poster
/// before it resumes uploading on a new date.
#[derive(Debug, Default)]
pub struct DailyReset {
    flag: AtomicBool,
}

impl DailyReset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Consume a pending signal
    pub fn take(&self) -> bool {
        self.flag.swap(false, Ordering::SeqCst)
    }

    pub fn is_pending(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Whether an upload may happen right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// The date changed and the daily reset has not been signalled yet
    AwaitingReset,
    /// Within [`MIDNIGHT_QUIET_WINDOW`] of midnight
    QuietWindow,
    Open,
}

#[derive(Debug, Clone)]
pub struct PostSchedule {
    run_date: NaiveDate,
    interval: Duration,
    last_post: Option<Instant>,
}

impl PostSchedule {
    pub fn new(run_date: NaiveDate, interval: Duration) -> Self {
        Self {
            run_date,
            interval,
            last_post: None,
        }
    }

    pub fn run_date(&self) -> NaiveDate {
        self.run_date
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Check the date and time-of-day gates for `now`
    pub fn gate(&mut self, now: NaiveDateTime, reset: &DailyReset) -> Gate {
        let today = now.date();
        if today != self.run_date {
            if !reset.take() {
                return Gate::AwaitingReset;
            }
            log::info!("Daily reset observed; posting for {}", today);
            self.run_date = today;
        }

        if in_quiet_window(now) {
            return Gate::QuietWindow;
        }
        Gate::Open
    }

    /// Whether the post interval has elapsed since the last upload
    pub fn is_due(&self, at: Instant) -> bool {
        match self.last_post {
            Some(last) => at.saturating_duration_since(last) >= self.interval,
            None => true,
        }
    }

    pub fn mark_posted(&mut self, at: Instant) {
        self.last_post = Some(at);
    }
}

/// Strictly within the quiet window of the nearest midnight
pub fn in_quiet_window(now: NaiveDateTime) -> bool {
    let date = now.date();
    let midnight = if now.hour() >= 12 {
        date.checked_add_days(Days::new(1)).unwrap_or(date)
    } else {
        date
    }
    .and_time(NaiveTime::MIN);

    let distance = (midnight - now).abs();
    distance
        .to_std()
        .map(|d| d < MIDNIGHT_QUIET_WINDOW)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(date: (i32, u32, u32), time: (u32, u32, u32)) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(date.0, date.1, date.2)
            .unwrap()
            .and_hms_opt(time.0, time.1, time.2)
            .unwrap()
    }

    #[test]
    fn quiet_window_spans_midnight() {
        assert!(in_quiet_window(at((2024, 5, 1), (23, 58, 0))));
        assert!(in_quiet_window(at((2024, 5, 2), (0, 0, 0))));
        assert!(in_quiet_window(at((2024, 5, 2), (0, 2, 59))));
        assert!(!in_quiet_window(at((2024, 5, 2), (0, 3, 0))));
        assert!(!in_quiet_window(at((2024, 5, 1), (23, 57, 0))));
        assert!(!in_quiet_window(at((2024, 5, 1), (12, 0, 0))));
    }

    #[test]
    fn new_date_waits_for_reset() {
        let reset = DailyReset::new();
        let mut schedule =
            PostSchedule::new(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(), Duration::from_secs(5));

        assert_eq!(schedule.gate(at((2024, 5, 1), (15, 0, 0)), &reset), Gate::Open);
        assert_eq!(
            schedule.gate(at((2024, 5, 2), (9, 0, 0)), &reset),
            Gate::AwaitingReset
        );

        reset.signal();
        assert_eq!(schedule.gate(at((2024, 5, 2), (9, 0, 1)), &reset), Gate::Open);
        assert_eq!(schedule.run_date(), NaiveDate::from_ymd_opt(2024, 5, 2).unwrap());
        assert!(!reset.is_pending());
    }

    #[test]
    fn interval_gates_posts() {
        let start = Instant::now();
        let mut schedule =
            PostSchedule::new(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(), Duration::from_secs(5));
        assert!(schedule.is_due(start));
        schedule.mark_posted(start);
        assert!(!schedule.is_due(start + Duration::from_secs(4)));
        assert!(schedule.is_due(start + Duration::from_secs(5)));
    }
}
