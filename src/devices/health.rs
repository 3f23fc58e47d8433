// Channel health tracking: detects failure streaks and decides when to reopen a source

/// Consecutive failed reads tolerated before the source is reopened
pub const DEFAULT_REOPEN_THRESHOLD: u32 = 100;

/// What the acquisition loop should do after a failed read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureVerdict {
    /// First failure after a healthy period (log once)
    pub onset: bool,
    /// Streak exceeded the threshold: reopen the source instead of drawing a placeholder
    pub reopen: bool,
}

/// Failure streak bookkeeping for one channel.
///
/// The counter only resets on a successful read or a forced reopen; the
/// "in failure" flag survives reopens so a dead stream logs its onset once.
#[derive(Debug, Clone)]
pub struct FailureTracker {
    threshold: u32,
    consecutive: u32,
    failing: bool,
}

impl FailureTracker {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            consecutive: 0,
            failing: false,
        }
    }

    /// Record a failed read
    pub fn record_failure(&mut self) -> FailureVerdict {
        let onset = !self.failing;
        self.failing = true;
        self.consecutive += 1;

        let reopen = self.consecutive > self.threshold;
        if reopen {
            self.consecutive = 0;
        }

        FailureVerdict { onset, reopen }
    }

    /// Record a successful read. Returns true when this ends a failure streak.
    pub fn record_success(&mut self) -> bool {
        let recovered = self.failing;
        self.failing = false;
        self.consecutive = 0;
        recovered
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive
    }

    pub fn is_failing(&self) -> bool {
        self.failing
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}

impl Default for FailureTracker {
    fn default() -> Self {
        Self::new(DEFAULT_REOPEN_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn onset_is_reported_once() {
        let mut tracker = FailureTracker::default();
        assert!(tracker.record_failure().onset);
        assert!(!tracker.record_failure().onset);
        assert!(!tracker.record_failure().onset);
        assert_eq!(tracker.consecutive_failures(), 3);
    }

    #[test]
    fn reopen_after_101_failures() {
        let mut tracker = FailureTracker::default();
        for n in 1..=100 {
            let verdict = tracker.record_failure();
            assert!(!verdict.reopen, "reopened early at failure {}", n);
        }
        assert_eq!(tracker.consecutive_failures(), 100);

        let verdict = tracker.record_failure();
        assert!(verdict.reopen);
        assert!(!verdict.onset);
        assert_eq!(tracker.consecutive_failures(), 0);
        // Still considered failing: no second onset after the reopen
        assert!(tracker.is_failing());
        assert!(!tracker.record_failure().onset);
    }

    #[test]
    fn success_resets_streak() {
        let mut tracker = FailureTracker::new(3);
        assert!(!tracker.record_success());

        tracker.record_failure();
        tracker.record_failure();
        assert!(tracker.record_success());
        assert_eq!(tracker.consecutive_failures(), 0);
        assert!(tracker.record_failure().onset);
    }
}
