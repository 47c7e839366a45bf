//! Restartable periodic deadlines driven by an external millisecond clock.
//!
//! The firmware feeds `embassy_time::Instant::now().as_millis()`; tests feed
//! plain numbers. A timer that is polled late fires once and re-anchors to
//! the poll time, so missed periods are never replayed.

/// A stoppable periodic deadline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PeriodicTimer {
    period_ms: u64,
    next_due_ms: Option<u64>,
}

impl PeriodicTimer {
    /// A stopped timer with the given period.
    pub const fn new(period_ms: u64) -> Self {
        Self {
            period_ms,
            next_due_ms: None,
        }
    }

    /// Arm the timer so it first fires one period after `now_ms`.
    pub fn start(&mut self, now_ms: u64) {
        self.next_due_ms = Some(now_ms.saturating_add(self.period_ms));
    }

    pub fn stop(&mut self) {
        self.next_due_ms = None;
    }

    /// Stop, change the period, and start again from `now_ms`.
    pub fn restart(&mut self, now_ms: u64, period_ms: u64) {
        self.stop();
        self.period_ms = period_ms;
        self.start(now_ms);
    }

    pub fn is_running(&self) -> bool {
        self.next_due_ms.is_some()
    }

    pub fn period_ms(&self) -> u64 {
        self.period_ms
    }

    /// Absolute time of the next firing, if running.
    pub fn deadline_ms(&self) -> Option<u64> {
        self.next_due_ms
    }

    /// Returns `true` at most once per call if the deadline has passed.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        let Some(due) = self.next_due_ms else {
            return false;
        };
        if now_ms < due {
            return false;
        }
        let next = due.saturating_add(self.period_ms);
        self.next_due_ms = Some(if next > now_ms {
            next
        } else {
            now_ms.saturating_add(self.period_ms)
        });
        true
    }
}
