//! Deferred restart timer.
//!
//! Armed only when an image has been committed.  The main loop polls
//! [`RebootScheduler::take_due`]; the first poll at or after the deadline
//! returns `true` and disarms the timer, so the restart primitive runs
//! exactly once.

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebootScheduler {
    reboot_at_ms: Option<u64>,
}

impl RebootScheduler {
    pub const fn new() -> Self {
        Self { reboot_at_ms: None }
    }

    /// Schedule a restart `delay_ms` after `now_ms`.  Never blocks.
    pub fn arm(&mut self, now_ms: u64, delay_ms: u32) {
        self.reboot_at_ms = Some(now_ms.saturating_add(delay_ms as u64));
    }

    pub fn is_pending(&self) -> bool {
        self.reboot_at_ms.is_some()
    }

    pub fn reboot_at(&self) -> Option<u64> {
        self.reboot_at_ms
    }

    /// `true` once the deadline has passed; clears the deadline.
    pub fn take_due(&mut self, now_ms: u64) -> bool {
        match self.reboot_at_ms {
            Some(at) if now_ms >= at => {
                self.reboot_at_ms = None;
                true
            }
            _ => false,
        }
    }
}
