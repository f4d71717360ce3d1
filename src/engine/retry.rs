/// Consecutive-failure budget for one key set.
///
/// Each miss or failed read on the same key set spends one attempt. Once the
/// attempts exceed `max_retries` the budget reports exhaustion and starts over,
/// so the counter never climbs past `max_retries + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    max_retries: u32,
    attempts: u32,
}

impl RetryBudget {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            attempts: 0,
        }
    }

    /// Spend one attempt. Returns `true` when the budget has just been exceeded,
    /// in which case the counter is already back at zero.
    pub fn record_failure(&mut self) -> bool {
        self.attempts = self.attempts.saturating_add(1);
        if self.attempts > self.max_retries {
            self.attempts = 0;
            true
        } else {
            false
        }
    }

    /// A hit clears any partial failure streak.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}
