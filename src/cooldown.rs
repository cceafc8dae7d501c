use std::time::{Duration, SystemTime};
use crate::error::RetrieverError;

/// Suppresses new fetches for a while after consecutive failures.
///
/// The window grows linearly with the number of consecutive errors
/// (`base_interval * count`) and is clamped to `max_interval`.
/// A single success event resets it completely.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorCooldown {
    base_interval: Duration,
    max_interval: Duration,
    consecutive_errors_count: u32,
    had_last_error: bool,
}

impl ErrorCooldown {
    /// Returns `None` when no base interval is configured: cooldown is disabled for the resource.
    pub fn new(base_interval: Option<Duration>, max_interval: Duration) -> Option<Self> {
        Some(ErrorCooldown {
            base_interval: base_interval?,
            max_interval,
            consecutive_errors_count: 0,
            had_last_error: false,
        })
    }

    /// `true` while a failure is outstanding and `last_fetch + window` lies in the future.
    pub fn is_in_cooldown(&self, last_fetch: SystemTime) -> bool {
        if !self.had_last_error {
            return false;
        }
        match last_fetch.checked_add(self.current_window()) {
            Some(cooldown_end) => cooldown_end > SystemTime::now(),
            // Window reaches past the representable future
            None => true
        }
    }

    /// Records the outcome of a fetch. `None` is a success and clears the cooldown.
    pub fn new_cooldown_event(&mut self, error: Option<&RetrieverError>) {
        match error {
            Some(error) => {
                // The count stops growing once the window is clamped, so it stays bounded
                // however long the failures go on.
                if self.current_window() < self.max_interval {
                    self.consecutive_errors_count = self.consecutive_errors_count.saturating_add(1);
                }
                self.had_last_error = true;
                debug!(%error, consecutive_errors = self.consecutive_errors_count, "error cooldown extended");
            }
            None => {
                self.consecutive_errors_count = 0;
                self.had_last_error = false;
            }
        }
    }

    /// Current suppression window, `min(max_interval, base_interval * consecutive_errors)`.
    pub fn current_window(&self) -> Duration {
        self.base_interval
            .saturating_mul(self.consecutive_errors_count)
            .min(self.max_interval)
    }

    pub fn consecutive_errors_count(&self) -> u32 {
        self.consecutive_errors_count
    }

    pub fn base_interval(&self) -> Duration {
        self.base_interval
    }

    pub fn max_interval(&self) -> Duration {
        self.max_interval
    }

    /// Tracks the refresh interval of the owning resource.
    pub fn set_max_interval(&mut self, max_interval: Duration) {
        self.max_interval = max_interval;
    }
}
