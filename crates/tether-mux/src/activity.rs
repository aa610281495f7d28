//! Per-session rate limiting for store writes and notifications.

use std::time::Duration;

use tokio::time::Instant;

/// Lets an action through at most once per window.
#[derive(Debug, Clone)]
pub struct Debounce {
    window: Duration,
    last: Option<Instant>,
}

impl Debounce {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    /// Whether an action at `now` would be let through.
    pub fn ready(&self, now: Instant) -> bool {
        match self.last {
            Some(last) => now.saturating_duration_since(last) >= self.window,
            None => true,
        }
    }

    /// Record an action at `now` if the window allows it.
    pub fn try_fire(&mut self, now: Instant) -> bool {
        if !self.ready(now) {
            return false;
        }
        self.last = Some(now);
        true
    }
}
