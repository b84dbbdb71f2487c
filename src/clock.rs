//! Wall clock in epoch milliseconds, anchored on the tokio clock so it follows
//! paused/advanced time in tests.

use time::OffsetDateTime;
use tokio::time::Instant;

/// Millisecond clock shared by every participant of a process.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    origin_ms: i64,
    origin: Instant,
}

impl Clock {
    /// Anchor a clock on the current wall time.
    pub fn new() -> Self {
        let origin_ms = (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64;
        Self::starting_at(origin_ms)
    }

    /// Anchor a clock on an arbitrary epoch millisecond value.
    pub fn starting_at(origin_ms: i64) -> Self {
        Self {
            origin_ms,
            origin: Instant::now(),
        }
    }

    /// Current time in epoch milliseconds.
    pub fn now_ms(&self) -> i64 {
        self.origin_ms + self.origin.elapsed().as_millis() as i64
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn follows_tokio_time() {
        let clock = Clock::starting_at(1_000);
        assert_eq!(clock.now_ms(), 1_000);
        tokio::time::advance(Duration::from_millis(250)).await;
        assert_eq!(clock.now_ms(), 1_250);
    }
}
