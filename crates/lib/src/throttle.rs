//! Fixed-interval send pacing.
//!
//! Bulk sends must keep a fixed gap between messages or the channel's
//! anti-abuse throttling kicks in. `SendPacer` is the one primitive any bulk
//! path goes through, instead of ad hoc sleeps in each loop.

use std::time::Duration;
use tokio::time::Instant;

/// Paces a serial loop to at most one permit per period.
///
/// The first `pace` call returns immediately; each later call sleeps until
/// one full period after the previous permit.
pub struct SendPacer {
    period: Duration,
    next_ready: Option<Instant>,
}

impl SendPacer {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            next_ready: None,
        }
    }

    /// Wait for the next send slot.
    pub async fn pace(&mut self) {
        if let Some(at) = self.next_ready {
            tokio::time::sleep_until(at).await;
        }
        self.next_ready = Some(Instant::now() + self.period);
    }
}
