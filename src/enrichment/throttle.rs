//! Minimum-interval gate for outbound requests.
//!
//! One [`Throttle`] is shared by every caller that talks to the same
//! external source. Callers queue on an async mutex and sleep until the
//! interval since the previous request has passed, so requests are spaced
//! at least `min_interval` apart no matter how many tasks call at once.
//! Time comes from `tokio::time`, which is monotonic and can be paused in
//! tests.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};

/// Shared request gate. Cheap to put behind an `Arc`.
#[derive(Debug)]
pub struct Throttle {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    /// Wait for this caller's slot. Must be called *before* the request.
    ///
    /// The lock is held across the sleep: later callers queue behind it in
    /// FIFO order and each one measures from the slot before it.
    pub async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let ready_at = previous + self.min_interval;
            if ready_at > Instant::now() {
                tracing::trace!(
                    target: "resolver",
                    wait_ms = (ready_at - Instant::now()).as_millis() as u64,
                    "Throttling request"
                );
                sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }
}
