//! Dual-rate send throttle for bulk SMS dispatch.
//!
//! Providers enforce quotas at two granularities, so pacing alone is not
//! enough: a burst of short batches can satisfy any inter-send interval
//! and still blow the per-minute quota. The throttle therefore tracks a
//! pacing interval between individual sends AND a hard cap per 60-second
//! window; hitting the cap sleeps to the end of the current window.

use std::time::Duration;

use tokio::time::Instant;

const WINDOW: Duration = Duration::from_secs(60);

/// Sequential send pacer. One instance covers one bulk dispatch.
pub struct DualRateThrottle {
    interval: Duration,
    max_per_minute: u32,
    last_send: Option<Instant>,
    window_start: Option<Instant>,
    window_count: u32,
}

impl DualRateThrottle {
    pub fn new(interval: Duration, max_per_minute: u32) -> Self {
        Self {
            interval,
            max_per_minute,
            last_send: None,
            window_start: None,
            window_count: 0,
        }
    }

    /// Waits until the next send is allowed, then records it.
    pub async fn acquire(&mut self) {
        let now = Instant::now();

        // Roll the minute window when it has elapsed.
        match self.window_start {
            Some(start) if now.duration_since(start) < WINDOW => {}
            _ => {
                self.window_start = Some(now);
                self.window_count = 0;
            }
        }

        // Hard per-minute cap: sleep out the remainder of the window.
        if self.window_count >= self.max_per_minute {
            let window_end = self.window_start.expect("window rolled above") + WINDOW;
            tracing::debug!(
                sends_in_window = self.window_count,
                "per-minute SMS cap reached, pausing until window end"
            );
            tokio::time::sleep_until(window_end).await;
            self.window_start = Some(window_end);
            self.window_count = 0;
        }

        // Pacing interval between consecutive sends.
        if let Some(last) = self.last_send {
            let next_allowed = last + self.interval;
            if next_allowed > Instant::now() {
                tokio::time::sleep_until(next_allowed).await;
            }
        }

        self.window_count += 1;
        self.last_send = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_pacing_interval_between_sends() {
        let mut throttle = DualRateThrottle::new(Duration::from_millis(100), 1000);
        let start = Instant::now();

        for _ in 0..3 {
            throttle.acquire().await;
        }

        // First send is immediate, the next two are paced.
        assert!(start.elapsed() >= Duration::from_millis(200));
        assert!(start.elapsed() < Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_minute_cap_sleeps_to_window_end() {
        let mut throttle = DualRateThrottle::new(Duration::from_millis(1), 2);
        let start = Instant::now();

        for _ in 0..5 {
            throttle.acquire().await;
        }

        // Sends 1-2 in the first window, 3-4 after the first boundary,
        // 5 after the second.
        assert!(start.elapsed() >= Duration::from_secs(120));
        assert!(start.elapsed() < Duration::from_secs(121));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cap_not_hit_within_window() {
        let mut throttle = DualRateThrottle::new(Duration::from_millis(10), 10);
        let start = Instant::now();

        for _ in 0..5 {
            throttle.acquire().await;
        }

        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
