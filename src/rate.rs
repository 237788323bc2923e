//! Global send-rate limiter.

use tokio::time::{Duration, Instant, sleep};

/// Paces outbound sends so consecutive permitted sends are at least
/// `60 / rate_per_minute` seconds apart, across the whole run.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    last_send: Option<Instant>,
}

impl RateLimiter {
    pub fn new(rate_per_minute: u32) -> Self {
        Self {
            interval: Duration::from_secs_f64(60.0 / f64::from(rate_per_minute.max(1))),
            last_send: None,
        }
    }

    /// Wait until the next send is permitted, then claim the slot. The
    /// first call never waits.
    pub async fn throttle(&mut self) {
        if let Some(last) = self.last_send {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                sleep(self.interval - elapsed).await;
            }
        }
        self.last_send = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn ten_sends_at_six_per_minute_take_ninety_seconds() {
        let mut limiter = RateLimiter::new(6);
        let start = Instant::now();
        for _ in 0..10 {
            limiter.throttle().await;
        }
        // 9 gaps of 10s between 10 sends.
        assert!(start.elapsed() >= Duration::from_secs(90));
    }

    #[tokio::test(start_paused = true)]
    async fn first_send_is_immediate() {
        let mut limiter = RateLimiter::new(6);
        let start = Instant::now();
        limiter.throttle().await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_rate_is_clamped_to_one_per_minute() {
        let mut limiter = RateLimiter::new(0);
        let start = Instant::now();
        limiter.throttle().await;
        limiter.throttle().await;
        assert!(start.elapsed() >= Duration::from_secs(60));
    }
}
