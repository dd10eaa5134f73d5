//! Adaptive request pacing
//!
//! Two constraints combine: a hard sliding-window ceiling on requests per
//! minute, and an adaptive delay that grows exponentially with consecutive
//! errors and decays slowly once the site looks healthy again. All timing
//! goes through `tokio::time` so paused-clock tests run instantly.

use crate::config::RateLimitConfig;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

const WINDOW: Duration = Duration::from_secs(60);
const MAX_DELAY: Duration = Duration::from_secs(30);
const DECAY_STREAK: u32 = 10;
const DECAY_FACTOR: f64 = 0.9;

/// Paces requests against the target site
pub struct RateController {
    window: VecDeque<Instant>,
    max_per_minute: u32,
    backoff_factor: f64,
    base_delay: Duration,
    current_delay: Duration,
    consecutive_errors: u32,
    success_streak: u32,
}

impl RateController {
    pub fn new(config: &RateLimitConfig) -> Self {
        let base_delay = Duration::from_secs_f64(60.0 / config.max_requests_per_minute as f64);
        Self {
            window: VecDeque::new(),
            max_per_minute: config.max_requests_per_minute,
            backoff_factor: config.backoff_factor,
            base_delay,
            current_delay: base_delay,
            consecutive_errors: 0,
            success_streak: 0,
        }
    }

    /// Blocks until the next request is allowed, then records it
    pub async fn wait_for_turn(&mut self) {
        self.evict_expired();

        if self.window.len() >= self.max_per_minute as usize {
            if let Some(oldest) = self.window.front() {
                let wake_at = *oldest + WINDOW;
                let pause = wake_at.saturating_duration_since(Instant::now());
                if !pause.is_zero() {
                    debug!(pause_ms = pause.as_millis() as u64, "Rate window full");
                    sleep(pause).await;
                }
            }
            self.evict_expired();
        }

        if !self.current_delay.is_zero() {
            sleep(self.current_delay).await;
        }

        self.window.push_back(Instant::now());
    }

    /// Marks a healthy response; the adaptive delay decays once every
    /// ten-success streak
    pub fn record_success(&mut self) {
        self.consecutive_errors = 0;
        self.success_streak += 1;

        if self.success_streak % DECAY_STREAK == 0 && self.current_delay > self.base_delay {
            let decayed = self.current_delay.mul_f64(DECAY_FACTOR);
            self.current_delay = decayed.max(self.base_delay);
            debug!(
                delay_ms = self.current_delay.as_millis() as u64,
                "Adaptive delay decayed"
            );
        }
    }

    /// Marks a failed request; the adaptive delay grows exponentially with
    /// the error run, capped at thirty seconds
    pub fn record_error(&mut self) {
        self.success_streak = 0;
        self.consecutive_errors += 1;

        // Scale in f64 space; the exponential overflows Duration long
        // before the cap otherwise.
        let scaled = self.base_delay.as_secs_f64()
            * self.backoff_factor.powi(self.consecutive_errors as i32);
        self.current_delay = Duration::from_secs_f64(scaled.min(MAX_DELAY.as_secs_f64()));
        debug!(
            errors = self.consecutive_errors,
            delay_ms = self.current_delay.as_millis() as u64,
            "Adaptive delay raised"
        );
    }

    /// Clears the error run and restores the base delay
    pub fn reset(&mut self) {
        self.consecutive_errors = 0;
        self.success_streak = 0;
        self.current_delay = self.base_delay;
    }

    pub fn current_delay(&self) -> Duration {
        self.current_delay
    }

    fn evict_expired(&mut self) {
        let now = Instant::now();
        while let Some(front) = self.window.front() {
            if now.duration_since(*front) >= WINDOW {
                self.window.pop_front();
            } else {
                break;
            }
        }
    }
}
