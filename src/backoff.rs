// Bounded exponential backoff with jitter for reconnects and failed polls.

use std::time::Duration;

use rand::Rng;

/// Exponential backoff: `base * 2^attempt`, capped at `max`, with up to
/// `jitter` (a fraction of the delay) added or removed at random.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    jitter: f64,
    attempt: u32,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            jitter: 0.2,
            attempt: 0,
        }
    }

    /// Set the jitter fraction, clamped to `0.0..=1.0`.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Number of consecutive failures recorded since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Delay before the next attempt, without jitter.
    pub fn current_delay(&self) -> Duration {
        // 2^16 * base already exceeds any sane ceiling.
        let factor = 1u32 << self.attempt.min(16);
        self.base.saturating_mul(factor).min(self.max)
    }

    /// Record a failure and return the jittered delay to wait before retrying.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current_delay();
        self.attempt = self.attempt.saturating_add(1);
        self.apply_jitter(delay)
    }

    /// Forget all recorded failures.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    fn apply_jitter(&self, delay: Duration) -> Duration {
        if self.jitter == 0.0 || delay.is_zero() {
            return delay;
        }
        let spread = delay.as_secs_f64() * self.jitter;
        let offset = rand::thread_rng().gen_range(-spread..=spread);
        let secs = (delay.as_secs_f64() + offset).clamp(0.0, self.max.as_secs_f64());
        Duration::from_secs_f64(secs)
    }
}
