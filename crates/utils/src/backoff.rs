use std::time::Duration;

use rand::{thread_rng, Rng};

/// Doubling retry delay, capped and optionally jittered.
pub struct Backoff {
    base: Duration,
    attempt: u32,
    max_delay: Duration,
    jitter: bool,
}

impl Backoff {
    pub fn new(base: Duration) -> Self {
        Backoff {
            base,
            attempt: 0,
            max_delay: base * 32,
            jitter: true,
        }
    }

    pub fn with_max_delay(self, max_delay: Duration) -> Self {
        Backoff { max_delay, ..self }
    }

    pub fn with_jitter(self, jitter: bool) -> Self {
        Backoff { jitter, ..self }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self
            .base
            .checked_mul(1u32 << self.attempt.min(16))
            .unwrap_or(self.max_delay)
            .min(self.max_delay);
        if delay < self.max_delay {
            self.attempt += 1;
        }
        if self.jitter && !delay.is_zero() {
            thread_rng().gen_range(Duration::ZERO..delay)
        } else {
            delay
        }
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
