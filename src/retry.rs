use anyhow::Result;
use log::{info, warn};
use std::time::Duration;

use crate::config::constants;

/// Bounded exponential backoff.
///
/// The first attempt runs immediately; each failure is followed by a delay of
/// `initial_delay * 2^n` (n counting from zero) until `max_retries` extra
/// attempts have been spent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: constants::MAX_RETRIES,
            initial_delay: Duration::from_millis(constants::INITIAL_RETRY_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
        }
    }

    /// Delay slept after failed attempt number `retry` (0-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.initial_delay
            .saturating_mul(2u32.saturating_pow(retry))
    }

    /// Run `operation` until it succeeds or the retries are exhausted.
    ///
    /// `operation` receives the 0-based attempt number. `sleep` is called with
    /// each backoff delay; pass `std::thread::sleep` outside of tests.
    ///
    /// # Errors
    ///
    /// Returns the last error, with the attempt count as context, once
    /// `max_retries + 1` attempts have failed.
    pub fn run<T, F, S>(&self, mut operation: F, mut sleep: S) -> Result<T>
    where
        F: FnMut(u32) -> Result<T>,
        S: FnMut(Duration),
    {
        let mut attempt = 0;
        loop {
            match operation(attempt) {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!("Attempt {} failed: {:#}", attempt + 1, e);

                    if attempt >= self.max_retries {
                        return Err(e.context(format!(
                            "giving up after {} attempts",
                            attempt + 1
                        )));
                    }

                    let delay = self.delay_for(attempt);
                    info!("Retrying in {} ms...", delay.as_millis());
                    sleep(delay);
                    attempt += 1;
                }
            }
        }
    }
}
