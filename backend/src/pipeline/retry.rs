//! Retry with exponential backoff for transient storage and database
//! failures.

use crate::config::RetryConfig;
use crate::error::{ImportError, Result};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Run `op`, retrying transient errors. Blocks the calling thread
    /// between attempts, so call it from blocking contexts only.
    ///
    /// A transient error that survives every attempt is reported as a
    /// persistence error, which fails the job.
    pub fn run<T, F>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    log::warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        what,
                        attempt,
                        self.max_attempts,
                        e,
                        delay
                    );
                    std::thread::sleep(delay);
                }
                Err(e) if e.is_transient() => {
                    log::error!("{} failed after {} attempts: {}", what, attempt, e);
                    return Err(ImportError::Persistence(format!(
                        "{} failed after {} attempts: {}",
                        what, attempt, e
                    )));
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let policy = fast(5);
        assert_eq!(policy.delay_for(1), Duration::from_millis(1));
        assert_eq!(policy.delay_for(2), Duration::from_millis(2));
        assert_eq!(policy.delay_for(3), Duration::from_millis(4));
        assert_eq!(policy.delay_for(10), Duration::from_millis(4));
    }

    #[test]
    fn transient_errors_are_retried() {
        let mut calls = 0;
        let result = fast(3).run("stage", || {
            calls += 1;
            if calls < 3 {
                Err(ImportError::Transient("locked".to_string()))
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn exhausted_retries_become_persistence_errors() {
        let mut calls = 0;
        let result: Result<()> = fast(2).run("merge", || {
            calls += 1;
            Err(ImportError::Transient("locked".to_string()))
        });
        assert_eq!(calls, 2);
        assert!(matches!(result, Err(ImportError::Persistence(_))));
    }

    #[test]
    fn other_errors_are_not_retried() {
        let mut calls = 0;
        let result: Result<()> = fast(5).run("read", || {
            calls += 1;
            Err(ImportError::Parse("bad".to_string()))
        });
        assert_eq!(calls, 1);
        assert!(matches!(result, Err(ImportError::Parse(_))));
    }
}
