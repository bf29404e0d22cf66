use std::thread;
use std::time::Duration;

use anyhow::Result;

/// Bounded retry with exponential backoff for idempotent reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            initial_backoff: Duration::from_millis(300),
            max_backoff: Duration::from_millis(2000),
        }
    }
}

impl RetryPolicy {
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Pause after failed attempt number `attempt` (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << exp)
            .min(self.max_backoff)
    }

    pub fn run<T>(&self, op: impl FnMut(u32) -> Result<T>) -> Result<T> {
        self.run_with_sleep(op, thread::sleep)
    }

    pub fn run_with_sleep<T>(
        &self,
        mut op: impl FnMut(u32) -> Result<T>,
        mut sleep: impl FnMut(Duration),
    ) -> Result<T> {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(err) if attempt >= attempts => {
                    return Err(err.context(format!("gave up after {attempt} attempt(s)")));
                }
                Err(_) => {
                    sleep(self.backoff_for(attempt));
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(250),
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let p = policy(5);
        assert_eq!(p.backoff_for(1), Duration::from_millis(100));
        assert_eq!(p.backoff_for(2), Duration::from_millis(200));
        assert_eq!(p.backoff_for(3), Duration::from_millis(250));
        assert_eq!(p.backoff_for(40), Duration::from_millis(250));
    }

    #[test]
    fn retries_until_success() {
        let mut sleeps = Vec::new();
        let result = policy(3).run_with_sleep(
            |attempt| {
                if attempt < 3 {
                    Err(anyhow::anyhow!("boom {attempt}"))
                } else {
                    Ok(attempt)
                }
            },
            |d| sleeps.push(d),
        );
        assert_eq!(result.unwrap(), 3);
        assert_eq!(
            sleeps,
            vec![Duration::from_millis(100), Duration::from_millis(200)]
        );
    }

    #[test]
    fn stops_after_max_attempts() {
        let mut calls = 0;
        let err = policy(2)
            .run_with_sleep(
                |_| -> Result<()> {
                    calls += 1;
                    Err(anyhow::anyhow!("down"))
                },
                |_| {},
            )
            .unwrap_err();
        assert_eq!(calls, 2);
        assert!(format!("{err:#}").contains("gave up after 2 attempt(s)"));
        assert!(format!("{err:#}").contains("down"));
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let mut calls = 0;
        let _ = policy(0).run_with_sleep(
            |_| -> Result<()> {
                calls += 1;
                Err(anyhow::anyhow!("down"))
            },
            |_| {},
        );
        assert_eq!(calls, 1);
    }
}
