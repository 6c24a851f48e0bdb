use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::warn;

use crate::config::CollaboratorsSection;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay_range: (Duration, Duration),
    jitter: Duration,
}

#[derive(Debug, Clone)]
pub struct RetryOutcome<T> {
    pub result: T,
    pub attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_range: (Duration::from_millis(500), Duration::from_millis(2000)),
            jitter: Duration::from_millis(250),
        }
    }
}

impl From<&CollaboratorsSection> for RetryPolicy {
    fn from(section: &CollaboratorsSection) -> Self {
        let [min, max] = section.retry_delay_ms;
        Self::new(
            section.max_attempts,
            (Duration::from_millis(min), Duration::from_millis(max.max(min))),
            Duration::from_millis(section.jitter_ms),
        )
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay_range: (Duration, Duration), jitter: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay_range,
            jitter,
        }
    }

    /// No waiting between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, (Duration::ZERO, Duration::ZERO), Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before retry number `retry` (1-based), growing linearly from
    /// the lower to the upper bound of the range. Jitter is not included.
    pub fn compute_delay(&self, retry: u32) -> Duration {
        let (min, max) = self.delay_range;
        let steps = self.max_attempts.saturating_sub(2).max(1);
        let position = retry.saturating_sub(1).min(steps);
        let span = max.saturating_sub(min);
        min + span.mul_f64(f64::from(position) / f64::from(steps))
    }

    fn jittered(&self, retry: u32) -> Duration {
        let delay = self.compute_delay(retry);
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return delay;
        }
        delay + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }

    pub async fn run<F, Fut, T, E>(&self, label: &str, mut operation: F) -> Result<RetryOutcome<T>, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 0u32;
        loop {
            match operation(attempt).await {
                Ok(result) => {
                    return Ok(RetryOutcome {
                        result,
                        attempts: attempt + 1,
                    })
                }
                Err(error) => {
                    attempt += 1;
                    if attempt >= self.max_attempts {
                        warn!(operation = label, attempts = attempt, %error, "giving up");
                        return Err(error);
                    }
                    let delay = self.jittered(attempt);
                    warn!(
                        operation = label,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        %error,
                        "attempt failed, retrying"
                    );
                    if !delay.is_zero() {
                        sleep(delay).await;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn delays_grow_linearly_across_the_range() {
        let policy = RetryPolicy::new(
            3,
            (Duration::from_millis(500), Duration::from_millis(2000)),
            Duration::ZERO,
        );
        assert_eq!(policy.compute_delay(1), Duration::from_millis(500));
        assert_eq!(policy.compute_delay(2), Duration::from_millis(2000));
        assert_eq!(policy.compute_delay(9), Duration::from_millis(2000));
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let outcome = RetryPolicy::immediate(3)
            .run("synthesize", move |_| {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err("busy".to_string())
                    } else {
                        Ok("done")
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(outcome.result, "done");
        assert_eq!(outcome.attempts, 3);
    }

    #[tokio::test]
    async fn stops_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result: Result<RetryOutcome<()>, String> = RetryPolicy::immediate(2)
            .run("generate", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err("down".to_string()) }
            })
            .await;
        assert_eq!(result.unwrap_err(), "down");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_between_attempts() {
        let policy = RetryPolicy::new(
            2,
            (Duration::from_millis(500), Duration::from_millis(500)),
            Duration::ZERO,
        );
        let started = tokio::time::Instant::now();
        let _: Result<RetryOutcome<()>, String> = policy
            .run("generate", |_| async { Err("down".to_string()) })
            .await;
        assert!(started.elapsed() >= Duration::from_millis(500));
    }
}
