use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::GenerationError;

// Bounded retry with doubling backoff in front of the generation service
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    // 3 retries: 1s, 2s, 4s
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    // Delay before retrying after the failed 0-based attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.pow(attempt)
    }
}

// Run `call` up to 1 + max_retries times, strictly sequentially. The first
// success wins; the waits suspend without blocking the runtime. The payload
// is never inspected, only whether the call failed.
pub async fn with_retries<T, F, Fut>(policy: &RetryPolicy, mut call: F) -> Result<T, GenerationError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GenerationError>>,
{
    let attempts = policy.max_retries + 1;

    for attempt in 0..attempts {
        match call().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!("generation succeeded on attempt {}", attempt + 1);
                }
                return Ok(value);
            }
            Err(err) if attempt + 1 < attempts => {
                let delay = policy.delay_for(attempt);
                warn!(
                    "generation attempt {} failed: {}. retrying in {:?}",
                    attempt + 1,
                    err,
                    delay
                );
                sleep(delay).await;
            }
            Err(err) => {
                // budget spent, no delay after the last failure
                return Err(GenerationError::Exhausted {
                    attempts,
                    last: err.to_string(),
                });
            }
        }
    }

    unreachable!("attempt budget is at least one")
}
