// SPDX-FileCopyrightText: 2026 Tutorlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded exponential backoff under a per-request deadline.
//!
//! Webhook providers redeliver when the acknowledgement is slow, so every
//! retry loop here is capped twice: by attempt count and by the wall-clock
//! deadline of the webhook request that carried the event.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;
use tutorlink_config::model::RelayConfig;
use tutorlink_core::DispatchError;
use tutorlink_core::types::Provider;

/// Attempt count and backoff curve for one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub multiplier: u32,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RelayConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            multiplier: config.backoff_multiplier.max(1),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// Sleep before attempt `attempt + 1`, where `attempt` counts from 1.
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let factor = self.multiplier.saturating_pow(exponent);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RelayConfig::default())
    }
}

/// Point in time by which an event must be fully processed.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// This deadline, pushed out so that at least `floor` remains.
    pub fn at_least(&self, floor: Duration) -> Self {
        Self {
            at: self.at.max(Instant::now() + floor),
        }
    }

    /// Whether sleeping for `delay` still leaves time for another attempt.
    pub fn allows(&self, delay: Duration) -> bool {
        delay < self.remaining()
    }
}

/// Final result of a retried operation.
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    pub result: Result<T, E>,
    pub attempts: u32,
}

/// Run `op` until it succeeds, fails permanently, runs out of attempts, or
/// the next backoff would cross the deadline.
///
/// Each attempt is also cut off at the deadline; a cut-off attempt counts as
/// the error `on_timeout` produces.
pub async fn retry_with_deadline<T, E, F, Fut>(
    policy: &RetryPolicy,
    deadline: &Deadline,
    is_retryable: impl Fn(&E) -> bool,
    on_timeout: impl Fn() -> E,
    mut op: F,
) -> RetryOutcome<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        let result = match tokio::time::timeout(deadline.remaining(), op(attempt)).await {
            Ok(result) => result,
            Err(_) => Err(on_timeout()),
        };

        let err = match result {
            Ok(value) => {
                return RetryOutcome {
                    result: Ok(value),
                    attempts: attempt,
                };
            }
            Err(err) => err,
        };

        if !is_retryable(&err) || attempt >= policy.max_attempts {
            return RetryOutcome {
                result: Err(err),
                attempts: attempt,
            };
        }

        let delay = policy.backoff_after(attempt);
        if !deadline.allows(delay) {
            debug!(attempt, delay_ms = delay.as_millis() as u64, "retry skipped, deadline too close");
            return RetryOutcome {
                result: Err(err),
                attempts: attempt,
            };
        }

        debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying after backoff");
        tokio::time::sleep(delay).await;
    }
}

/// [`retry_with_deadline`] specialised for outbound dispatch.
pub async fn retry_dispatch<T, F, Fut>(
    policy: &RetryPolicy,
    deadline: &Deadline,
    provider: Provider,
    op: F,
) -> RetryOutcome<T, DispatchError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, DispatchError>>,
{
    retry_with_deadline(
        policy,
        deadline,
        DispatchError::is_retryable,
        || DispatchError::Unavailable {
            provider,
            message: "processing budget exhausted".into(),
        },
        op,
    )
    .await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn unavailable() -> DispatchError {
        DispatchError::Unavailable {
            provider: Provider::Slack,
            message: "503".into(),
        }
    }

    #[test]
    fn default_curve_is_200_600_1800() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.backoff_after(1), Duration::from_millis(200));
        assert_eq!(policy.backoff_after(2), Duration::from_millis(600));
        assert_eq!(policy.backoff_after(3), Duration::from_millis(1800));
        assert_eq!(policy.backoff_after(4), Duration::from_millis(1800));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let outcome = retry_dispatch(
            &RetryPolicy::default(),
            &Deadline::after(Duration::from_millis(2500)),
            Provider::Slack,
            |_| {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(unavailable())
                    } else {
                        Ok("ts")
                    }
                }
            },
        )
        .await;
        assert_eq!(outcome.result.unwrap(), "ts");
        assert_eq!(outcome.attempts, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_after_max_attempts() {
        let outcome: RetryOutcome<(), _> = retry_dispatch(
            &RetryPolicy::default(),
            &Deadline::after(Duration::from_millis(2500)),
            Provider::Line,
            |_| async { Err(unavailable()) },
        )
        .await;
        assert!(outcome.result.is_err());
        assert_eq!(outcome.attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_errors_are_not_retried() {
        let outcome: RetryOutcome<(), _> = retry_dispatch(
            &RetryPolicy::default(),
            &Deadline::after(Duration::from_millis(2500)),
            Provider::Slack,
            |_| async {
                Err(DispatchError::InvalidCredentials {
                    provider: Provider::Slack,
                    message: "token_revoked".into(),
                })
            },
        )
        .await;
        assert!(matches!(
            outcome.result,
            Err(DispatchError::InvalidCredentials { .. })
        ));
        assert_eq!(outcome.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_never_crosses_deadline() {
        let policy = RetryPolicy {
            max_attempts: 5,
            ..RetryPolicy::default()
        };
        // 200 fits, 600 does not fit in what is left of 700.
        let outcome: RetryOutcome<(), _> = retry_dispatch(
            &policy,
            &Deadline::after(Duration::from_millis(700)),
            Provider::Slack,
            |_| async { Err(unavailable()) },
        )
        .await;
        assert_eq!(outcome.attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_attempt_is_cut_at_deadline() {
        let outcome: RetryOutcome<(), _> = retry_dispatch(
            &RetryPolicy::default(),
            &Deadline::after(Duration::from_millis(500)),
            Provider::Line,
            |_| async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            },
        )
        .await;
        let err = outcome.result.unwrap_err();
        assert!(err.to_string().contains("budget exhausted"));
        assert_eq!(outcome.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn at_least_only_ever_extends() {
        let expired = Deadline::after(Duration::ZERO);
        assert!(expired.is_expired());
        let floored = expired.at_least(Duration::from_millis(250));
        assert_eq!(floored.remaining(), Duration::from_millis(250));

        let roomy = Deadline::after(Duration::from_secs(2));
        assert_eq!(
            roomy.at_least(Duration::from_millis(250)).remaining(),
            Duration::from_secs(2)
        );
    }
}
