use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Fixed-backoff retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }
}

/// Result of a retried operation
#[derive(Debug, PartialEq)]
pub enum Retried<T, E> {
    /// An attempt produced a value
    Found(T),
    /// At least one attempt completed but none produced a value
    Empty { attempts: u32 },
    /// No attempt completed
    Failed { attempts: u32, error: E },
}

impl<T, E> Retried<T, E> {
    /// Collapse into the value, dropping the distinction between empty and failed
    pub fn found(self) -> Option<T> {
        match self {
            Retried::Found(value) => Some(value),
            _ => None,
        }
    }
}

/// Run `op` until it yields a value, retrying empty results and errors
pub async fn retry<T, E, F, Fut>(policy: RetryPolicy, label: &str, op: F) -> Retried<T, E>
where
    E: Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    retry_if(policy, label, |_: &E| true, op).await
}

/// Like [`retry`], but errors rejected by `retryable` end the loop at once
///
/// Attempts are numbered from 1. The backoff is awaited between attempts,
/// never after the last one.
pub async fn retry_if<T, E, P, F, Fut>(
    policy: RetryPolicy,
    label: &str,
    retryable: P,
    mut op: F,
) -> Retried<T, E>
where
    E: Display,
    P: Fn(&E) -> bool,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    let mut completed = false;
    let mut last_error = None;

    for attempt in 1..=policy.max_attempts {
        match op(attempt).await {
            Ok(Some(value)) => return Retried::Found(value),
            Ok(None) => {
                completed = true;
                tracing::debug!(attempt, max = policy.max_attempts, "{}: empty result", label);
            }
            Err(e) => {
                tracing::warn!(
                    attempt,
                    max = policy.max_attempts,
                    error = %e,
                    "{}: attempt failed",
                    label
                );
                if !retryable(&e) {
                    return Retried::Failed {
                        attempts: attempt,
                        error: e,
                    };
                }
                last_error = Some(e);
            }
        }

        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.backoff).await;
        }
    }

    match (completed, last_error) {
        (false, Some(error)) => Retried::Failed {
            attempts: policy.max_attempts,
            error,
        },
        _ => Retried::Empty {
            attempts: policy.max_attempts,
        },
    }
}
