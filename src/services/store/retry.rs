//! Bounded retry around calls into the database.

use super::StoreError;
use sea_orm::DbErr;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// How a database failure should be treated by [`RetryPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The pool could not hand out a working connection. Retried after a reconnect.
    ConnectionLost,
    /// Retried as-is.
    Transient,
    /// Schema, constraint or decoding problems. Never retried.
    Permanent,
}

pub fn classify(err: &DbErr) -> FailureKind {
    match err {
        DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => FailureKind::ConnectionLost,
        DbErr::Exec(_) | DbErr::Query(_) => {
            if err.sql_err().is_some() {
                FailureKind::Permanent
            } else {
                FailureKind::Transient
            }
        }
        _ => FailureKind::Permanent,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed(Duration),
    Exponential { initial: Duration, max: Duration },
}

impl Backoff {
    /// Delay to wait after the given (1-based) failed attempt.
    pub fn delay(&self, failed_attempt: u32) -> Duration {
        match *self {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { initial, max } => {
                let factor = 2u32.saturating_pow(failed_attempt.saturating_sub(1));
                initial.saturating_mul(factor).min(max)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::Fixed(Duration::from_secs(1)),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// No waiting between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Backoff::Fixed(Duration::ZERO))
    }

    /// Runs `attempt` until it succeeds, fails permanently, or the attempt budget is spent.
    /// `on_connection_lost` fires before the wait that follows a connection-class failure.
    pub async fn run<T, F, Fut, R>(
        &self,
        operation: &'static str,
        on_connection_lost: R,
        mut attempt: F,
    ) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DbErr>>,
        R: Fn(),
    {
        let max_attempts = self.max_attempts.max(1);
        let mut tries = 0;

        loop {
            tries += 1;

            let err = match attempt().await {
                Ok(value) => {
                    if tries > 1 {
                        debug!(operation, tries, "Database operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            let kind = classify(&err);
            if kind == FailureKind::Permanent {
                warn!(operation, "Database rejected operation: {}", err);
                return Err(StoreError::Rejected {
                    operation,
                    source: err,
                });
            }

            if tries >= max_attempts {
                warn!(operation, tries, "Giving up on database operation: {}", err);
                return Err(StoreError::Unavailable {
                    operation,
                    attempts: tries,
                    source: err,
                });
            }

            if kind == FailureKind::ConnectionLost {
                on_connection_lost();
            }

            let delay = self.backoff.delay(tries);
            debug!(
                operation,
                tries,
                delay_ms = delay.as_millis() as u64,
                "Retrying database operation: {}",
                err
            );
            sleep(delay).await;
        }
    }
}
