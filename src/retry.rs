//! Bounded polling with transient-failure tolerance
//!
//! Remote jobs are asynchronous: after submission the status has to be asked
//! for repeatedly until the job settles. [`poll_with_budget`] drives that loop
//! under a fixed attempt budget and a fixed inter-attempt delay.
//!
//! # Example
//!
//! ```no_run
//! use imagen_dispatch::config::PollConfig;
//! use imagen_dispatch::retry::{IsRetryable, PollStep, poll_with_budget};
//!
//! #[derive(Debug)]
//! struct Flaky;
//!
//! impl std::fmt::Display for Flaky {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "flaky")
//!     }
//! }
//!
//! impl IsRetryable for Flaky {
//!     fn is_retryable(&self) -> bool {
//!         true
//!     }
//! }
//!
//! # async fn example() {
//! let config = PollConfig::default();
//! let finished = poll_with_budget(&config, |_attempt| async {
//!     Ok::<_, Flaky>(PollStep::Ready("done"))
//! })
//! .await;
//! # }
//! ```

use crate::config::PollConfig;
use crate::error::ClientError;
use std::future::Future;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (network timeouts, connection reset, a 5xx from a busy
/// service) should return `true`. Failures that indicate the conversation
/// with the remote is broken (an unparseable body) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the attempt may be repeated
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for ClientError {
    fn is_retryable(&self) -> bool {
        match self {
            // Any transport failure: timeout, connect, reset, body read
            ClientError::Network(e) => !e.is_decode() && !e.is_builder(),
            // Non-2xx statuses are the service being unhappy right now
            ClientError::HttpStatus { .. } => true,
            ClientError::ServiceUnavailable(_) => true,
            // A body we cannot understand is an unknown failure mode
            ClientError::Decode(_) => false,
            ClientError::UnexpectedResponse(_) => false,
            ClientError::Api(_) => false,
            ClientError::NoActivePipeline => false,
            ClientError::PipelineUnresolved(_) => false,
        }
    }
}

/// Result of a single poll attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStep<T> {
    /// The job settled with a value
    Ready(T),
    /// The job is still running
    Pending,
}

/// How a budgeted polling loop ended
#[derive(Debug)]
pub enum PollFinish<T, E> {
    /// An attempt returned [`PollStep::Ready`]
    Ready {
        /// Settled value
        value: T,
        /// Attempts consumed, including the successful one
        attempts: u32,
    },
    /// Every attempt was pending or failed transiently
    Exhausted {
        /// Attempts consumed (equals the budget)
        attempts: u32,
    },
    /// An attempt failed with a non-retryable error
    Aborted {
        /// The error that stopped the loop
        error: E,
        /// Attempts consumed, including the failing one
        attempts: u32,
    },
}

/// Drive `attempt` until it is ready, fails permanently, or the budget is spent
///
/// `attempt` receives the 1-based attempt number. The configured delay is
/// slept only between attempts, so a job that settles on attempt `k` costs
/// exactly `k - 1` delays and an exhausted budget of `n` costs `n - 1`.
/// A transient error consumes its attempt exactly like a pending status.
pub async fn poll_with_budget<F, Fut, T, E>(config: &PollConfig, mut attempt: F) -> PollFinish<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<PollStep<T>, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let max_attempts = config.max_attempts;

    for current in 1..=max_attempts {
        match attempt(current).await {
            Ok(PollStep::Ready(value)) => {
                return PollFinish::Ready {
                    value,
                    attempts: current,
                };
            }
            Ok(PollStep::Pending) => {
                tracing::debug!(attempt = current, max_attempts, "job still pending");
            }
            Err(e) if e.is_retryable() => {
                tracing::warn!(
                    error = %e,
                    attempt = current,
                    max_attempts,
                    "poll attempt failed, will retry"
                );
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    attempt = current,
                    "poll attempt failed with non-retryable error"
                );
                return PollFinish::Aborted {
                    error: e,
                    attempts: current,
                };
            }
        }

        if current < max_attempts {
            tokio::time::sleep(config.delay).await;
        }
    }

    PollFinish::Exhausted {
        attempts: max_attempts,
    }
}
