//! Retry logic with exponential backoff
//!
//! The schedulers wrap every resolver call and every media transfer in [`with_retry`],
//! driven by a [`RetryConfig`]. Errors decide for themselves whether another attempt is
//! worthwhile through [`IsRetryable`]; authorization failures and known-bad input are
//! never retried.
//!
//! # Example
//!
//! ```no_run
//! use reel_dl::retry::{IsRetryable, with_retry};
//! use reel_dl::config::RetryConfig;
//! use tokio_util::sync::CancellationToken;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{:?}", self)
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let config = RetryConfig::default();
//! let cancel = CancellationToken::new();
//! with_retry(&config, &cancel, || async {
//!     // Your operation here
//!     Ok::<_, MyError>(())
//! }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::{ResolveError, TransferError};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (timeouts, connection resets, 5xx) should return `true`.
/// Permanent failures (401, unsupported input, 404) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for ResolveError {
    fn is_retryable(&self) -> bool {
        match self {
            ResolveError::Unauthorized(_)
            | ResolveError::Unsupported(_)
            | ResolveError::InvalidLink(_) => false,
            ResolveError::Status { status, .. } => is_retryable_status(*status),
            // Network blips, garbled bodies and unknown resolver complaints get another try
            ResolveError::Network(_) | ResolveError::Decode(_) | ResolveError::Other(_) => true,
        }
    }
}

impl IsRetryable for TransferError {
    fn is_retryable(&self) -> bool {
        match self {
            TransferError::Unauthorized { .. } | TransferError::Cancelled => false,
            TransferError::Status { status, .. } => is_retryable_status(*status),
            TransferError::Network(_) => true,
            TransferError::Io { source, .. } => is_retryable_io(source),
        }
    }
}

fn is_retryable_status(status: u16) -> bool {
    status == 408 || status == 429 || (500..600).contains(&status)
}

fn is_retryable_io(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::TimedOut
            | std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::NotConnected
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::Interrupted
            | std::io::ErrorKind::UnexpectedEof
    )
}

/// Execute an async operation with exponential backoff retry logic
///
/// The operation runs once, then up to `config.max_attempts` more times while it keeps
/// failing with a retryable error. Backoff sleeps race against `cancel`: once the token
/// fires no further attempt is made and the last error is returned.
///
/// # Example
///
/// ```no_run
/// use reel_dl::retry::with_retry;
/// use reel_dl::config::RetryConfig;
/// use reel_dl::error::TransferError;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), TransferError> {
/// let config = RetryConfig::default();
/// let result = with_retry(&config, &CancellationToken::new(), || async {
///     Ok::<String, TransferError>("success".to_string())
/// }).await?;
/// # Ok(())
/// # }
/// ```
pub async fn with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                attempt += 1;

                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis(),
                    "Operation failed, retrying"
                );

                let wait = if config.jitter {
                    add_jitter(delay)
                } else {
                    delay
                };

                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!(error = %e, "Retry abandoned, abort requested");
                        return Err(e);
                    }
                    _ = tokio::time::sleep(wait) => {}
                }

                delay = next_delay(delay, config);
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::debug!(
                        error = %e,
                        attempts = attempt + 1,
                        "Operation failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::debug!(error = %e, "Operation failed with non-retryable error");
                }
                return Err(e);
            }
        }
    }
}

/// Grow `delay` by the backoff multiplier, capped at `max_delay` even when the product
/// does not fit in a [`Duration`]
fn next_delay(delay: Duration, config: &RetryConfig) -> Duration {
    Duration::try_from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier)
        .unwrap_or(config.max_delay)
        .min(config.max_delay)
}

/// Add random jitter to a delay
///
/// The result lies between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::try_from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor)).unwrap_or(delay)
}
