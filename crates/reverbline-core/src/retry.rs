//! Retry with exponential backoff for network operations

use std::fmt::Display;
use std::time::Duration;

use indicatif::ProgressBar;

use crate::fetch::StreamError;

/// Exponential backoff: 2^attempt seconds (2s, 4s, 8s, ...)
pub const fn backoff_duration(attempt: u32) -> Duration {
    Duration::from_secs(2u64.pow(attempt))
}

/// Errors that know whether a second attempt could succeed.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for StreamError {
    fn is_retryable(&self) -> bool {
        StreamError::is_retryable(self)
    }
}

/// Run `attempt_fn`, retrying retryable failures up to `max_retries` times.
///
/// Between attempts the progress bar shows the retry count and the thread
/// sleeps for [`backoff_duration`]. Returns the first success, or the last
/// error once retries are exhausted or the error is permanent.
pub fn retry_with_backoff<T, E>(
    label: &str,
    max_retries: u32,
    pb: &ProgressBar,
    mut attempt_fn: impl FnMut() -> Result<T, E>,
) -> Result<T, E>
where
    E: Retryable + Display,
{
    let mut attempt = 0u32;
    loop {
        match attempt_fn() {
            Ok(v) => return Ok(v),
            Err(e) if attempt < max_retries && e.is_retryable() => {
                attempt += 1;
                pb.set_message(format!("retry {attempt}/{max_retries}..."));
                log::warn!("{label}: attempt {attempt}/{max_retries} failed: {e}, retrying...");
                std::thread::sleep(backoff_duration(attempt));
            }
            Err(e) => {
                log::debug!("{label}: giving up after {} attempt(s): {e}", attempt + 1);
                return Err(e);
            }
        }
    }
}
