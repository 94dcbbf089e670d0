use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::Outcome;

/// Run `operation` up to `attempts` times (at least once).
///
/// The attempt number (starting at 1) is passed in. Stops at the first
/// success or the first error that is not retryable, sleeping `delay`
/// between attempts. Returns the last error when every attempt fails.
pub fn retry<T, F>(attempts: usize, delay: Duration, mut operation: F) -> Outcome<T>
where
    F: FnMut(usize) -> Outcome<T>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match operation(attempt) {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_retryable() => {
                debug!(attempt, error = %err, "error is not retryable");
                return Err(err);
            }
            Err(err) if attempt >= attempts => {
                warn!(attempts, error = %err, "all attempts failed");
                return Err(err);
            }
            Err(err) => {
                debug!(attempt, attempts, error = %err, "attempt failed, retrying");
                if !delay.is_zero() {
                    thread::sleep(delay);
                }
                attempt += 1;
            }
        }
    }
}
