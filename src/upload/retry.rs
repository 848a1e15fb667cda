//! Retry policy for the resumable upload
//!
//! Server errors (500, 502, 503, 504), transport failures and transfers
//! that made no progress are retried
//! with randomized exponential backoff: after the n-th failure the client
//! sleeps a uniformly random time in `[0, 2^n)` seconds. Anything else is
//! returned to the caller unchanged.

use std::time::Duration;

use crate::error::UploadError;

/// HTTP statuses worth retrying
pub const RETRIABLE_STATUS_CODES: [u16; 4] = [500, 502, 503, 504];

/// Default number of retries before giving up
pub const MAX_RETRIES: u32 = 10;

pub fn is_retriable(error: &UploadError) -> bool {
    match error {
        UploadError::Http(e) => !e.is_builder() && !e.is_decode(),
        UploadError::Status { status, .. } => RETRIABLE_STATUS_CODES.contains(status),
        UploadError::Stalled { .. } => true,
        _ => false,
    }
}

/// Sleep before the `retry`-th attempt. `unit` is a sample from `[0, 1)`.
pub fn backoff_delay(retry: u32, unit: f64) -> Duration {
    let max_sleep = 2f64.powi(retry.min(30) as i32);
    Duration::from_secs_f64(unit.clamp(0.0, 1.0) * max_sleep)
}

/// Counts retriable failures across one upload
#[derive(Debug)]
pub struct RetryState {
    retry: u32,
    max_retries: u32,
}

impl RetryState {
    pub fn new(max_retries: u32) -> Self {
        Self {
            retry: 0,
            max_retries,
        }
    }

    pub fn retries(&self) -> u32 {
        self.retry
    }

    /// Record a failure. Returns how long to sleep before trying again, or
    /// the error that ends the upload.
    pub fn record(&mut self, error: UploadError) -> Result<Duration, UploadError> {
        self.record_with(error, rand::random::<f64>())
    }

    fn record_with(&mut self, error: UploadError, unit: f64) -> Result<Duration, UploadError> {
        if !is_retriable(&error) {
            return Err(error);
        }
        tracing::warn!("A retriable error occurred: {}", error);

        self.retry += 1;
        if self.retry > self.max_retries {
            return Err(UploadError::RetriesExhausted(self.max_retries));
        }
        let delay = backoff_delay(self.retry, unit);
        tracing::info!(
            retry = self.retry,
            "Sleeping {:.2} seconds and then retrying",
            delay.as_secs_f64()
        );
        Ok(delay)
    }
}
