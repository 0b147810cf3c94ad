//! Shared utility functions.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, timeout};

use crate::{Error, Result};

/// Resolve once `duration` has elapsed, or never when there is no deadline.
pub async fn deadline(duration: Option<Duration>) {
    match duration {
        Some(duration) => sleep(duration).await,
        None => std::future::pending().await,
    }
}

/// Run `fut`, failing with [`Error::Timeout`] if it takes longer than `duration`.
pub async fn with_timeout<F, T>(duration: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match timeout(duration, fut).await {
        Ok(inner) => inner,
        Err(_) => Err(Error::Timeout(duration)),
    }
}
