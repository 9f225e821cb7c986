//! Per-attempt deadline for provider calls.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::{GeocodingError, Result};

/// Run one provider attempt under `limit`.
///
/// On expiry the attempt future is dropped, which aborts the in-flight HTTP
/// request, and [`GeocodingError::Timeout`] is returned so the caller can
/// move on to the next candidate.
pub(crate) async fn with_timeout<F, T>(
    provider: &str,
    operation: &str,
    limit: Duration,
    attempt: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, attempt).await {
        Ok(result) => result,
        Err(_) => {
            warn!(
                provider,
                operation,
                timeout_ms = limit.as_millis() as u64,
                "provider attempt timed out"
            );
            Err(GeocodingError::Timeout {
                provider: provider.to_owned(),
                after: limit,
            })
        }
    }
}
