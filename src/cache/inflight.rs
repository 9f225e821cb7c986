//! Request deduplication for in-flight provider calls.
//!
//! When several callers ask for the same key at once, only the first one's
//! producer runs; the others await the same [`Shared`] future and receive a
//! clone of its result, success or error.
//!
//! ```text
//! geocode("paris") A ─┐
//!                     │                          producer
//! geocode("paris") B ─┼──► RequestDeduplicator ──► (one provider chain)
//!                     │          │                      │
//! geocode("paris") C ─┘          ▼                      ▼
//!                        [A, B, C all receive the same Result]
//! ```
//!
//! The map is guarded by a plain `Mutex` that is never held across an
//! `.await`. The record for a key is removed by the shared future itself
//! once the producer settles, so the next call after settlement starts fresh.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use tracing::debug;

use crate::Result;
use crate::telemetry;

type SharedResult<T> = Shared<BoxFuture<'static, Result<T>>>;

/// Counters for monitoring deduplication effectiveness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupStats {
    /// Calls that started a producer.
    pub started: u64,
    /// Calls that joined an in-flight producer.
    pub coalesced: u64,
    /// Keys currently in flight.
    pub in_flight: usize,
}

/// Collapses concurrent identical requests into one.
pub struct RequestDeduplicator<T> {
    in_flight: Arc<Mutex<HashMap<String, SharedResult<T>>>>,
    started: AtomicU64,
    coalesced: AtomicU64,
}

impl<T> RequestDeduplicator<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            started: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
        }
    }

    /// Run `producer` for `key`, unless a call for `key` is already in
    /// flight, in which case await that call instead.
    ///
    /// `producer` is not polled at all when the call is coalesced.
    pub async fn dedupe<F>(&self, key: &str, producer: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let shared = {
            let mut map = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            match map.get(key) {
                Some(existing) => {
                    self.coalesced.fetch_add(1, Ordering::Relaxed);
                    metrics::counter!(telemetry::DEDUP_COALESCED_TOTAL).increment(1);
                    debug!(key, "joining in-flight request");
                    existing.clone()
                }
                None => {
                    self.started.fetch_add(1, Ordering::Relaxed);
                    let registry = Arc::clone(&self.in_flight);
                    let owned_key = key.to_owned();
                    let fut = async move {
                        let result = producer.await;
                        registry
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .remove(&owned_key);
                        result
                    }
                    .boxed()
                    .shared();
                    map.insert(key.to_owned(), fut.clone());
                    fut
                }
            }
        };
        shared.await
    }

    /// Number of keys currently in flight.
    pub fn in_flight(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn stats(&self) -> DedupStats {
        DedupStats {
            started: self.started.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            in_flight: self.in_flight(),
        }
    }
}

impl<T> Default for RequestDeduplicator<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GeocodingError;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test]
    async fn single_call_runs_producer() {
        let dedup = RequestDeduplicator::<u32>::new();
        let value = dedup.dedupe("k", async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
        assert_eq!(dedup.in_flight(), 0);
        assert_eq!(dedup.stats().started, 1);
    }

    #[tokio::test]
    async fn concurrent_calls_share_one_producer() {
        let dedup = RequestDeduplicator::<u32>::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let make = |calls: Arc<AtomicUsize>| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(42)
        };

        let (a, b) = tokio::join!(
            dedup.dedupe("k", make(Arc::clone(&calls))),
            dedup.dedupe("k", make(Arc::clone(&calls))),
        );
        assert_eq!(a.unwrap(), 42);
        assert_eq!(b.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(dedup.stats().coalesced, 1);
        assert_eq!(dedup.in_flight(), 0);
    }

    #[tokio::test]
    async fn concurrent_callers_share_failure() {
        let dedup = RequestDeduplicator::<u32>::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let make = |calls: Arc<AtomicUsize>| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Err::<u32, _>(GeocodingError::Http("boom".into()))
        };

        let (a, b) = tokio::join!(
            dedup.dedupe("k", make(Arc::clone(&calls))),
            dedup.dedupe("k", make(Arc::clone(&calls))),
        );
        assert!(matches!(a, Err(GeocodingError::Http(ref m)) if m == "boom"));
        assert!(matches!(b, Err(GeocodingError::Http(ref m)) if m == "boom"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn settled_key_starts_fresh() {
        let dedup = RequestDeduplicator::<u32>::new();
        let first = dedup
            .dedupe("k", async { Err(GeocodingError::NoProvider) })
            .await;
        assert!(first.is_err());
        let second = dedup.dedupe("k", async { Ok(1) }).await;
        assert_eq!(second.unwrap(), 1);
        assert_eq!(dedup.stats().started, 2);
    }

    #[tokio::test]
    async fn distinct_keys_do_not_coalesce() {
        let dedup = RequestDeduplicator::<u32>::new();
        let (a, b) = tokio::join!(dedup.dedupe("a", async { Ok(1) }), dedup.dedupe("b", async { Ok(2) }));
        assert_eq!((a.unwrap(), b.unwrap()), (1, 2));
        assert_eq!(dedup.stats().coalesced, 0);
    }
}
