//! Bounded admission for analysis work.
//!
//! [`ConcurrencyLimiter`] hands out at most `max` [`Permit`]s at a time.
//! Waiters are served first-come-first-served (tokio's semaphore is fair),
//! and a permit goes back to the pool when it is dropped, so capacity is
//! returned on every exit path of the guarded work, panics included.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LimiterError {
    /// The limiter was closed while waiting; no new work is admitted.
    #[error("concurrency limiter closed")]
    Closed,
}

#[derive(Debug)]
struct Inner {
    semaphore: Arc<Semaphore>,
    max: usize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

/// Counting gate in front of the analysis backend.  Cheap to clone; clones
/// share the same pool.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    inner: Arc<Inner>,
}

/// One unit of capacity.  Released exactly once, on drop or via
/// [`ConcurrencyLimiter::release`].
#[derive(Debug)]
pub struct Permit {
    inner: Arc<Inner>,
    _permit: OwnedSemaphorePermit,
}

impl Drop for Permit {
    fn drop(&mut self) {
        // Runs before `_permit` returns capacity to the semaphore.
        self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ConcurrencyLimiter {
    pub const DEFAULT_PERMITS: usize = 3;

    /// A limiter with `max` permits, clamped to `1..=Semaphore::MAX_PERMITS`.
    pub fn new(max: usize) -> Self {
        let max = max.clamp(1, Semaphore::MAX_PERMITS);
        Self {
            inner: Arc::new(Inner {
                semaphore: Arc::new(Semaphore::new(max)),
                max,
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }),
        }
    }

    /// Wait for a permit.
    pub async fn acquire(&self) -> Result<Permit, LimiterError> {
        let permit = Arc::clone(&self.inner.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| LimiterError::Closed)?;

        let now = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.peak.fetch_max(now, Ordering::SeqCst);

        Ok(Permit {
            inner: Arc::clone(&self.inner),
            _permit: permit,
        })
    }

    /// Return `permit` to the pool, waking the longest waiter.
    pub fn release(&self, permit: Permit) {
        drop(permit);
    }

    /// Run `work` while holding a permit.
    pub async fn run<F, T>(&self, work: F) -> Result<T, LimiterError>
    where
        F: Future<Output = T>,
    {
        let _permit = self.acquire().await?;
        Ok(work.await)
    }

    /// Stop admitting work.  Current holders keep their permits; pending and
    /// future [`acquire`](Self::acquire) calls fail with
    /// [`LimiterError::Closed`].
    pub fn close(&self) {
        self.inner.semaphore.close();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.semaphore.is_closed()
    }

    pub fn max_permits(&self) -> usize {
        self.inner.max
    }

    /// Permits currently held.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of permits ever held at once.
    pub fn peak_in_flight(&self) -> usize {
        self.inner.peak.load(Ordering::SeqCst)
    }

    pub fn available(&self) -> usize {
        self.inner.semaphore.available_permits()
    }
}

impl Default for ConcurrencyLimiter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PERMITS)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    #[tokio::test]
    async fn never_exceeds_configured_permits() {
        let limiter = ConcurrencyLimiter::new(3);
        let mut handles = Vec::new();

        for _ in 0..12 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                let permit = limiter.acquire().await.unwrap();
                assert!(limiter.in_flight() <= 3);
                tokio::time::sleep(Duration::from_millis(5)).await;
                limiter.release(permit);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(limiter.peak_in_flight(), 3);
        assert_eq!(limiter.in_flight(), 0);
        assert_eq!(limiter.available(), 3);
    }

    #[tokio::test]
    async fn waiters_are_served_in_fifo_order() {
        let limiter = ConcurrencyLimiter::new(1);
        let order = Arc::new(Mutex::new(Vec::new()));

        let gate = limiter.acquire().await.unwrap();

        let mut handles = Vec::new();
        for i in 0..4 {
            let limiter = limiter.clone();
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                let _permit = limiter.acquire().await.unwrap();
                order.lock().unwrap().push(i);
            }));
            // Let task `i` register as a waiter before spawning the next one.
            tokio::task::yield_now().await;
        }

        limiter.release(gate);
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn permit_released_when_work_panics() {
        let limiter = ConcurrencyLimiter::new(1);

        let l = limiter.clone();
        let result = tokio::spawn(async move {
            let _permit = l.acquire().await.unwrap();
            panic!("work failed");
        })
        .await;
        assert!(result.is_err());

        assert_eq!(limiter.in_flight(), 0);
        assert_eq!(limiter.available(), 1);
        let permit = tokio::time::timeout(Duration::from_secs(1), limiter.acquire())
            .await
            .expect("capacity was returned")
            .unwrap();
        drop(permit);
    }

    #[tokio::test]
    async fn run_holds_a_permit_for_the_duration() {
        let limiter = ConcurrencyLimiter::new(2);
        let observed = limiter.run(async { limiter.in_flight() }).await.unwrap();
        assert_eq!(observed, 1);
        assert_eq!(limiter.in_flight(), 0);
    }

    #[tokio::test]
    async fn close_rejects_new_and_pending_acquires() {
        let limiter = ConcurrencyLimiter::new(1);
        let held = limiter.acquire().await.unwrap();

        let l = limiter.clone();
        let waiter = tokio::spawn(async move { l.acquire().await.map(|_| ()) });
        tokio::task::yield_now().await;

        limiter.close();
        assert!(limiter.is_closed());
        assert_eq!(waiter.await.unwrap(), Err(LimiterError::Closed));
        assert_eq!(limiter.acquire().await.err(), Some(LimiterError::Closed));

        drop(held);
        assert_eq!(limiter.in_flight(), 0);
    }

    #[test]
    fn oversized_limit_is_clamped_to_semaphore_maximum() {
        let limiter = ConcurrencyLimiter::new(usize::MAX);
        assert_eq!(limiter.max_permits(), Semaphore::MAX_PERMITS);
        assert_eq!(limiter.available(), Semaphore::MAX_PERMITS);
    }

    #[test]
    fn zero_permits_is_clamped_to_one() {
        assert_eq!(ConcurrencyLimiter::new(0).max_permits(), 1);
        assert_eq!(
            ConcurrencyLimiter::default().max_permits(),
            ConcurrencyLimiter::DEFAULT_PERMITS
        );
    }
}
