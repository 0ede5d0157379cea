//! Concurrency gate for emissions.

use crate::error::PipelineError;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Bounds the number of emissions in flight at once.
///
/// Backed by a tokio [`Semaphore`], which queues waiters fairly, so a waiting
/// emitter is never locked out permanently.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// One in-flight emission. Dropping it releases the slot.
#[derive(Debug)]
pub struct EmissionPermit {
    _permit: OwnedSemaphorePermit,
}

impl RateLimiter {
    /// A zero capacity is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait for a free slot.
    pub async fn acquire(&self) -> Result<EmissionPermit, PipelineError> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| PipelineError::LimiterClosed)?;
        Ok(EmissionPermit { _permit: permit })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn in_flight(&self) -> usize {
        self.capacity - self.available()
    }

    /// Fail every pending and future `acquire`.
    pub fn close(&self) {
        self.semaphore.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_at_most_capacity_in_flight() {
        let limiter = RateLimiter::new(2);
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..5 {
            let limiter = limiter.clone();
            let current = current.clone();
            let peak = peak.clone();
            tasks.push(tokio::spawn(async move {
                for _ in 0..10 {
                    let _permit = limiter.acquire().await.unwrap();
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(limiter.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_release_on_drop() {
        let limiter = RateLimiter::new(1);
        let permit = limiter.acquire().await.unwrap();
        assert_eq!(limiter.available(), 0);
        assert_eq!(limiter.in_flight(), 1);
        drop(permit);
        assert_eq!(limiter.available(), 1);
    }

    #[tokio::test]
    async fn test_close_fails_acquire() {
        let limiter = RateLimiter::new(1);
        limiter.close();
        assert!(matches!(
            limiter.acquire().await,
            Err(PipelineError::LimiterClosed)
        ));
    }

    #[test]
    fn test_zero_capacity_is_one() {
        assert_eq!(RateLimiter::new(0).capacity(), 1);
    }
}
