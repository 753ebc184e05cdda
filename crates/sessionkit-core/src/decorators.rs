//! Concurrency decorators: lock, cooldown, semaphore, timelimit, and
//! speedlimit, wrapping an async operation with fallback-or-wait
//! semantics.
//!
//! Ported from melobot's `utils.py` decorators of the same name. The
//! Python originals are higher-order functions returning a wrapped
//! function whose return type is a union of "the wrapped function's
//! return type" and "whatever the fallback callback returns" — Rust has
//! no convenient way to express that without boxing into `dyn Any`, so
//! these ports require the fallback to return the same `T` as the
//! operation; that's the idiomatic shape and matches how every caller in
//! this codebase actually uses them.

use std::future::Future;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::{Mutex, Semaphore as TokioSemaphore};
use tokio::time::error::Elapsed;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("speedlimit `limit` must be > 0")]
    NonPositiveLimit,
    #[error("duration must be > 0")]
    NonPositiveDuration,
}

/// Serializes calls to the wrapped operation; a caller that finds it
/// already locked runs `on_busy` (if given) instead of waiting.
pub struct Lock {
    inner: Mutex<()>,
}

impl Lock {
    pub fn new() -> Self {
        Lock { inner: Mutex::new(()) }
    }

    pub async fn call<T, F, Fut, C, CFut>(&self, op: F, on_busy: Option<C>) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
        C: FnOnce() -> CFut,
        CFut: Future<Output = T>,
    {
        if let Some(cb) = on_busy {
            if let Ok(permit) = self.inner.try_lock() {
                let result = op().await;
                drop(permit);
                return result;
            }
            return cb().await;
        }
        let _permit = self.inner.lock().await;
        op().await
    }
}

impl Default for Lock {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs the wrapped operation at most once per `interval`. While another
/// call is in flight, `on_busy` runs instead (if given) or the caller
/// waits for it to finish. Once the interval hasn't elapsed yet, either
/// `on_cooldown(remaining)` runs or the caller sleeps out the remainder.
pub struct Cooldown {
    lock: Mutex<Instant>,
    interval: Duration,
    busy: Mutex<()>,
}

impl Cooldown {
    pub fn new(interval: Duration) -> Result<Self, ValidationError> {
        if interval.is_zero() {
            return Err(ValidationError::NonPositiveDuration);
        }
        Ok(Cooldown {
            lock: Mutex::new(Instant::now() - interval - Duration::from_secs(1)),
            interval,
            busy: Mutex::new(()),
        })
    }

    pub async fn call<T, F, Fut, B, BFut, C, CFut>(
        &self,
        op: F,
        on_busy: Option<B>,
        on_cooldown: Option<C>,
    ) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
        B: FnOnce() -> BFut,
        BFut: Future<Output = T>,
        C: FnOnce(Duration) -> CFut,
        CFut: Future<Output = T>,
    {
        if let Some(busy_cb) = on_busy {
            if self.busy.try_lock().is_err() {
                return busy_cb().await;
            }
        }
        let _busy_guard = self.busy.lock().await;

        let mut last = self.lock.lock().await;
        let elapsed = last.elapsed();
        if elapsed > self.interval {
            let result = op().await;
            *last = Instant::now();
            return result;
        }
        let remaining = self.interval - elapsed;
        drop(last);

        if let Some(cd_cb) = on_cooldown {
            cd_cb(remaining).await
        } else {
            tokio::time::sleep(remaining).await;
            let result = op().await;
            *self.lock.lock().await = Instant::now();
            result
        }
    }
}

/// Bounds concurrent invocations with a semaphore; a caller that can't get
/// a permit immediately runs `on_full` (if given) instead of waiting.
pub struct Semaphore {
    inner: TokioSemaphore,
}

impl Semaphore {
    pub fn new(permits: usize) -> Self {
        Semaphore { inner: TokioSemaphore::new(permits) }
    }

    pub async fn call<T, F, Fut, C, CFut>(&self, op: F, on_full: Option<C>) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
        C: FnOnce() -> CFut,
        CFut: Future<Output = T>,
    {
        if let Some(cb) = on_full {
            match self.inner.try_acquire() {
                Ok(_permit) => return op().await,
                Err(_) => return cb().await,
            }
        }
        let _permit = self.inner.acquire().await.expect("semaphore not closed");
        op().await
    }
}

#[derive(Debug, Error)]
#[error("timelimit exceeded")]
pub struct TimedOut(#[from] Elapsed);

/// Bounds the wrapped operation to `timeout`; on expiry runs `on_timeout`
/// (if given) or returns [`TimedOut`].
pub struct TimeLimit {
    timeout: Duration,
}

impl TimeLimit {
    pub fn new(timeout: Duration) -> Self {
        TimeLimit { timeout }
    }

    pub async fn call<T, F, Fut, C, CFut>(
        &self,
        op: F,
        on_timeout: Option<C>,
    ) -> Result<T, TimedOut>
    where
        F: Future<Output = T>,
        C: FnOnce() -> CFut,
        CFut: Future<Output = T>,
    {
        match tokio::time::timeout(self.timeout, op).await {
            Ok(v) => Ok(v),
            Err(elapsed) => match on_timeout {
                Some(cb) => Ok(cb().await),
                None => Err(TimedOut(elapsed)),
            },
        }
    }
}

/// Sliding-window rate limit: at most `limit` calls per `duration`. Once
/// the window is exhausted, `on_limited` runs (if given) or the caller
/// waits out the remainder of the window.
///
/// The original implements this with a recursive `Future`-returning
/// helper to dodge lock contention; this port uses plain atomics for the
/// same reason (the window reset and counter increment are the only
/// shared state, and both fit in a u64/u32 compare-and-swap).
pub struct SpeedLimit {
    limit: u32,
    duration: Duration,
    called: AtomicU32,
    window_start: AtomicU64,
    epoch: Instant,
}

impl SpeedLimit {
    pub fn new(limit: u32, duration: Duration) -> Result<Self, ValidationError> {
        if limit == 0 {
            return Err(ValidationError::NonPositiveLimit);
        }
        if duration.is_zero() {
            return Err(ValidationError::NonPositiveDuration);
        }
        Ok(SpeedLimit {
            limit,
            duration,
            called: AtomicU32::new(0),
            window_start: AtomicU64::new(0),
            epoch: Instant::now(),
        })
    }

    fn now_millis(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    pub async fn call<T, F, Fut, C, CFut>(&self, op: F, on_limited: Option<C>) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
        C: FnOnce() -> CFut,
        CFut: Future<Output = T>,
    {
        let window_ms = self.duration.as_millis() as u64;
        loop {
            let now = self.now_millis();
            let start = self.window_start.load(Ordering::SeqCst);
            let elapsed = now.saturating_sub(start);

            if elapsed > window_ms {
                self.window_start.store(now, Ordering::SeqCst);
                self.called.store(1, Ordering::SeqCst);
                return op().await;
            }

            let prev = self.called.fetch_add(1, Ordering::SeqCst);
            if prev < self.limit {
                return op().await;
            }
            self.called.fetch_sub(1, Ordering::SeqCst);

            if let Some(cb) = on_limited {
                return cb().await;
            }
            let remaining = window_ms.saturating_sub(elapsed);
            tokio::time::sleep(Duration::from_millis(remaining)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicU32 as Counter;

    #[tokio::test]
    async fn lock_serializes_calls() {
        let lock = Arc::new(Lock::new());
        let order = Arc::new(tokio::sync::Mutex::new(Vec::new()));

        let l2 = lock.clone();
        let o2 = order.clone();
        let t1 = tokio::spawn(async move {
            l2.call(
                || async {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    o2.lock().await.push(1);
                },
                None::<fn() -> std::future::Ready<()>>,
            )
            .await
        });
        tokio::time::sleep(Duration::from_millis(5)).await;
        lock.call(
            || async {
                order.lock().await.push(2);
            },
            None::<fn() -> std::future::Ready<()>>,
        )
        .await;
        t1.await.unwrap();
        assert_eq!(*order.lock().await, vec![1, 2]);
    }

    #[tokio::test]
    async fn lock_runs_busy_callback_when_contended() {
        let lock = Arc::new(Lock::new());
        let l2 = lock.clone();
        let held = tokio::spawn(async move {
            l2.call(
                || async {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                },
                None::<fn() -> std::future::Ready<()>>,
            )
            .await
        });
        tokio::time::sleep(Duration::from_millis(5)).await;
        let result = lock
            .call(|| async { "ran" }, Some(|| async { "busy" }))
            .await;
        assert_eq!(result, "busy");
        held.await.unwrap();
    }

    #[tokio::test]
    async fn semaphore_limits_concurrency() {
        let sem = Arc::new(Semaphore::new(1));
        let counter = Arc::new(Counter::new(0));
        let max_seen = Arc::new(Counter::new(0));

        let mut tasks = Vec::new();
        for _ in 0..4 {
            let sem = sem.clone();
            let counter = counter.clone();
            let max_seen = max_seen.clone();
            tasks.push(tokio::spawn(async move {
                sem.call(
                    || async {
                        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
                        max_seen.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        counter.fetch_sub(1, Ordering::SeqCst);
                    },
                    None::<fn() -> std::future::Ready<()>>,
                )
                .await;
            }));
        }
        for t in tasks {
            t.await.unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn timelimit_returns_err_without_callback() {
        let tl = TimeLimit::new(Duration::from_millis(5));
        let result: Result<(), TimedOut> = tl
            .call(
                async {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                },
                None::<fn() -> std::future::Ready<()>>,
            )
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn timelimit_runs_callback_on_timeout() {
        let tl = TimeLimit::new(Duration::from_millis(5));
        let result = tl
            .call(
                async {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    "slow"
                },
                Some(|| async { "fallback" }),
            )
            .await
            .unwrap();
        assert_eq!(result, "fallback");
    }

    #[test]
    fn cooldown_rejects_nonpositive_interval() {
        assert!(Cooldown::new(Duration::ZERO).is_err());
    }

    #[tokio::test]
    async fn cooldown_runs_then_falls_back_during_interval() {
        let cd = Cooldown::new(Duration::from_secs(60)).unwrap();
        let r1 = cd
            .call(
                || async { 1 },
                None::<fn() -> std::future::Ready<i32>>,
                Some(|_remaining: Duration| async { -1 }),
            )
            .await;
        let r2 = cd
            .call(
                || async { 1 },
                None::<fn() -> std::future::Ready<i32>>,
                Some(|_remaining: Duration| async { -1 }),
            )
            .await;
        assert_eq!((r1, r2), (1, -1));
    }

    #[test]
    fn speedlimit_rejects_nonpositive_params() {
        assert!(SpeedLimit::new(0, Duration::from_secs(1)).is_err());
        assert!(SpeedLimit::new(1, Duration::from_secs(0)).is_err());
    }

    #[tokio::test]
    async fn speedlimit_allows_up_to_limit_then_calls_fallback() {
        let limiter = SpeedLimit::new(2, Duration::from_secs(60)).unwrap();
        let r1 = limiter.call(|| async { 1 }, Some(|| async { -1 })).await;
        let r2 = limiter.call(|| async { 1 }, Some(|| async { -1 })).await;
        let r3 = limiter.call(|| async { 1 }, Some(|| async { -1 })).await;
        assert_eq!((r1, r2, r3), (1, 1, -1));
    }
}
