//! RW context: async-safe read/write guard. Multiple readers may hold the
//! context concurrently; a writer excludes both readers and other writers.
//!
//! Ported from melobot's `RWContext`. The reader-count bookkeeping (take
//! the write semaphore on the 0->1 reader transition, release it on the
//! 1->0 transition) is what lets readers run concurrently with each other
//! while still excluding writers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore, SemaphorePermit};

pub struct RwContext {
    write_semaphore: Arc<Semaphore>,
    read_semaphore: Option<Arc<Semaphore>>,
    read_num: AtomicUsize,
    // Serializes the "check read_num, maybe acquire write_semaphore" step
    // on entry so two readers racing the 0->1 transition can't both skip
    // taking the write permit.
    entry_lock: Mutex<()>,
    // Owned by whichever reader triggered the 0->1 transition, released by
    // whichever reader triggers the 1->0 transition — not necessarily the
    // same guard. Lives here rather than on a `ReadGuard` since a guard has
    // no way of knowing at drop time whether it was the one that acquired
    // it. A blocking mutex because `Drop` is synchronous.
    held_write_permit: std::sync::Mutex<Option<OwnedSemaphorePermit>>,
}

impl RwContext {
    /// `read_limit` caps the number of concurrent readers; `None` means
    /// unlimited.
    pub fn new(read_limit: Option<usize>) -> Self {
        RwContext {
            write_semaphore: Arc::new(Semaphore::new(1)),
            read_semaphore: read_limit.map(|n| Arc::new(Semaphore::new(n))),
            read_num: AtomicUsize::new(0),
            entry_lock: Mutex::new(()),
            held_write_permit: std::sync::Mutex::new(None),
        }
    }

    pub async fn read(&self) -> ReadGuard<'_> {
        let read_permit = match &self.read_semaphore {
            Some(sem) => Some(sem.clone().acquire_owned().await.expect("semaphore not closed")),
            None => None,
        };

        {
            let _guard = self.entry_lock.lock().await;
            let prev = self.read_num.fetch_add(1, Ordering::SeqCst);
            if prev == 0 {
                let permit = self
                    .write_semaphore
                    .clone()
                    .acquire_owned()
                    .await
                    .expect("semaphore not closed");
                *self.held_write_permit.lock().unwrap() = Some(permit);
            }
        }

        ReadGuard { ctx: self, _read_permit: read_permit }
    }

    pub async fn write(&self) -> WriteGuard<'_> {
        let permit = self.write_semaphore.acquire().await.expect("semaphore not closed");
        WriteGuard { _permit: permit }
    }
}

impl Default for RwContext {
    fn default() -> Self {
        Self::new(None)
    }
}

pub struct ReadGuard<'a> {
    ctx: &'a RwContext,
    _read_permit: Option<OwnedSemaphorePermit>,
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        // `fetch_sub` is the atomic RMW that decides who was last out;
        // exactly one dropping reader will observe `prev == 1` and release
        // the permit held in `ctx`, regardless of which reader originally
        // acquired it.
        let prev = self.ctx.read_num.fetch_sub(1, Ordering::SeqCst);
        if prev == 1 {
            self.ctx.held_write_permit.lock().unwrap().take();
        }
    }
}

pub struct WriteGuard<'a> {
    _permit: SemaphorePermit<'a>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Mutex as AsyncMutex;

    #[tokio::test]
    async fn readers_run_concurrently() {
        let ctx = Arc::new(RwContext::default());
        let g1 = ctx.read().await;
        let g2 = ctx.read().await;
        drop(g1);
        drop(g2);
    }

    /// The first reader in (who acquires the write permit) drops before
    /// the second reader it overlapped with. A writer must still be
    /// excluded until that second reader drops too -- proves the permit
    /// lives in shared state, not tied to whichever guard happened to
    /// acquire it.
    #[tokio::test]
    async fn writer_excluded_until_last_of_staggered_readers_drops() {
        let ctx = Arc::new(RwContext::default());
        let order = Arc::new(AsyncMutex::new(Vec::new()));

        let g1 = ctx.read().await;
        let g2 = ctx.read().await;
        drop(g1);

        let ctx2 = ctx.clone();
        let order2 = order.clone();
        let task = tokio::spawn(async move {
            let _g = ctx2.write().await;
            order2.lock().await.push(2);
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(order.lock().await.is_empty(), "writer ran while a reader was still active");
        order.lock().await.push(1);
        drop(g2);
        task.await.unwrap();
        assert_eq!(*order.lock().await, vec![1, 2]);
    }

    #[tokio::test]
    async fn writer_excludes_writer() {
        let ctx = Arc::new(RwContext::default());
        let order = Arc::new(AsyncMutex::new(Vec::new()));

        let ctx2 = ctx.clone();
        let order2 = order.clone();
        let g = ctx.write().await;
        let task = tokio::spawn(async move {
            let _g = ctx2.write().await;
            order2.lock().await.push(2);
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        order.lock().await.push(1);
        drop(g);
        task.await.unwrap();
        assert_eq!(*order.lock().await, vec![1, 2]);
    }

    #[tokio::test]
    async fn writer_excludes_reader() {
        let ctx = Arc::new(RwContext::default());
        let order = Arc::new(AsyncMutex::new(Vec::new()));

        let g = ctx.write().await;
        let ctx2 = ctx.clone();
        let order2 = order.clone();
        let task = tokio::spawn(async move {
            let _g = ctx2.read().await;
            order2.lock().await.push(2);
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        order.lock().await.push(1);
        drop(g);
        task.await.unwrap();
        assert_eq!(*order.lock().await, vec![1, 2]);
    }

    #[tokio::test]
    async fn read_limit_caps_concurrency() {
        let ctx = Arc::new(RwContext::new(Some(1)));
        let g1 = ctx.read().await;
        let ctx2 = ctx.clone();
        let started = Arc::new(AsyncMutex::new(false));
        let started2 = started.clone();
        let task = tokio::spawn(async move {
            let _g = ctx2.read().await;
            *started2.lock().await = true;
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!*started.lock().await);
        drop(g1);
        task.await.unwrap();
        assert!(*started.lock().await);
    }
}
