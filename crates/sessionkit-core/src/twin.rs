//! Twin signal: a pair of boolean events that are always each other's
//! negation. Setting one clears the other and vice versa.
//!
//! Ported from melobot's `AsyncTwinEvent` / `get_twin_event`. The Python
//! original subclasses `asyncio.Event` and reaches into the twin's base
//! `set`/`clear` to flip it without recursing. The Rust port has no
//! inheritance to exploit, so both halves share one `AtomicBool` plus a
//! `Notify` per half for waiters.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

struct Inner {
    // true means the "first" half (the half returned first by `pair()`) is set.
    first_set: AtomicBool,
    first_notify: Notify,
    second_notify: Notify,
}

/// One half of a twin signal pair. Cloning shares the underlying state.
#[derive(Clone)]
pub struct TwinSignal {
    inner: Arc<Inner>,
    is_first: bool,
}

impl TwinSignal {
    /// Construct a bound pair. The first half starts cleared, the second
    /// starts set, matching `get_twin_event`'s documented contract.
    pub fn pair() -> (TwinSignal, TwinSignal) {
        let inner = Arc::new(Inner {
            first_set: AtomicBool::new(false),
            first_notify: Notify::new(),
            second_notify: Notify::new(),
        });
        (
            TwinSignal { inner: inner.clone(), is_first: true },
            TwinSignal { inner, is_first: false },
        )
    }

    pub fn is_set(&self) -> bool {
        let first = self.inner.first_set.load(Ordering::SeqCst);
        if self.is_first { first } else { !first }
    }

    /// Set this half, clearing the twin.
    pub fn set(&self) {
        self.inner.first_set.store(self.is_first, Ordering::SeqCst);
        self.own_notify().notify_waiters();
        self.twin_notify().notify_waiters();
    }

    /// Clear this half, setting the twin.
    pub fn clear(&self) {
        self.inner.first_set.store(!self.is_first, Ordering::SeqCst);
        self.own_notify().notify_waiters();
        self.twin_notify().notify_waiters();
    }

    /// Wait until this half becomes set.
    pub async fn wait(&self) {
        loop {
            if self.is_set() {
                return;
            }
            let notified = self.own_notify().notified();
            if self.is_set() {
                return;
            }
            notified.await;
        }
    }

    fn own_notify(&self) -> &Notify {
        if self.is_first { &self.inner.first_notify } else { &self.inner.second_notify }
    }

    fn twin_notify(&self) -> &Notify {
        if self.is_first { &self.inner.second_notify } else { &self.inner.first_notify }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_inverted() {
        let (a, b) = TwinSignal::pair();
        assert!(!a.is_set());
        assert!(b.is_set());
    }

    #[test]
    fn set_flips_twin() {
        let (a, b) = TwinSignal::pair();
        a.set();
        assert!(a.is_set());
        assert!(!b.is_set());
        b.set();
        assert!(!a.is_set());
        assert!(b.is_set());
    }

    #[test]
    fn clear_flips_twin() {
        let (a, b) = TwinSignal::pair();
        a.clear();
        assert!(!a.is_set());
        assert!(b.is_set());
    }

    #[tokio::test]
    async fn wait_resolves_once_set() {
        let (a, b) = TwinSignal::pair();
        let waiter = tokio::spawn(async move {
            a.wait().await;
        });
        tokio::task::yield_now().await;
        b.clear();
        waiter.await.unwrap();
    }
}
