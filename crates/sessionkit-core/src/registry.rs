//! Session registry: partitions sessions by rule identity and implements
//! the deadlock-avoidance `get()` protocol.
//!
//! Ported from melobot's `Session.get()` classmethod. The per-rule lock is
//! held across the *entire* scan-and-wait — including any `.await` on a
//! working session's `refresh_cond` — which is safe because a session's
//! own condition variables never contend with the registry's per-rule
//! lock: a handler calling `rest()`/`suspend()`/`expire()` on the session
//! it holds never needs to touch the registry lock to do so. A two-phase
//! scan (release the lock before waiting, re-acquire and re-scan after)
//! is an available alternative, not a requirement; this port keeps the
//! original's single-critical-section shape.

use std::collections::HashMap;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::Mutex as AsyncMutex;

use crate::rule::ErasedRule;
use crate::session::{Session, SessionState};

/// Callback invoked when a matching session is Working and the caller
/// asked not to wait for it.
pub type NowaitCallback = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

struct RuleKey<E>(Arc<dyn ErasedRule<E>>);

impl<E> Clone for RuleKey<E> {
    fn clone(&self) -> Self {
        RuleKey(self.0.clone())
    }
}

impl<E> PartialEq for RuleKey<E> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<E> Eq for RuleKey<E> {}

impl<E> Hash for RuleKey<E> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let ptr = Arc::as_ptr(&self.0) as *const ();
        ptr.hash(state);
    }
}

type Bucket<E> = Arc<AsyncMutex<Vec<Arc<Session<E>>>>>;

/// Registry of live sessions, partitioned by rule object identity.
pub struct SessionRegistry<E> {
    buckets: Mutex<HashMap<RuleKey<E>, Bucket<E>>>,
}

impl<E> Default for SessionRegistry<E> {
    fn default() -> Self {
        SessionRegistry { buckets: Mutex::new(HashMap::new()) }
    }
}

impl<E> SessionRegistry<E>
where
    E: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    fn bucket_for(&self, rule: &Arc<dyn ErasedRule<E>>) -> Bucket<E> {
        let mut buckets = self.buckets.lock().unwrap();
        buckets.entry(RuleKey(rule.clone())).or_insert_with(|| Arc::new(AsyncMutex::new(Vec::new()))).clone()
    }

    /// Find or create a session for `event`.
    ///
    /// * `rule` is `None` — return a fresh, unregistered one-shot session.
    /// * A Suspended session whose bound event matches — wake it and
    ///   return `None` (the caller that previously entered `suspend()`
    ///   resumes with the new event; this `get` call is done).
    /// * A Spare session whose bound event matches — claim it (`work`)
    ///   and return it.
    /// * A Working session whose bound event matches — if `wait` is
    ///   false, run `nowait_cb` and return `None`; otherwise wait for its
    ///   `refresh_cond` and re-inspect: Expired sessions are swept,
    ///   Suspended sessions are woken (return `None`), anything else
    ///   (typically Spare, from a `rest()`) is claimed and returned.
    /// * No match anywhere — create and register a new session.
    pub async fn get(
        &self,
        event: E,
        rule: Option<Arc<dyn ErasedRule<E>>>,
        wait: bool,
        nowait_cb: Option<NowaitCallback>,
        keep: bool,
    ) -> Option<Arc<Session<E>>> {
        let Some(rule) = rule else {
            return Some(Arc::new(Session::new(event, None, keep)));
        };

        let bucket = self.bucket_for(&rule);
        let mut sessions = bucket.lock().await;
        let mut nowait_cb = nowait_cb;

        let suspended: Vec<_> =
            sessions.iter().filter(|s| s.on_state(SessionState::Suspended)).cloned().collect();
        for session in suspended {
            if rule.compare_erased(&session.event(), &event).await {
                session.wakeup(event).await.expect("suspended session accepts wakeup");
                return None;
            }
        }

        let spares: Vec<_> =
            sessions.iter().filter(|s| s.on_state(SessionState::Spare)).cloned().collect();
        for session in spares {
            if rule.compare_erased(&session.event(), &event).await {
                session.work(event).await.expect("spare session accepts work");
                session.set_keep(keep);
                return Some(session);
            }
        }

        let workings: Vec<_> =
            sessions.iter().filter(|s| s.on_state(SessionState::Working)).cloned().collect();
        let mut expires: Vec<_> =
            sessions.iter().filter(|s| s.on_state(SessionState::Expired)).cloned().collect();

        for session in workings {
            if !rule.compare_erased(&session.event(), &event).await {
                continue;
            }

            if !wait {
                if let Some(cb) = nowait_cb.take() {
                    cb().await;
                }
                return None;
            }

            session.wait_for_refresh().await;

            if session.on_state(SessionState::Expired) {
                expires.push(session);
            } else if session.on_state(SessionState::Suspended) {
                session.wakeup(event).await.expect("suspended session accepts wakeup");
                return None;
            } else {
                session.work(event).await.expect("spare session accepts work");
                session.set_keep(keep);
                return Some(session);
            }
        }

        let expired_ptrs: Vec<_> = expires.iter().map(Arc::as_ptr).collect();
        sessions.retain(|s| !expired_ptrs.contains(&Arc::as_ptr(s)));

        let new_session = Arc::new(Session::new(event, Some(rule), keep));
        sessions.push(new_session.clone());
        Some(new_session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::Rule;
    use std::time::Duration;

    #[derive(Clone, PartialEq, Debug)]
    struct Ev {
        user: u32,
    }

    struct SameUser;
    impl Rule<Ev> for SameUser {
        async fn compare(&self, existing: &Ev, incoming: &Ev) -> bool {
            existing.user == incoming.user
        }
    }

    #[tokio::test]
    async fn first_get_creates_session() {
        let registry: SessionRegistry<Ev> = SessionRegistry::new();
        let rule: Arc<dyn ErasedRule<Ev>> = Arc::new(SameUser);
        let session = registry
            .get(Ev { user: 1 }, Some(rule), true, None, false)
            .await
            .expect("new session");
        assert!(session.on_state(SessionState::Working));
    }

    #[tokio::test]
    async fn rested_session_is_reclaimed_by_spare_scan() {
        let registry: SessionRegistry<Ev> = SessionRegistry::new();
        let rule: Arc<dyn ErasedRule<Ev>> = Arc::new(SameUser);
        let s1 = registry.get(Ev { user: 1 }, Some(rule.clone()), true, None, true).await.unwrap();
        s1.rest().await.unwrap();

        let s2 = registry.get(Ev { user: 1 }, Some(rule), true, None, true).await.unwrap();
        assert!(Arc::ptr_eq(&s1, &s2));
        assert!(s2.on_state(SessionState::Working));
    }

    #[tokio::test]
    async fn suspended_session_is_woken_and_get_returns_none() {
        let registry: Arc<SessionRegistry<Ev>> = Arc::new(SessionRegistry::new());
        let rule: Arc<dyn ErasedRule<Ev>> = Arc::new(SameUser);
        let s1 =
            registry.get(Ev { user: 7 }, Some(rule.clone()), true, None, true).await.unwrap();

        let s1_clone = s1.clone();
        let suspend_task = tokio::spawn(async move { s1_clone.suspend(None).await });
        tokio::task::yield_now().await;

        let got = registry.get(Ev { user: 7 }, Some(rule), true, None, true).await;
        assert!(got.is_none());
        assert!(suspend_task.await.unwrap().unwrap());
        assert!(s1.on_state(SessionState::Working));
    }

    #[tokio::test]
    async fn nonmatching_rule_partitions_are_independent() {
        let registry: SessionRegistry<Ev> = SessionRegistry::new();
        let rule_a: Arc<dyn ErasedRule<Ev>> = Arc::new(SameUser);
        let rule_b: Arc<dyn ErasedRule<Ev>> = Arc::new(SameUser);
        let s1 = registry.get(Ev { user: 1 }, Some(rule_a), true, None, false).await.unwrap();
        let s2 = registry.get(Ev { user: 1 }, Some(rule_b), true, None, false).await.unwrap();
        assert!(!Arc::ptr_eq(&s1, &s2));
    }

    #[tokio::test]
    async fn no_wait_runs_callback_when_working_and_matched() {
        let registry: SessionRegistry<Ev> = SessionRegistry::new();
        let rule: Arc<dyn ErasedRule<Ev>> = Arc::new(SameUser);
        let _s1 = registry.get(Ev { user: 3 }, Some(rule.clone()), true, None, true).await.unwrap();

        let called = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let called2 = called.clone();
        let cb: NowaitCallback = Box::new(move || {
            Box::pin(async move {
                called2.store(true, std::sync::atomic::Ordering::SeqCst);
            })
        });

        let got = registry.get(Ev { user: 3 }, Some(rule), false, Some(cb), true).await;
        assert!(got.is_none());
        assert!(called.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn expired_session_is_swept_and_replaced() {
        let registry: SessionRegistry<Ev> = SessionRegistry::new();
        let rule: Arc<dyn ErasedRule<Ev>> = Arc::new(SameUser);
        let s1 = registry.get(Ev { user: 9 }, Some(rule.clone()), true, None, false).await.unwrap();

        let s1_clone = s1.clone();
        let registry = Arc::new(registry);
        let registry2 = registry.clone();
        let waiter = tokio::spawn(async move {
            registry2.get(Ev { user: 9 }, Some(rule), true, None, false).await
        });
        tokio::task::yield_now().await;
        s1_clone.expire().await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let s2 = waiter.await.unwrap().expect("new session created after sweep");
        assert!(!Arc::ptr_eq(&s1, &s2));
        assert!(s2.on_state(SessionState::Working));
    }
}
