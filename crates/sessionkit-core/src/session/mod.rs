mod state;
mod store;

pub use state::Kind as SessionState;
pub use store::Store;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;

use crate::error::SessionError;
use crate::rule::ErasedRule;

/// A single tracked conversation. Generic over the embedding application's
/// event type `E`.
///
/// Ported from melobot's `Session`/`SessionState` hierarchy. The Python
/// original dispatches through a `SessionState` subclass per state; this
/// port collapses that into one struct guarded by a plain state enum,
/// since Rust's pattern matching makes per-state dispatch tables
/// unnecessary ceremony for five methods and four states.
pub struct Session<E> {
    store: Store,
    event: Mutex<E>,
    rule: Option<Arc<dyn ErasedRule<E>>>,
    refresh_cond: Notify,
    wakeup_cond: Notify,
    keep: AtomicBool,
    state: Mutex<SessionState>,
}

impl<E> Session<E> {
    /// A new session starts in the Working state, already bound to the
    /// event that created it — matching `Session.__init__`, which sets
    /// `_state = WorkingSessionState(self)` unconditionally.
    pub fn new(event: E, rule: Option<Arc<dyn ErasedRule<E>>>, keep: bool) -> Self {
        Session {
            store: Store::new(),
            event: Mutex::new(event),
            rule,
            refresh_cond: Notify::new(),
            wakeup_cond: Notify::new(),
            keep: AtomicBool::new(keep),
            state: Mutex::new(SessionState::Working),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn rule(&self) -> Option<&Arc<dyn ErasedRule<E>>> {
        self.rule.as_ref()
    }

    pub fn keep(&self) -> bool {
        self.keep.load(Ordering::SeqCst)
    }

    pub fn set_keep(&self, keep: bool) {
        self.keep.store(keep, Ordering::SeqCst);
    }

    pub fn on_state(&self, kind: SessionState) -> bool {
        *self.state.lock().unwrap() == kind
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap()
    }

    /// Used only by the registry's wait-and-reinspect loop, which needs to
    /// wait on `refresh_cond` without going through a state-checked method.
    pub(crate) fn wait_for_refresh(&self) -> impl std::future::Future<Output = ()> + '_ {
        self.refresh_cond.notified()
    }

    fn to_state(&self, kind: SessionState) {
        *self.state.lock().unwrap() = kind;
    }

    fn set_event(&self, event: E) {
        *self.event.lock().unwrap() = event;
    }
}

impl<E: Clone> Session<E> {
    pub fn event(&self) -> E {
        self.event.lock().unwrap().clone()
    }
}

impl<E> Session<E> {
    /// Spare -> Working. Registry-internal: not part of the handler-facing
    /// surface (the registry's `get()` is the only caller), matching the
    /// original's `SessionState` transitions being reached only through
    /// `Session.get()`/`Session.ctx()`.
    pub(crate) async fn work(&self, event: E) -> Result<(), SessionError> {
        {
            let state = self.state.lock().unwrap();
            if *state != SessionState::Spare {
                return Err(SessionError::InvalidTransition { op: "work", state: state.name() });
            }
        }
        self.set_event(event);
        self.to_state(SessionState::Working);
        Ok(())
    }

    /// Working -> Spare. Notifies `refresh_cond` so anyone waiting on this
    /// session in the registry's working-scan re-checks it. Registry-internal
    /// (driven by [`crate::dispatch::dispatch_and_invoke`]'s post-handler
    /// cleanup); application code calls [`Session::suspend`] or simply
    /// returns from its handler instead.
    pub(crate) async fn rest(&self) -> Result<(), SessionError> {
        {
            let state = self.state.lock().unwrap();
            if *state != SessionState::Working {
                return Err(SessionError::InvalidTransition { op: "rest", state: state.name() });
            }
        }
        if self.rule.is_none() {
            return Err(SessionError::NoRule { op: "rest" });
        }
        self.refresh_cond.notify_one();
        self.to_state(SessionState::Spare);
        Ok(())
    }

    /// Working -> Suspended, then waits on `wakeup_cond` (optionally bounded
    /// by `timeout`). Returns `Ok(true)` if woken, `Ok(false)` on timeout —
    /// in which case the session remains Suspended (it is not reaped), so a
    /// later matching event can still wake it. This mirrors the original's
    /// documented behavior and is the resolved answer to the "what happens
    /// to a session that times out while suspended" open question.
    pub async fn suspend(&self, timeout: Option<Duration>) -> Result<bool, SessionError> {
        {
            let state = self.state.lock().unwrap();
            if *state != SessionState::Working {
                return Err(SessionError::InvalidTransition {
                    op: "suspend",
                    state: state.name(),
                });
            }
        }
        if self.rule.is_none() {
            return Err(SessionError::NoRule { op: "suspend" });
        }
        self.refresh_cond.notify_one();
        self.to_state(SessionState::Suspended);

        let notified = self.wakeup_cond.notified();
        match timeout {
            None => {
                notified.await;
                Ok(true)
            }
            Some(dur) => match tokio::time::timeout(dur, notified).await {
                Ok(()) => Ok(true),
                Err(_) => Ok(false),
            },
        }
    }

    /// Suspended -> Working. Registry-internal: only `SessionRegistry::get`
    /// calls this, when it finds a Suspended session matching an incoming
    /// event — exactly the case `Session.get()`'s `SuspendSessionState`
    /// branch handles in the original.
    pub(crate) async fn wakeup(&self, event: E) -> Result<(), SessionError> {
        {
            let state = self.state.lock().unwrap();
            if *state != SessionState::Suspended {
                return Err(SessionError::InvalidTransition {
                    op: "wakeup",
                    state: state.name(),
                });
            }
        }
        self.set_event(event);
        self.wakeup_cond.notify_one();
        self.to_state(SessionState::Working);
        Ok(())
    }

    /// Working -> Expired. Notifies `refresh_cond` only if this session is
    /// registered under a rule (an unregistered one-shot session has no
    /// scanner waiting on it). Registry-internal, driven by
    /// [`crate::dispatch::dispatch_and_invoke`]'s post-handler cleanup.
    pub(crate) async fn expire(&self) -> Result<(), SessionError> {
        {
            let state = self.state.lock().unwrap();
            if *state != SessionState::Working {
                return Err(SessionError::InvalidTransition {
                    op: "expire",
                    state: state.name(),
                });
            }
        }
        if self.rule.is_some() {
            self.refresh_cond.notify_one();
        }
        self.to_state(SessionState::Expired);
        Ok(())
    }

    /// Forces a transition straight to Expired from any state but Expired
    /// itself, clearing the store on the way out. Unlike `expire()`, this
    /// is part of the handler-facing surface — a handler can reach for
    /// `destroy()` to unconditionally tear a session down (e.g. on a "stop
    /// talking to me" command) rather than waiting for the normal
    /// keep/expire decision at the end of dispatch.
    ///
    /// The original additionally fails when called on a one-shot session
    /// that never received an event; every `Session<E>` here always holds
    /// one (set at construction), so that failure mode doesn't arise and
    /// `destroy()` only rejects an already-Expired session.
    pub async fn destroy(&self) -> Result<(), SessionError> {
        {
            let state = self.state.lock().unwrap();
            if *state == SessionState::Expired {
                return Err(SessionError::InvalidTransition { op: "destroy", state: state.name() });
            }
        }
        self.store.clear();
        if self.rule.is_some() {
            self.refresh_cond.notify_one();
        }
        self.to_state(SessionState::Expired);
        Ok(())
    }
}

/// Free-function form of [`Session::suspend`], delegating to whichever
/// session is bound in the current task's context — the shape handlers
/// actually call, matching melobot's module-level `async def suspend(...)`
/// which does `return await SessionCtx().get().suspend(timeout)`.
pub async fn suspend<E>(timeout: Option<Duration>) -> Result<bool, SessionError>
where
    E: Send + Sync + 'static,
{
    crate::context::session_ctx::current::<Session<E>>().suspend(timeout).await
}
