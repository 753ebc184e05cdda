//! Glue between the registry, the context stack, and a handler.
//!
//! Ported from melobot's `Session.ctx()` async context manager: look up
//! (or create) a session, bind it into the ambient context for the
//! handler's duration, then on the way out either `rest()` (if the
//! handler asked to `keep` the session around) or `expire()` it.
//!
//! Rust's cancellation model differs from `asyncio`'s: a dropped future
//! simply stops polling, with no `CancelledError` a handler can observe
//! and react to the way `Session.ctx()` does (waking a Suspended session
//! back up before resting/expiring it). This helper only performs its
//! rest-or-expire cleanup on normal return; a caller that drops the
//! dispatch future early (e.g. a `tokio::select!` losing a race) is
//! responsible for reconciling the session's state itself, same as any
//! other async Rust code holding a resource across a cancellable await.

use std::future::Future;
use std::sync::Arc;

use crate::context::session_ctx;
use crate::registry::SessionRegistry;
use crate::rule::ErasedRule;
use crate::session::Session;

/// Resolve a session for `event` and run `handler` with it bound into the
/// session context, then rest-or-expire the session. Returns `None` if
/// the registry resolved the event without handing back a session to run
/// (e.g. it woke a Suspended session instead).
pub async fn dispatch_and_invoke<E, T, F, Fut>(
    registry: &SessionRegistry<E>,
    event: E,
    rule: Option<Arc<dyn ErasedRule<E>>>,
    wait: bool,
    keep: bool,
    handler: F,
) -> Option<T>
where
    E: Clone + Send + Sync + 'static,
    F: FnOnce(Arc<Session<E>>) -> Fut,
    Fut: Future<Output = T>,
{
    let session = registry.get(event, rule, wait, None, keep).await?;
    let result = session_ctx::scope(session.clone(), handler(session.clone())).await;

    if session.keep() {
        let _ = session.rest().await;
    } else {
        let _ = session.expire().await;
    }

    Some(result)
}
