//! Task-local context stack.
//!
//! While a handler runs inside [`crate::session::Session::ctx`][ctx]-style
//! scoping, it needs ambient access to "the current session", "the
//! current bot", "the current logger", etc. without threading them
//! through every call. melobot's `_ctx.py` keeps a `ContextVar` per
//! concern and a small stack discipline (`on_ctx` pushes, the `with`
//! block pops on exit, including on exception). Rust's `tokio::task_local!`
//! plus `LocalKey::scope` gives the same guarantee — the value is popped
//! whether the scoped future returns, panics, or is dropped (cancelled) —
//! without a `ContextVar`-style global registry.
//!
//! Values are stored as `Arc<dyn Any + Send + Sync>` so this crate stays
//! generic over the embedding application's concrete types; the typed
//! `current()`/`try_current()` accessors perform the downcast.

use std::any::Any;
use std::sync::Arc;

use tokio::task_local;

task_local! {
    static SESSION_CTX: Arc<dyn Any + Send + Sync>;
    static EVENT_BUILD_CTX: Arc<dyn Any + Send + Sync>;
    static BOT_CTX: Arc<dyn Any + Send + Sync>;
    static LOGGER_CTX: Arc<dyn Any + Send + Sync>;
}

macro_rules! context_slot {
    ($mod_name:ident, $key:ident, $doc:literal) => {
        #[doc = $doc]
        pub mod $mod_name {
            use super::*;
            use std::future::Future;

            /// Run `fut` with `value` bound as the current context value.
            pub async fn scope<T, F, R>(value: Arc<T>, fut: F) -> R
            where
                T: Send + Sync + 'static,
                F: Future<Output = R>,
            {
                let erased: Arc<dyn Any + Send + Sync> = value;
                $key.scope(erased, fut).await
            }

            /// The current context value, downcast to `T`. Panics if no
            /// value is bound, or if a value is bound at a different type —
            /// both are programmer errors (a handler declared a dependency
            /// on a context that was never entered, or entered at the
            /// wrong type).
            pub fn current<T: Send + Sync + 'static>() -> Arc<T> {
                try_current().unwrap_or_else(|| {
                    panic!(
                        "{} accessed outside of its scope, or bound at an incompatible type",
                        stringify!($mod_name)
                    )
                })
            }

            /// Like [`current`], but returns `None` instead of panicking.
            pub fn try_current<T: Send + Sync + 'static>() -> Option<Arc<T>> {
                $key.try_with(|v| v.clone().downcast::<T>().ok()).ok().flatten()
            }

            pub fn is_bound() -> bool {
                $key.try_with(|_| ()).is_ok()
            }
        }
    };
}

context_slot!(session_ctx, SESSION_CTX, "The currently dispatched session.");
context_slot!(event_build_ctx, EVENT_BUILD_CTX, "The adapter that built the current event.");
context_slot!(bot_ctx, BOT_CTX, "The running bot instance.");
context_slot!(logger_ctx, LOGGER_CTX, "The logger bound for the current dispatch.");

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scope_is_visible_inside_and_absent_outside() {
        assert!(!session_ctx::is_bound());
        session_ctx::scope(Arc::new(42u32), async {
            assert!(session_ctx::is_bound());
            assert_eq!(*session_ctx::current::<u32>(), 42);
        })
        .await;
        assert!(!session_ctx::is_bound());
    }

    #[tokio::test]
    async fn wrong_type_downcast_returns_none() {
        session_ctx::scope(Arc::new(42u32), async {
            assert!(session_ctx::try_current::<String>().is_none());
        })
        .await;
    }

    #[tokio::test]
    async fn scope_does_not_leak_across_sibling_tasks() {
        // task_local state lives on the task that entered the scope; a
        // sibling task spawned from inside never sees it unless it's
        // explicitly re-entered.
        session_ctx::scope(Arc::new(1u32), async {
            let spawned = tokio::spawn(async { session_ctx::is_bound() });
            assert!(!spawned.await.unwrap());
        })
        .await;
    }
}
