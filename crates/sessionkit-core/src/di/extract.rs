//! Typed extractors.
//!
//! melobot's `AutoDepends` inspects a parameter's type-hint at call time
//! and picks a matching context source (logger, session, bot, adapter,
//! event) by `is_subhint` comparison against a short fixed list. Rust has
//! no runtime type-hint inspection, and a single blanket `impl<T:
//! SomeMarker> FromContext for T` per context source would conflict for
//! any bare `T` shared between two marker traits — the compiler can't
//! prove the marker traits are mutually exclusive. Distinct wrapper
//! types sidestep that: each gets exactly one `FromContext` impl, the
//! same shape `axum`'s `FromRequestParts` extractors use.

use std::ops::Deref;
use std::sync::Arc;

use crate::context::{bot_ctx, event_build_ctx, logger_ctx, session_ctx};
use crate::di::error::DiError;
use crate::di::from_context::FromContext;
use crate::session::{Session, Store};

/// The event bound to the current session, cloned out.
pub struct Event<E>(pub E);

impl<E: Clone + Send + Sync + 'static> FromContext for Event<E> {
    async fn from_context() -> Result<Self, DiError> {
        let session = session_ctx::try_current::<Session<E>>()
            .ok_or_else(|| DiError::init("Event<E> requested outside of a session context"))?;
        Ok(Event(session.event()))
    }
}

/// The rule bound to the current session, if any.
pub struct Rule<E>(pub Option<Arc<dyn crate::rule::ErasedRule<E>>>);

impl<E: Send + Sync + 'static> FromContext for Rule<E> {
    async fn from_context() -> Result<Self, DiError> {
        let session = session_ctx::try_current::<Session<E>>()
            .ok_or_else(|| DiError::init("Rule<E> requested outside of a session context"))?;
        Ok(Rule(session.rule().cloned()))
    }
}

/// The current session's handler-local store.
pub struct SessionStore<E>(Arc<Session<E>>);

impl<E: Send + Sync + 'static> FromContext for SessionStore<E> {
    async fn from_context() -> Result<Self, DiError> {
        let session = session_ctx::try_current::<Session<E>>().ok_or_else(|| {
            DiError::init("SessionStore<E> requested outside of a session context")
        })?;
        Ok(SessionStore(session))
    }
}

impl<E> Deref for SessionStore<E> {
    type Target = Store;
    fn deref(&self) -> &Store {
        self.0.store()
    }
}

/// The running bot instance, as bound by the dispatcher.
pub struct Bot<B>(pub Arc<B>);

impl<B: Send + Sync + 'static> FromContext for Bot<B> {
    async fn from_context() -> Result<Self, DiError> {
        bot_ctx::try_current::<B>()
            .map(Bot)
            .ok_or_else(|| DiError::init("Bot<B> requested outside of a bound bot context"))
    }
}

/// The adapter that built the current event.
pub struct Adapter<A>(pub Arc<A>);

impl<A: Send + Sync + 'static> FromContext for Adapter<A> {
    async fn from_context() -> Result<Self, DiError> {
        event_build_ctx::try_current::<A>().map(Adapter).ok_or_else(|| {
            DiError::init("Adapter<A> requested outside of a bound event-build context")
        })
    }
}

/// The logger bound for the current dispatch.
pub struct Logger(pub Arc<tracing::Span>);

impl FromContext for Logger {
    async fn from_context() -> Result<Self, DiError> {
        logger_ctx::try_current::<tracing::Span>()
            .map(Logger)
            .ok_or_else(|| DiError::init("Logger requested outside of a bound logger context"))
    }
}
