//! Sub-event narrowing.
//!
//! melobot lets a handler declare a narrower event type than the one the
//! session carries (e.g. "I only handle text messages out of the general
//! message event") and raises a recoverable `DependNotMatched` when the
//! incoming event doesn't narrow that way, letting the dispatcher try the
//! next handler. That one piece of genuinely dynamic "does this value
//! satisfy the declared shape" check survives translation, because the
//! embedder's event type is realistically one sum type with several
//! variants and different handlers want different views of it.

use crate::di::error::DiError;

/// Attempt to narrow `E` into `Self`.
pub trait TryFromEvent<E>: Sized {
    const HINT: &'static str;

    fn try_from_event(event: &E) -> Result<Self, ()>;
}

/// Every event type trivially narrows to itself.
impl<E: Clone> TryFromEvent<E> for E {
    const HINT: &'static str = "Self";

    fn try_from_event(event: &E) -> Result<Self, ()> {
        Ok(event.clone())
    }
}

/// Resolve a narrowed view of `event`, producing the same diagnostic shape
/// as melobot's `DependNotMatched(func_name, arg_name, real_type, hint)`
/// on failure.
pub fn narrow<E, T>(
    event: &E,
    func_name: &str,
    arg_name: &str,
    real_type: &str,
) -> Result<T, DiError>
where
    T: TryFromEvent<E>,
{
    T::try_from_event(event)
        .map_err(|()| DiError::not_matched(func_name, arg_name, real_type, T::HINT))
}
