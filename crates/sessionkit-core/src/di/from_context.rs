use std::future::Future;

use crate::di::error::DiError;

/// A value that can be resolved from the ambient [`crate::context`] stack.
///
/// The statically-typed analogue of melobot's `AutoDepends`: instead of
/// inspecting a parameter's annotation at call time, each extractor type
/// (see [`crate::di::extract`]) implements this trait exactly once for
/// the one context source it reads from.
pub trait FromContext: Sized {
    fn from_context() -> impl Future<Output = Result<Self, DiError>> + Send;
}
