//! Session partitioning rule.
//!
//! A `Rule` decides whether two events belong to the same conversation
//! (e.g. same user, same channel). The registry groups sessions by `Arc`
//! identity of the rule object, never by the rule's own `PartialEq` — two
//! distinct rule instances with identical predicates are still distinct
//! partitions, matching the Python original's dict-keyed-by-object
//! behavior.
//!
//! `Rule::compare` is written with RPITIT so implementors can be plain
//! `async fn`s. Trait objects need a concrete, object-safe future type,
//! so `ErasedRule` boxes the future and a blanket impl bridges every
//! `Rule` into it — the same pattern this workspace's plugin trait uses
//! to get `dyn`-compatible async trait methods.

use std::future::Future;
use std::pin::Pin;

/// A rule decides whether a new event continues the same session as a
/// previously observed one.
pub trait Rule<E>: Send + Sync {
    /// Returns true if `incoming` belongs to the same session as `existing`.
    fn compare(&self, existing: &E, incoming: &E) -> impl Future<Output = bool> + Send;
}

/// Object-safe counterpart of [`Rule`], used wherever rules are stored as
/// `Arc<dyn ErasedRule<E>>`.
pub trait ErasedRule<E>: Send + Sync {
    fn compare_erased<'a>(
        &'a self,
        existing: &'a E,
        incoming: &'a E,
    ) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>>;
}

impl<E, T> ErasedRule<E> for T
where
    T: Rule<E>,
{
    fn compare_erased<'a>(
        &'a self,
        existing: &'a E,
        incoming: &'a E,
    ) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>> {
        Box::pin(Rule::compare(self, existing, incoming))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct SameId;

    impl Rule<u32> for SameId {
        async fn compare(&self, existing: &u32, incoming: &u32) -> bool {
            existing == incoming
        }
    }

    #[tokio::test]
    async fn erased_dispatch_matches_direct_call() {
        let rule: Arc<dyn ErasedRule<u32>> = Arc::new(SameId);
        assert!(rule.compare_erased(&1, &1).await);
        assert!(!rule.compare_erased(&1, &2).await);
    }

    #[test]
    fn identity_not_content_equality() {
        let a: Arc<dyn ErasedRule<u32>> = Arc::new(SameId);
        let b: Arc<dyn ErasedRule<u32>> = Arc::new(SameId);
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
