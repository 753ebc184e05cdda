//! Explicit, possibly-cached, possibly-recursive dependency factories.
//!
//! Ported from melobot's `Depends` (`_di.py`): a dependency is a factory
//! function plus a `cache` flag. Caching is scoped to a single dispatch
//! (`DepScope`) — two handlers invoked for the same event share one scope,
//! so a cached `Depends` computes once per dispatch no matter how many
//! handlers request it. `fulfill` holds the scope's lock across the
//! factory call, exactly like the original, so two concurrent fulfillers
//! of the same cached dependency within one scope can't race to compute
//! it twice.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::di::error::DiError;

static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

type Factory<T> =
    Arc<dyn for<'a> Fn(&'a DepScope) -> Pin<Box<dyn Future<Output = Result<T, DiError>> + Send + 'a>> + Send + Sync>;

/// A per-dispatch cache, so `cache`d [`Depends`] only run their factory
/// once no matter how many handlers (or other `Depends`, recursively)
/// request them within the same dispatch.
#[derive(Default)]
pub struct DepScope {
    cache: Mutex<HashMap<usize, Arc<dyn Any + Send + Sync>>>,
}

impl DepScope {
    pub fn new() -> Self {
        Self::default()
    }
}

/// An explicit dependency factory, analogous to melobot's `Depends(dep,
/// cache=..., recursive=...)`. `recursive` in the original just meant "the
/// factory itself may call other `Depends`" — here that falls out of the
/// factory closure taking `&DepScope` and being free to call
/// `other.fulfill(scope)` itself, so there's no separate flag.
pub struct Depends<T> {
    factory: Factory<T>,
    cache: bool,
    id: usize,
}

impl<T: Send + Sync + 'static> Depends<T> {
    pub fn new<F, Fut>(dep: F, cache: bool) -> Self
    where
        F: for<'a> Fn(&'a DepScope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, DiError>> + Send + 'static,
    {
        Depends {
            factory: Arc::new(move |scope| Box::pin(dep(scope))),
            cache,
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// A non-recursive, non-caching constant dependency.
    pub fn value(value: T) -> Self
    where
        T: Clone,
    {
        Depends::new(move |_scope| {
            let value = value.clone();
            async move { Ok(value) }
        }, false)
    }

    pub async fn fulfill(&self, scope: &DepScope) -> Result<Arc<T>, DiError> {
        if !self.cache {
            return Ok(Arc::new((self.factory)(scope).await?));
        }

        let mut cache = scope.cache.lock().await;
        if let Some(existing) = cache.get(&self.id) {
            return existing
                .clone()
                .downcast::<T>()
                .map_err(|_| DiError::bind("cached dependency resolved at an inconsistent type"));
        }

        // NB: the factory runs while `cache` is held, matching the
        // original's lock-guarded memoization — this is what prevents two
        // concurrent fulfillers of the same `Depends` within one scope
        // from computing it twice.
        let value = Arc::new((self.factory)(scope).await?);
        cache.insert(self.id, value.clone());
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[tokio::test]
    async fn cached_dependency_runs_factory_once_per_scope() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let dep = Depends::new(
            move |_scope| {
                let calls = calls2.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(7i32)
                }
            },
            true,
        );

        let scope = DepScope::new();
        let a = dep.fulfill(&scope).await.unwrap();
        let b = dep.fulfill(&scope).await.unwrap();
        assert_eq!(*a, 7);
        assert_eq!(*b, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let scope2 = DepScope::new();
        dep.fulfill(&scope2).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn uncached_dependency_runs_every_time() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let dep = Depends::new(
            move |_scope| {
                let calls = calls2.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            },
            false,
        );
        let scope = DepScope::new();
        dep.fulfill(&scope).await.unwrap();
        dep.fulfill(&scope).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn recursive_dependency_shares_scope() {
        let base = Arc::new(Depends::new(move |_scope| async move { Ok(5i32) }, true));
        let base_for_derived = base.clone();
        let derived = Depends::new(
            move |scope| {
                let base = base_for_derived.clone();
                async move {
                    let v = base.fulfill(scope).await?;
                    Ok(*v * 2)
                }
            },
            false,
        );

        let scope = DepScope::new();
        assert_eq!(*derived.fulfill(&scope).await.unwrap(), 10);
    }
}
