use std::future::Future;
use std::pin::Pin;

use sessionkit_core::rw::RwContext;

use crate::error::IpcError;

pub trait Share {
    fn name(&self) -> &str;
    fn is_static(&self) -> bool;
}

type AsyncReflector<T> = Box<dyn Fn() -> Pin<Box<dyn Future<Output = T> + Send>> + Send + Sync>;
type AsyncSetter<T> = Box<dyn Fn(T) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// An async-guarded shared value, read/write-locked via [`RwContext`] so
/// concurrent readers don't block each other but a write excludes
/// everyone. Ported from melobot's `AsyncShare`.
pub struct AsyncShare<T> {
    name: String,
    static_: bool,
    rw: RwContext,
    reflector: Option<AsyncReflector<T>>,
    setter: Option<AsyncSetter<T>>,
}

impl<T> AsyncShare<T> {
    pub fn new(name: &str, static_: bool) -> Result<Self, IpcError> {
        if name.starts_with('_') {
            return Err(IpcError::NameForbidden { name: name.to_string() });
        }
        Ok(AsyncShare {
            name: name.to_string(),
            static_,
            rw: RwContext::default(),
            reflector: None,
            setter: None,
        })
    }

    pub fn bind_reflector<F, Fut>(&mut self, f: F) -> Result<(), IpcError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        if self.reflector.is_some() {
            return Err(IpcError::AlreadyBound { name: self.name.clone(), kind: "reflector" });
        }
        self.reflector = Some(Box::new(move || Box::pin(f())));
        Ok(())
    }

    pub fn bind_setter<F, Fut>(&mut self, f: F) -> Result<(), IpcError>
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.static_ {
            return Err(IpcError::StaticNoSetter { name: self.name.clone() });
        }
        if self.setter.is_some() {
            return Err(IpcError::AlreadyBound { name: self.name.clone(), kind: "setter" });
        }
        self.setter = Some(Box::new(move |v| Box::pin(f(v))));
        Ok(())
    }

    pub async fn get(&self) -> Result<T, IpcError> {
        let reflector = self
            .reflector
            .as_ref()
            .ok_or_else(|| IpcError::Unbound { name: self.name.clone(), kind: "reflector" })?;
        let _guard = self.rw.read().await;
        Ok(reflector().await)
    }

    pub async fn set(&self, value: T) -> Result<(), IpcError> {
        let setter = self
            .setter
            .as_ref()
            .ok_or_else(|| IpcError::Unbound { name: self.name.clone(), kind: "setter" })?;
        let _guard = self.rw.write().await;
        setter(value).await;
        Ok(())
    }
}

impl<T> Share for AsyncShare<T> {
    fn name(&self) -> &str {
        &self.name
    }
    fn is_static(&self) -> bool {
        self.static_
    }
}

type SyncReflector<T> = Box<dyn Fn() -> T + Send + Sync>;
type SyncSetter<T> = Box<dyn Fn(T) + Send + Sync>;

/// The synchronous counterpart of [`AsyncShare`], with no read/write
/// guarding — matching melobot's `SyncShare`, used for values whose
/// reflector/setter are plain, non-blocking functions.
pub struct SyncShare<T> {
    name: String,
    static_: bool,
    reflector: Option<SyncReflector<T>>,
    setter: Option<SyncSetter<T>>,
}

impl<T> SyncShare<T> {
    pub fn new(name: &str, static_: bool) -> Result<Self, IpcError> {
        if name.starts_with('_') {
            return Err(IpcError::NameForbidden { name: name.to_string() });
        }
        Ok(SyncShare { name: name.to_string(), static_, reflector: None, setter: None })
    }

    pub fn bind_reflector<F>(&mut self, f: F) -> Result<(), IpcError>
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        if self.reflector.is_some() {
            return Err(IpcError::AlreadyBound { name: self.name.clone(), kind: "reflector" });
        }
        self.reflector = Some(Box::new(f));
        Ok(())
    }

    pub fn bind_setter<F>(&mut self, f: F) -> Result<(), IpcError>
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        if self.static_ {
            return Err(IpcError::StaticNoSetter { name: self.name.clone() });
        }
        if self.setter.is_some() {
            return Err(IpcError::AlreadyBound { name: self.name.clone(), kind: "setter" });
        }
        self.setter = Some(Box::new(f));
        Ok(())
    }

    pub fn get(&self) -> Result<T, IpcError> {
        let reflector = self
            .reflector
            .as_ref()
            .ok_or_else(|| IpcError::Unbound { name: self.name.clone(), kind: "reflector" })?;
        Ok(reflector())
    }

    pub fn set(&self, value: T) -> Result<(), IpcError> {
        let setter = self
            .setter
            .as_ref()
            .ok_or_else(|| IpcError::Unbound { name: self.name.clone(), kind: "setter" })?;
        setter(value);
        Ok(())
    }
}

impl<T> Share for SyncShare<T> {
    fn name(&self) -> &str {
        &self.name
    }
    fn is_static(&self) -> bool {
        self.static_
    }
}
