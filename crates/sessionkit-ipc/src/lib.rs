//! Plugin share registry (IPC): named, optionally-guarded values one
//! plugin exposes for others to read (and, unless static, write).
//!
//! Ported from melobot's `plugin/ipc.py` (`AsyncShare`, `SyncShare`,
//! `IPCManager`).

mod error;
mod share;

pub use error::IpcError;
pub use share::{AsyncShare, Share, SyncShare};

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// `(owner plugin, share name) -> Share` lookup, matching melobot's
/// `IPCManager`. Shares are stored type-erased (`Arc<dyn Any>`) since
/// different plugins register shares over different `T`; callers know
/// which concrete `AsyncShare<T>`/`SyncShare<T>` they expect and use
/// [`IpcRegistry::get_async`]/[`IpcRegistry::get_sync`] to downcast.
#[derive(Default)]
pub struct IpcRegistry {
    shares: Mutex<HashMap<String, HashMap<String, Entry>>>,
}

struct Entry {
    value: Arc<dyn Any + Send + Sync>,
}

impl IpcRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&self, owner: &str, name: &str, value: Arc<dyn Any + Send + Sync>) -> Result<(), IpcError> {
        let mut shares = self.shares.lock().unwrap();
        let owned = shares.entry(owner.to_string()).or_default();
        if owned.contains_key(name) {
            return Err(IpcError::AlreadyRegistered {
                owner: owner.to_string(),
                name: name.to_string(),
            });
        }
        owned.insert(name.to_string(), Entry { value });
        Ok(())
    }

    pub fn add_async<T: Send + Sync + 'static>(
        &self,
        owner: &str,
        share: AsyncShare<T>,
    ) -> Result<(), IpcError> {
        let name = share.name().to_string();
        self.add(owner, &name, Arc::new(share))
    }

    pub fn add_sync<T: Send + Sync + 'static>(
        &self,
        owner: &str,
        share: SyncShare<T>,
    ) -> Result<(), IpcError> {
        let name = share.name().to_string();
        self.add(owner, &name, Arc::new(share))
    }

    fn lookup(&self, owner: &str, name: &str) -> Result<Arc<dyn Any + Send + Sync>, IpcError> {
        let shares = self.shares.lock().unwrap();
        let owned = shares
            .get(owner)
            .ok_or_else(|| IpcError::UnknownOwner { owner: owner.to_string() })?;
        let entry = owned
            .get(name)
            .ok_or_else(|| IpcError::UnknownShare { owner: owner.to_string(), name: name.to_string() })?;
        Ok(entry.value.clone())
    }

    pub fn get_async<T: Send + Sync + 'static>(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<Arc<AsyncShare<T>>, IpcError> {
        self.lookup(owner, name)?.downcast::<AsyncShare<T>>().map_err(|_| {
            IpcError::UnknownShare { owner: owner.to_string(), name: name.to_string() }
        })
    }

    pub fn get_sync<T: Send + Sync + 'static>(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<Arc<SyncShare<T>>, IpcError> {
        self.lookup(owner, name)?.downcast::<SyncShare<T>>().map_err(|_| {
            IpcError::UnknownShare { owner: owner.to_string(), name: name.to_string() }
        })
    }
}
