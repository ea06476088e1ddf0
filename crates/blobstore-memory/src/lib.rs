//! An in-process blob store, for tests and local development.
//!
//! Containers and blobs live in a map shared by every handle the backend
//! hands out. Deleted blobs are kept (soft-deleted) until restored or
//! overwritten, snapshots are kept alongside their base blob, and copies
//! between containers of the same backend complete immediately.

mod store;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard, PoisonError,
};

use blobi_blobstore::{Container, ContainerTarget, MakeBlobStore, StorageBackend, StorageConfig};

use store::{MemoryContainer, State};

/// A blob store that keeps everything in memory.
#[derive(Default)]
pub struct MemoryBlobStore {
    _priv: (),
}

impl MemoryBlobStore {
    /// Creates a new `MemoryBlobStore`.
    pub fn new() -> Self {
        Self::default()
    }
}

impl MakeBlobStore for MemoryBlobStore {
    const RUNTIME_CONFIG_TYPE: &'static str = "memory";

    type Backend = MemoryBackend;

    fn make_store(&self, _config: &StorageConfig) -> anyhow::Result<Self::Backend> {
        Ok(MemoryBackend::new())
    }
}

/// The in-memory backend. Clones share the same storage.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
    connections: Mutex<Vec<ContainerTarget>>,
    offline: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every target a handle was bound to, in order.
    pub fn connections(&self) -> Vec<ContainerTarget> {
        lock(&self.inner.connections).clone()
    }

    /// Number of create-if-not-exists checks issued so far.
    pub fn create_checks(&self) -> usize {
        lock(&self.inner.state).create_checks
    }

    /// Names of the containers that currently exist, sorted.
    pub fn container_names(&self) -> Vec<String> {
        lock(&self.inner.state).containers.keys().cloned().collect()
    }

    /// While offline every remote call fails as if the service could not be reached.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }
}

impl StorageBackend for MemoryBackend {
    fn connect(&self, target: &ContainerTarget) -> anyhow::Result<Arc<dyn Container>> {
        lock(&self.inner.connections).push(target.clone());
        Ok(Arc::new(MemoryContainer::new(
            self.inner.clone(),
            target.container.clone(),
        )))
    }
}

impl Inner {
    /// Runs `f` against the shared state, unless the backend is offline.
    fn with_state<T>(&self, f: impl FnOnce(&mut State) -> anyhow::Result<T>) -> anyhow::Result<T> {
        if self.offline.load(Ordering::SeqCst) {
            anyhow::bail!("connection refused: blob service is unreachable");
        }
        f(&mut lock(&self.state))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
