//! Blocking adapters over the asynchronous wrappers.
//!
//! Each adapter spawns the operation on a tokio runtime and parks the
//! calling thread on the join handle until the result arrives. The runtime
//! is either a dedicated one-worker runtime owned by the adapter or an
//! existing one reached through a [`Handle`].
//!
//! Adapters must be called from plain threads. Blocking a thread that is
//! itself driving the target runtime would stall that runtime.

use std::future::Future;
use std::sync::Arc;

use tokio::runtime::{Builder, Handle, Runtime};

use crate::error::{StorageError, StorageResult};
use crate::storage::{ReadOnlyStorage, Storage, WriteOnlyStorage};
use crate::traits::{StorageKey, StorageValue};

const SYNC_SUFFIX: &str = "-sync";

/// Dedicated runtime that shuts down without blocking when the last adapter
/// sharing it is dropped, even from inside an async context.
struct OwnedRuntime(Option<Runtime>);

impl Drop for OwnedRuntime {
    fn drop(&mut self) {
        if let Some(runtime) = self.0.take() {
            runtime.shutdown_background();
        }
    }
}

#[derive(Clone)]
enum Executor {
    Owned {
        handle: Handle,
        _runtime: Arc<OwnedRuntime>,
    },
    Shared(Handle),
}

impl Executor {
    fn dedicated() -> StorageResult<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("shoal-sync")
            .enable_all()
            .build()?;
        Ok(Self::Owned {
            handle: runtime.handle().clone(),
            _runtime: Arc::new(OwnedRuntime(Some(runtime))),
        })
    }

    fn handle(&self) -> &Handle {
        match self {
            Self::Owned { handle, .. } | Self::Shared(handle) => handle,
        }
    }

    fn run<T, F>(&self, operation: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: Future<Output = StorageResult<T>> + Send + 'static,
    {
        let joined = self.handle().spawn(operation);
        futures_executor::block_on(joined).map_err(StorageError::backend)?
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Owned { .. } => f.write_str("Owned"),
            Self::Shared(_) => f.write_str("Shared"),
        }
    }
}

/// Blocking read-only storage.
#[derive(Debug, Clone)]
pub struct ReadOnlySyncStorage<K, V> {
    name: String,
    storage: ReadOnlyStorage<K, V>,
    executor: Executor,
}

impl<K: StorageKey, V: StorageValue> ReadOnlySyncStorage<K, V> {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Retrieves the value for `key`, blocking until it arrives.
    ///
    /// # Errors
    ///
    /// Returns the error of the underlying storage, or a backend error when
    /// the spawned operation panicked or its runtime shut down.
    pub fn retrieve(&self, key: K) -> StorageResult<V> {
        self.executor.run(self.storage.retrieve(key))
    }
}

impl<V: StorageValue> ReadOnlySyncStorage<(), V> {
    /// Retrieves the value of a single-key storage.
    ///
    /// # Errors
    ///
    /// See [`retrieve`](Self::retrieve).
    pub fn retrieve_single(&self) -> StorageResult<V> {
        self.retrieve(())
    }
}

/// Blocking write-only storage.
#[derive(Debug, Clone)]
pub struct WriteOnlySyncStorage<K, V> {
    name: String,
    storage: WriteOnlyStorage<K, V>,
    executor: Executor,
}

impl<K: StorageKey, V: StorageValue> WriteOnlySyncStorage<K, V> {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stores `value` for `key`, blocking until the write completes.
    ///
    /// # Errors
    ///
    /// Returns the error of the underlying storage, or a backend error when
    /// the spawned operation panicked or its runtime shut down.
    pub fn set(&self, value: V, key: K) -> StorageResult<()> {
        self.executor.run(self.storage.set(value, key))
    }
}

impl<V: StorageValue> WriteOnlySyncStorage<(), V> {
    /// Stores the value of a single-key storage.
    ///
    /// # Errors
    ///
    /// See [`set`](Self::set).
    pub fn set_single(&self, value: V) -> StorageResult<()> {
        self.set(value, ())
    }
}

/// Blocking read-write storage.
#[derive(Debug, Clone)]
pub struct SyncStorage<K, V> {
    name: String,
    storage: Storage<K, V>,
    executor: Executor,
}

impl<K: StorageKey, V: StorageValue> SyncStorage<K, V> {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Retrieves the value for `key`, blocking until it arrives.
    ///
    /// # Errors
    ///
    /// Returns the error of the underlying storage, or a backend error when
    /// the spawned operation panicked or its runtime shut down.
    pub fn retrieve(&self, key: K) -> StorageResult<V> {
        self.executor.run(self.storage.retrieve(key))
    }

    /// Stores `value` for `key`, blocking until the write completes.
    ///
    /// # Errors
    ///
    /// Returns the error of the underlying storage, or a backend error when
    /// the spawned operation panicked or its runtime shut down.
    pub fn set(&self, value: V, key: K) -> StorageResult<()> {
        self.executor.run(self.storage.set(value, key))
    }

    /// The blocking read half, sharing this adapter's runtime.
    #[must_use]
    pub fn as_read_only(&self) -> ReadOnlySyncStorage<K, V> {
        ReadOnlySyncStorage {
            name: self.name.clone(),
            storage: self.storage.as_read_only(),
            executor: self.executor.clone(),
        }
    }

    /// The blocking write half, sharing this adapter's runtime.
    #[must_use]
    pub fn as_write_only(&self) -> WriteOnlySyncStorage<K, V> {
        WriteOnlySyncStorage {
            name: self.name.clone(),
            storage: self.storage.as_write_only(),
            executor: self.executor.clone(),
        }
    }
}

impl<V: StorageValue> SyncStorage<(), V> {
    /// Retrieves the value of a single-key storage.
    ///
    /// # Errors
    ///
    /// See [`retrieve`](Self::retrieve).
    pub fn retrieve_single(&self) -> StorageResult<V> {
        self.retrieve(())
    }

    /// Stores the value of a single-key storage.
    ///
    /// # Errors
    ///
    /// See [`set`](Self::set).
    pub fn set_single(&self, value: V) -> StorageResult<()> {
        self.set(value, ())
    }
}

fn sync_name(name: &str) -> String {
    format!("{name}{SYNC_SUFFIX}")
}

impl<K: StorageKey, V: StorageValue> ReadOnlyStorage<K, V> {
    /// Blocking adapter on a dedicated one-worker runtime.
    ///
    /// # Errors
    ///
    /// Fails with [`StorageError::Io`] when the runtime cannot be started.
    pub fn make_sync_storage(self) -> StorageResult<ReadOnlySyncStorage<K, V>> {
        Ok(self.sync_on(Executor::dedicated()?))
    }

    /// Blocking adapter spawning onto the runtime behind `handle`.
    #[must_use]
    pub fn make_sync_storage_on(self, handle: Handle) -> ReadOnlySyncStorage<K, V> {
        self.sync_on(Executor::Shared(handle))
    }

    fn sync_on(self, executor: Executor) -> ReadOnlySyncStorage<K, V> {
        ReadOnlySyncStorage {
            name: sync_name(self.name()),
            storage: self,
            executor,
        }
    }
}

impl<K: StorageKey, V: StorageValue> WriteOnlyStorage<K, V> {
    /// Blocking adapter on a dedicated one-worker runtime.
    ///
    /// # Errors
    ///
    /// Fails with [`StorageError::Io`] when the runtime cannot be started.
    pub fn make_sync_storage(self) -> StorageResult<WriteOnlySyncStorage<K, V>> {
        Ok(self.sync_on(Executor::dedicated()?))
    }

    /// Blocking adapter spawning onto the runtime behind `handle`.
    #[must_use]
    pub fn make_sync_storage_on(self, handle: Handle) -> WriteOnlySyncStorage<K, V> {
        self.sync_on(Executor::Shared(handle))
    }

    fn sync_on(self, executor: Executor) -> WriteOnlySyncStorage<K, V> {
        WriteOnlySyncStorage {
            name: sync_name(self.name()),
            storage: self,
            executor,
        }
    }
}

impl<K: StorageKey, V: StorageValue> Storage<K, V> {
    /// Blocking adapter on a dedicated one-worker runtime.
    ///
    /// # Errors
    ///
    /// Fails with [`StorageError::Io`] when the runtime cannot be started.
    pub fn make_sync_storage(self) -> StorageResult<SyncStorage<K, V>> {
        Ok(self.sync_on(Executor::dedicated()?))
    }

    /// Blocking adapter spawning onto the runtime behind `handle`.
    #[must_use]
    pub fn make_sync_storage_on(self, handle: Handle) -> SyncStorage<K, V> {
        self.sync_on(Executor::Shared(handle))
    }

    fn sync_on(self, executor: Executor) -> SyncStorage<K, V> {
        SyncStorage {
            name: sync_name(self.name()),
            storage: self,
            executor,
        }
    }
}
