//! Canonical type-erased storage wrappers.
//!
//! [`ReadOnlyStorage`], [`WriteOnlyStorage`] and [`Storage`] hold a name and
//! `Arc`'d closures producing `'static` boxed futures. They are cheap to
//! clone and carry no mutable state of their own: any state lives inside the
//! wrapped backend. Every combinator consumes one of these wrappers and
//! returns a new one.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt};

use crate::error::{StorageError, StorageResult};
use crate::traits::{ReadWrite, Readable, StorageDesign, StorageKey, StorageValue, Writable};

type RetrieveFn<K, V> = Arc<dyn Fn(K) -> BoxFuture<'static, StorageResult<V>> + Send + Sync>;
type SetFn<K, V> = Arc<dyn Fn(V, K) -> BoxFuture<'static, StorageResult<()>> + Send + Sync>;

/// Returns `value` itself when it already is a `C`, otherwise `wrap(value)`.
pub(crate) fn normalize<T: 'static, C: 'static>(value: T, wrap: impl FnOnce(T) -> C) -> C {
    let mut slot = Some(value);
    if let Some(canonical) = (&mut slot as &mut dyn Any)
        .downcast_mut::<Option<C>>()
        .and_then(Option::take)
    {
        return canonical;
    }
    match slot {
        Some(value) => wrap(value),
        None => unreachable!("slot is only emptied when the value is already canonical"),
    }
}

// ---------------------------------------------------------------------------
// ReadOnlyStorage
// ---------------------------------------------------------------------------

/// Canonical read-only storage.
pub struct ReadOnlyStorage<K, V> {
    name: Arc<str>,
    retrieve_fn: RetrieveFn<K, V>,
}

impl<K, V> Clone for ReadOnlyStorage<K, V> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            retrieve_fn: Arc::clone(&self.retrieve_fn),
        }
    }
}

impl<K, V> fmt::Debug for ReadOnlyStorage<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadOnlyStorage")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<K: StorageKey, V: StorageValue> ReadOnlyStorage<K, V> {
    /// Builds a read-only storage from a retrieve closure.
    pub fn new<F, Fut>(name: impl Into<Arc<str>>, retrieve: F) -> Self
    where
        F: Fn(K) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StorageResult<V>> + Send + 'static,
    {
        Self {
            name: name.into(),
            retrieve_fn: Arc::new(move |key| retrieve(key).boxed()),
        }
    }

    /// Wraps any [`Readable`] implementation.
    ///
    /// Prefer [`Readable::into_read_only`], which skips the extra layer for
    /// values that already are canonical.
    pub fn from_readable<R: Readable<K, V> + 'static>(readable: R) -> Self {
        let name: Arc<str> = readable.storage_name().into();
        let readable = Arc::new(readable);
        Self::new(name, move |key| {
            let readable = Arc::clone(&readable);
            async move { readable.retrieve(key).await }
        })
    }

    /// A storage whose every retrieve fails with [`StorageError::Empty`].
    #[must_use]
    pub fn empty() -> Self {
        Self::new("empty", |_| async { Err(StorageError::Empty) })
    }

    /// Diagnostic name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Retrieves the value for `key`.
    pub fn retrieve(&self, key: K) -> BoxFuture<'static, StorageResult<V>> {
        (self.retrieve_fn)(key)
    }

    /// Same storage under a different name.
    #[must_use]
    pub fn renaming(self, name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            retrieve_fn: self.retrieve_fn,
        }
    }
}

impl<V: StorageValue> ReadOnlyStorage<(), V> {
    /// Retrieves the value of a single-key storage.
    pub fn retrieve_single(&self) -> BoxFuture<'static, StorageResult<V>> {
        self.retrieve(())
    }
}

impl<K, V> StorageDesign for ReadOnlyStorage<K, V> {
    fn storage_name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl<K: StorageKey, V: StorageValue> Readable<K, V> for ReadOnlyStorage<K, V> {
    async fn retrieve(&self, key: K) -> StorageResult<V> {
        (self.retrieve_fn)(key).await
    }
}

// ---------------------------------------------------------------------------
// WriteOnlyStorage
// ---------------------------------------------------------------------------

/// Canonical write-only storage.
pub struct WriteOnlyStorage<K, V> {
    name: Arc<str>,
    set_fn: SetFn<K, V>,
}

impl<K, V> Clone for WriteOnlyStorage<K, V> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            set_fn: Arc::clone(&self.set_fn),
        }
    }
}

impl<K, V> fmt::Debug for WriteOnlyStorage<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteOnlyStorage")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<K: StorageKey, V: StorageValue> WriteOnlyStorage<K, V> {
    /// Builds a write-only storage from a set closure.
    pub fn new<F, Fut>(name: impl Into<Arc<str>>, set: F) -> Self
    where
        F: Fn(V, K) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StorageResult<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            set_fn: Arc::new(move |value, key| set(value, key).boxed()),
        }
    }

    /// Wraps any [`Writable`] implementation.
    ///
    /// Prefer [`Writable::into_write_only`], which skips the extra layer for
    /// values that already are canonical.
    pub fn from_writable<W: Writable<K, V> + 'static>(writable: W) -> Self {
        let name: Arc<str> = writable.storage_name().into();
        let writable = Arc::new(writable);
        Self::new(name, move |value, key| {
            let writable = Arc::clone(&writable);
            async move { writable.set(value, key).await }
        })
    }

    /// A storage whose every set fails with [`StorageError::Empty`].
    #[must_use]
    pub fn empty() -> Self {
        Self::new("empty", |_, _| async { Err(StorageError::Empty) })
    }

    /// Diagnostic name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stores `value` for `key`.
    pub fn set(&self, value: V, key: K) -> BoxFuture<'static, StorageResult<()>> {
        (self.set_fn)(value, key)
    }

    /// Same storage under a different name.
    #[must_use]
    pub fn renaming(self, name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            set_fn: self.set_fn,
        }
    }
}

impl<V: StorageValue> WriteOnlyStorage<(), V> {
    /// Stores the value of a single-key storage.
    pub fn set_single(&self, value: V) -> BoxFuture<'static, StorageResult<()>> {
        self.set(value, ())
    }
}

impl<K, V> StorageDesign for WriteOnlyStorage<K, V> {
    fn storage_name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl<K: StorageKey, V: StorageValue> Writable<K, V> for WriteOnlyStorage<K, V> {
    async fn set(&self, value: V, key: K) -> StorageResult<()> {
        (self.set_fn)(value, key).await
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Canonical read-write storage: one read half and one write half over the
/// same key space.
pub struct Storage<K, V> {
    name: Arc<str>,
    read: ReadOnlyStorage<K, V>,
    write: WriteOnlyStorage<K, V>,
}

impl<K, V> Clone for Storage<K, V> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            read: self.read.clone(),
            write: self.write.clone(),
        }
    }
}

impl<K, V> fmt::Debug for Storage<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<K: StorageKey, V: StorageValue> Storage<K, V> {
    /// Builds a storage from a retrieve closure and a set closure.
    pub fn new<R, RFut, S, SFut>(name: impl Into<Arc<str>>, retrieve: R, set: S) -> Self
    where
        R: Fn(K) -> RFut + Send + Sync + 'static,
        RFut: Future<Output = StorageResult<V>> + Send + 'static,
        S: Fn(V, K) -> SFut + Send + Sync + 'static,
        SFut: Future<Output = StorageResult<()>> + Send + 'static,
    {
        let name: Arc<str> = name.into();
        Self {
            read: ReadOnlyStorage::new(Arc::clone(&name), retrieve),
            write: WriteOnlyStorage::new(Arc::clone(&name), set),
            name,
        }
    }

    /// Joins a read half and a write half under `name`.
    ///
    /// Both halves are renamed to `name`.
    pub fn from_parts(
        name: impl Into<Arc<str>>,
        read: ReadOnlyStorage<K, V>,
        write: WriteOnlyStorage<K, V>,
    ) -> Self {
        let name: Arc<str> = name.into();
        Self {
            read: read.renaming(Arc::clone(&name)),
            write: write.renaming(Arc::clone(&name)),
            name,
        }
    }

    /// Joins a read half and a write half, named after the read half.
    #[must_use]
    pub fn from_halves(read: ReadOnlyStorage<K, V>, write: WriteOnlyStorage<K, V>) -> Self {
        let name = Arc::clone(&read.name);
        Self::from_parts(name, read, write)
    }

    /// Wraps any read-write implementation.
    ///
    /// Prefer [`ReadWrite::into_storage`], which skips the extra layer for
    /// values that already are canonical.
    pub fn from_backend<S: ReadWrite<K, V> + 'static>(backend: S) -> Self {
        let name: Arc<str> = backend.storage_name().into();
        let backend = Arc::new(backend);
        Self {
            read: ReadOnlyStorage::from_readable(Arc::clone(&backend)),
            write: WriteOnlyStorage::from_writable(backend),
            name,
        }
    }

    /// A storage whose every call fails with [`StorageError::Empty`].
    #[must_use]
    pub fn empty() -> Self {
        Self::from_halves(ReadOnlyStorage::empty(), WriteOnlyStorage::empty())
    }

    /// Diagnostic name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Retrieves the value for `key`.
    pub fn retrieve(&self, key: K) -> BoxFuture<'static, StorageResult<V>> {
        self.read.retrieve(key)
    }

    /// Stores `value` for `key`.
    pub fn set(&self, value: V, key: K) -> BoxFuture<'static, StorageResult<()>> {
        self.write.set(value, key)
    }

    /// The read half.
    #[must_use]
    pub fn as_read_only(&self) -> ReadOnlyStorage<K, V> {
        self.read.clone()
    }

    /// The write half.
    #[must_use]
    pub fn as_write_only(&self) -> WriteOnlyStorage<K, V> {
        self.write.clone()
    }

    /// Splits into the read and write halves.
    #[must_use]
    pub fn into_halves(self) -> (ReadOnlyStorage<K, V>, WriteOnlyStorage<K, V>) {
        (self.read, self.write)
    }

    /// Same storage under a different name.
    #[must_use]
    pub fn renaming(self, name: impl Into<Arc<str>>) -> Self {
        Self::from_parts(name, self.read, self.write)
    }
}

impl<V: StorageValue> Storage<(), V> {
    /// Retrieves the value of a single-key storage.
    pub fn retrieve_single(&self) -> BoxFuture<'static, StorageResult<V>> {
        self.retrieve(())
    }

    /// Stores the value of a single-key storage.
    pub fn set_single(&self, value: V) -> BoxFuture<'static, StorageResult<()>> {
        self.set(value, ())
    }
}

impl<K, V> StorageDesign for Storage<K, V> {
    fn storage_name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl<K: StorageKey, V: StorageValue> Readable<K, V> for Storage<K, V> {
    async fn retrieve(&self, key: K) -> StorageResult<V> {
        self.read.retrieve(key).await
    }

    fn into_read_only(self) -> ReadOnlyStorage<K, V> {
        self.read
    }
}

#[async_trait]
impl<K: StorageKey, V: StorageValue> Writable<K, V> for Storage<K, V> {
    async fn set(&self, value: V, key: K) -> StorageResult<()> {
        self.write.set(value, key).await
    }

    fn into_write_only(self) -> WriteOnlyStorage<K, V> {
        self.write
    }
}
