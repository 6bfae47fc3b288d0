//! Key and value transformations over the canonical wrappers.
//!
//! Every transformation consumes a wrapper and returns a new one under the
//! same name. A transformation that fails short-circuits the call with its
//! own error; the underlying storage is then never reached.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::{StorageError, StorageResult};
use crate::storage::{ReadOnlyStorage, Storage, WriteOnlyStorage};
use crate::traits::{StorageKey, StorageValue};

fn validated<V>(predicate: &(dyn Fn(&V) -> bool + Send + Sync), value: V) -> StorageResult<V> {
    if predicate(&value) {
        Ok(value)
    } else {
        Err(StorageError::InvalidValue)
    }
}

// ---------------------------------------------------------------------------
// ReadOnlyStorage
// ---------------------------------------------------------------------------

impl<K: StorageKey, V: StorageValue> ReadOnlyStorage<K, V> {
    /// Retrieves through a key transformation.
    #[must_use]
    pub fn map_keys<K2: StorageKey>(
        self,
        transform: impl Fn(K2) -> StorageResult<K> + Send + Sync + 'static,
    ) -> ReadOnlyStorage<K2, V> {
        let name = self.name().to_owned();
        ReadOnlyStorage::new(name, move |key| {
            let retrieve = transform(key).map(|key| self.retrieve(key));
            async move { retrieve?.await }
        })
    }

    /// Retrieves with keys converted through [`Into`].
    #[must_use]
    pub fn map_keys_into<K2>(self) -> ReadOnlyStorage<K2, V>
    where
        K2: StorageKey + Into<K>,
    {
        self.map_keys(|key: K2| Ok(key.into()))
    }

    /// Transforms every retrieved value.
    #[must_use]
    pub fn map_values<V2: StorageValue>(
        self,
        transform: impl Fn(V) -> StorageResult<V2> + Send + Sync + 'static,
    ) -> ReadOnlyStorage<K, V2> {
        let name = self.name().to_owned();
        let transform = Arc::new(transform);
        ReadOnlyStorage::new(name, move |key| {
            let retrieve = self.retrieve(key);
            let transform = Arc::clone(&transform);
            async move { transform(retrieve.await?) }
        })
    }

    /// Converts retrieved values through [`TryFrom`].
    ///
    /// A failed conversion surfaces as [`StorageError::Backend`].
    #[must_use]
    pub fn map_values_into<V2>(self) -> ReadOnlyStorage<K, V2>
    where
        V2: StorageValue + TryFrom<V>,
        <V2 as TryFrom<V>>::Error: std::error::Error + Send + Sync + 'static,
    {
        self.map_values(|value| V2::try_from(value).map_err(StorageError::backend))
    }

    /// Transforms every retrieved value with an asynchronous function, for
    /// transformations that need I/O of their own.
    #[must_use]
    pub fn map_values_async<V2, F, Fut>(self, transform: F) -> ReadOnlyStorage<K, V2>
    where
        V2: StorageValue,
        F: Fn(V) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StorageResult<V2>> + Send + 'static,
    {
        let name = self.name().to_owned();
        let transform = Arc::new(transform);
        ReadOnlyStorage::new(name, move |key| {
            let retrieve = self.retrieve(key);
            let transform = Arc::clone(&transform);
            async move { transform(retrieve.await?).await }
        })
    }

    /// Binds this storage to one fixed key.
    #[must_use]
    pub fn single_key(self, key: K) -> ReadOnlyStorage<(), V> {
        self.map_keys(move |()| Ok(key.clone()))
    }

    /// Replaces a failed retrieve with the result of `produce`.
    #[must_use]
    pub fn fallback(
        self,
        produce: impl Fn(StorageError) -> StorageResult<V> + Send + Sync + 'static,
    ) -> Self {
        let name = self.name().to_owned();
        let produce = Arc::new(produce);
        Self::new(name, move |key| {
            let retrieve = self.retrieve(key);
            let produce = Arc::clone(&produce);
            async move { retrieve.await.or_else(|error| produce(error)) }
        })
    }

    /// Completes every failed retrieve with `value` instead.
    #[must_use]
    pub fn defaulting(self, value: V) -> Self {
        self.fallback(move |_| Ok(value.clone()))
    }

    /// Rejects retrieved values for which `predicate` is false.
    #[must_use]
    pub fn validate(self, predicate: impl Fn(&V) -> bool + Send + Sync + 'static) -> Self {
        self.map_values(move |value| validated(&predicate, value))
    }

    /// Serializes every retrieve through one async mutex.
    #[must_use]
    pub fn synchronized(self) -> Self {
        self.gated(Arc::new(Mutex::new(())))
    }

    fn gated(self, gate: Arc<Mutex<()>>) -> Self {
        let name = self.name().to_owned();
        Self::new(name, move |key| {
            let inner = self.clone();
            let gate = Arc::clone(&gate);
            async move {
                let _turn = gate.lock().await;
                inner.retrieve(key).await
            }
        })
    }

    /// Applies a read-write transformation to this read-only storage.
    ///
    /// The transformation sees a write half that fails with
    /// [`StorageError::ReadOnly`]; only the read half of its result is kept.
    #[must_use]
    pub fn using_unsupported_transformation<K2, V2>(
        self,
        transform: impl FnOnce(Storage<K, V>) -> Storage<K2, V2>,
    ) -> ReadOnlyStorage<K2, V2>
    where
        K2: StorageKey,
        V2: StorageValue,
    {
        let write = WriteOnlyStorage::new(self.name().to_owned(), |_, _| async {
            Err(StorageError::ReadOnly)
        });
        transform(Storage::from_halves(self, write)).as_read_only()
    }
}

// ---------------------------------------------------------------------------
// WriteOnlyStorage
// ---------------------------------------------------------------------------

impl<K: StorageKey, V: StorageValue> WriteOnlyStorage<K, V> {
    /// Sets through a key transformation.
    #[must_use]
    pub fn map_keys<K2: StorageKey>(
        self,
        transform: impl Fn(K2) -> StorageResult<K> + Send + Sync + 'static,
    ) -> WriteOnlyStorage<K2, V> {
        let name = self.name().to_owned();
        WriteOnlyStorage::new(name, move |value, key| {
            let set = transform(key).map(|key| self.set(value, key));
            async move { set?.await }
        })
    }

    /// Sets with keys converted through [`Into`].
    #[must_use]
    pub fn map_keys_into<K2>(self) -> WriteOnlyStorage<K2, V>
    where
        K2: StorageKey + Into<K>,
    {
        self.map_keys(|key: K2| Ok(key.into()))
    }

    /// Transforms every value before it is set.
    #[must_use]
    pub fn map_values<V2: StorageValue>(
        self,
        transform: impl Fn(V2) -> StorageResult<V> + Send + Sync + 'static,
    ) -> WriteOnlyStorage<K, V2> {
        let name = self.name().to_owned();
        WriteOnlyStorage::new(name, move |value, key| {
            let set = transform(value).map(|value| self.set(value, key));
            async move { set?.await }
        })
    }

    /// Converts values through [`Into`] before they are set.
    #[must_use]
    pub fn map_values_into<V2>(self) -> WriteOnlyStorage<K, V2>
    where
        V2: StorageValue + Into<V>,
    {
        self.map_values(|value: V2| Ok(value.into()))
    }

    /// Transforms every value with an asynchronous function before it is set.
    #[must_use]
    pub fn map_values_async<V2, F, Fut>(self, transform: F) -> WriteOnlyStorage<K, V2>
    where
        V2: StorageValue,
        F: Fn(V2) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StorageResult<V>> + Send + 'static,
    {
        let name = self.name().to_owned();
        WriteOnlyStorage::new(name, move |value, key| {
            let transformed = transform(value);
            let storage = self.clone();
            async move { storage.set(transformed.await?, key).await }
        })
    }

    /// Binds this storage to one fixed key.
    #[must_use]
    pub fn single_key(self, key: K) -> WriteOnlyStorage<(), V> {
        self.map_keys(move |()| Ok(key.clone()))
    }

    /// Rejects values for which `predicate` is false before setting them.
    #[must_use]
    pub fn validate(self, predicate: impl Fn(&V) -> bool + Send + Sync + 'static) -> Self {
        self.map_values(move |value| validated(&predicate, value))
    }

    /// Serializes every set through one async mutex.
    #[must_use]
    pub fn synchronized(self) -> Self {
        self.gated(Arc::new(Mutex::new(())))
    }

    fn gated(self, gate: Arc<Mutex<()>>) -> Self {
        let name = self.name().to_owned();
        Self::new(name, move |value, key| {
            let inner = self.clone();
            let gate = Arc::clone(&gate);
            async move {
                let _turn = gate.lock().await;
                inner.set(value, key).await
            }
        })
    }

    /// Applies a read-write transformation to this write-only storage.
    ///
    /// The transformation sees a read half that fails with
    /// [`StorageError::WriteOnly`]; only the write half of its result is kept.
    #[must_use]
    pub fn using_unsupported_transformation<K2, V2>(
        self,
        transform: impl FnOnce(Storage<K, V>) -> Storage<K2, V2>,
    ) -> WriteOnlyStorage<K2, V2>
    where
        K2: StorageKey,
        V2: StorageValue,
    {
        let name = self.name().to_owned();
        let read = ReadOnlyStorage::new(name.clone(), |_| async { Err(StorageError::WriteOnly) });
        transform(Storage::from_parts(name, read, self)).as_write_only()
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

impl<K: StorageKey, V: StorageValue> Storage<K, V> {
    /// Reads and writes through a key transformation.
    #[must_use]
    pub fn map_keys<K2: StorageKey>(
        self,
        transform: impl Fn(K2) -> StorageResult<K> + Send + Sync + 'static,
    ) -> Storage<K2, V> {
        let name = self.name().to_owned();
        let transform = Arc::new(transform);
        let write_transform = Arc::clone(&transform);
        let (read, write) = self.into_halves();
        Storage::from_parts(
            name,
            read.map_keys(move |key| transform(key)),
            write.map_keys(move |key| write_transform(key)),
        )
    }

    /// Reads and writes with keys converted through [`Into`].
    #[must_use]
    pub fn map_keys_into<K2>(self) -> Storage<K2, V>
    where
        K2: StorageKey + Into<K>,
    {
        self.map_keys(|key: K2| Ok(key.into()))
    }

    /// Transforms values on the way out (`transform_in`) and on the way in
    /// (`transform_out`).
    #[must_use]
    pub fn map_values<V2: StorageValue>(
        self,
        transform_in: impl Fn(V) -> StorageResult<V2> + Send + Sync + 'static,
        transform_out: impl Fn(V2) -> StorageResult<V> + Send + Sync + 'static,
    ) -> Storage<K, V2> {
        let name = self.name().to_owned();
        let (read, write) = self.into_halves();
        Storage::from_parts(
            name,
            read.map_values(transform_in),
            write.map_values(transform_out),
        )
    }

    /// Converts values through [`TryFrom`] when reading and [`Into`] when
    /// writing.
    #[must_use]
    pub fn map_values_into<V2>(self) -> Storage<K, V2>
    where
        V2: StorageValue + TryFrom<V> + Into<V>,
        <V2 as TryFrom<V>>::Error: std::error::Error + Send + Sync + 'static,
    {
        let name = self.name().to_owned();
        let (read, write) = self.into_halves();
        Storage::from_parts(name, read.map_values_into(), write.map_values_into())
    }

    /// [`map_values`](Self::map_values) with asynchronous transformations.
    #[must_use]
    pub fn map_values_async<V2, In, InFut, Out, OutFut>(
        self,
        transform_in: In,
        transform_out: Out,
    ) -> Storage<K, V2>
    where
        V2: StorageValue,
        In: Fn(V) -> InFut + Send + Sync + 'static,
        InFut: Future<Output = StorageResult<V2>> + Send + 'static,
        Out: Fn(V2) -> OutFut + Send + Sync + 'static,
        OutFut: Future<Output = StorageResult<V>> + Send + 'static,
    {
        let name = self.name().to_owned();
        let (read, write) = self.into_halves();
        Storage::from_parts(
            name,
            read.map_values_async(transform_in),
            write.map_values_async(transform_out),
        )
    }

    /// Binds this storage to one fixed key.
    #[must_use]
    pub fn single_key(self, key: K) -> Storage<(), V> {
        self.map_keys(move |()| Ok(key.clone()))
    }

    /// Replaces a failed retrieve with the result of `produce`. Writes are
    /// unaffected.
    #[must_use]
    pub fn fallback(
        self,
        produce: impl Fn(StorageError) -> StorageResult<V> + Send + Sync + 'static,
    ) -> Self {
        let name = self.name().to_owned();
        let (read, write) = self.into_halves();
        Self::from_parts(name, read.fallback(produce), write)
    }

    /// Completes every failed retrieve with `value` instead. Writes are
    /// unaffected.
    #[must_use]
    pub fn defaulting(self, value: V) -> Self {
        self.fallback(move |_| Ok(value.clone()))
    }

    /// Rejects values for which `predicate` is false, on both paths.
    #[must_use]
    pub fn validate(self, predicate: impl Fn(&V) -> bool + Send + Sync + 'static) -> Self {
        let name = self.name().to_owned();
        let predicate = Arc::new(predicate);
        let write_predicate = Arc::clone(&predicate);
        let (read, write) = self.into_halves();
        Self::from_parts(
            name,
            read.validate(move |value| predicate(value)),
            write.validate(move |value| write_predicate(value)),
        )
    }

    /// Serializes every call, read or write, through one async mutex.
    #[must_use]
    pub fn synchronized(self) -> Self {
        let name = self.name().to_owned();
        let gate = Arc::new(Mutex::new(()));
        let (read, write) = self.into_halves();
        Self::from_parts(name, read.gated(Arc::clone(&gate)), write.gated(gate))
    }

    /// Retrieves the value for `key`, mutates it and sets it back.
    ///
    /// # Errors
    ///
    /// Fails with the retrieve error when there is nothing to update, or
    /// with the set error when the modified value cannot be stored.
    pub async fn update(&self, key: K, modify: impl FnOnce(&mut V) + Send) -> StorageResult<V> {
        let mut value = self.retrieve(key.clone()).await?;
        modify(&mut value);
        self.set(value.clone(), key).await?;
        Ok(value)
    }
}
