//! Capability traits: read, write, and both.
//!
//! [`Readable`] and [`Writable`] are the minimal contracts every backend and
//! combinator satisfies. A type implementing both is a [`ReadWrite`] storage.
//! Combinators operate on the canonical type-erased wrappers
//! ([`ReadOnlyStorage`], [`WriteOnlyStorage`], [`Storage`]); the `into_*`
//! methods normalize any implementation into those wrappers.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StorageResult;
use crate::storage::{normalize, ReadOnlyStorage, Storage, WriteOnlyStorage};

/// Bound satisfied by every key type.
///
/// Keys are cloned when a combinator consults a second tier or writes a
/// value back.
pub trait StorageKey: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> StorageKey for T {}

/// Bound satisfied by every value type.
///
/// Values are cloned when a combinator writes back to a front tier or when
/// the zip synchronizer retains a result for later pairing.
pub trait StorageValue: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> StorageValue for T {}

/// Diagnostic identity of a storage.
///
/// The name shows up in trace lines only. It never takes part in identity
/// or equality.
pub trait StorageDesign {
    /// Human-readable name of this storage.
    fn storage_name(&self) -> &str;
}

/// Read capability: retrieve the value stored for a key.
///
/// The returned future resolves exactly once. A miss is an error
/// (typically [`StorageError::NoValue`](crate::StorageError::NoValue)).
#[async_trait]
pub trait Readable<K: StorageKey, V: StorageValue>: StorageDesign + Send + Sync {
    /// Retrieves the value for `key`.
    async fn retrieve(&self, key: K) -> StorageResult<V>;

    /// Normalizes into the canonical read-only wrapper.
    ///
    /// Returns `self` unchanged when it already is a [`ReadOnlyStorage`].
    fn into_read_only(self) -> ReadOnlyStorage<K, V>
    where
        Self: Sized + 'static,
    {
        normalize(self, ReadOnlyStorage::from_readable)
    }
}

/// Write capability: store a value for a key.
#[async_trait]
pub trait Writable<K: StorageKey, V: StorageValue>: StorageDesign + Send + Sync {
    /// Stores `value` for `key`.
    async fn set(&self, value: V, key: K) -> StorageResult<()>;

    /// Normalizes into the canonical write-only wrapper.
    ///
    /// Returns `self` unchanged when it already is a [`WriteOnlyStorage`].
    fn into_write_only(self) -> WriteOnlyStorage<K, V>
    where
        Self: Sized + 'static,
    {
        normalize(self, WriteOnlyStorage::from_writable)
    }
}

/// A storage that can both read and write the same key space.
pub trait ReadWrite<K: StorageKey, V: StorageValue>: Readable<K, V> + Writable<K, V> {
    /// Normalizes into the canonical [`Storage`] wrapper.
    ///
    /// Returns `self` unchanged when it already is a [`Storage`].
    fn into_storage(self) -> Storage<K, V>
    where
        Self: Sized + 'static,
    {
        normalize(self, Storage::from_backend)
    }
}

impl<K: StorageKey, V: StorageValue, T> ReadWrite<K, V> for T where
    T: Readable<K, V> + Writable<K, V>
{
}

impl<T: StorageDesign + ?Sized> StorageDesign for Arc<T> {
    fn storage_name(&self) -> &str {
        (**self).storage_name()
    }
}

#[async_trait]
impl<K: StorageKey, V: StorageValue, T: Readable<K, V> + ?Sized> Readable<K, V> for Arc<T> {
    async fn retrieve(&self, key: K) -> StorageResult<V> {
        (**self).retrieve(key).await
    }
}

#[async_trait]
impl<K: StorageKey, V: StorageValue, T: Writable<K, V> + ?Sized> Writable<K, V> for Arc<T> {
    async fn set(&self, value: V, key: K) -> StorageResult<()> {
        (**self).set(value, key).await
    }
}
