//! In-memory leaf storage.
//!
//! [`MemoryStorage`] keeps entries in a `HashMap` inside a [`ThreadSafe`]
//! container. Writes always succeed; a read-miss fails with
//! [`StorageError::NoValue`]. There is no eviction and no capacity bound:
//! entries live until overwritten or until the last clone is dropped.

use std::any::type_name;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{StorageError, StorageResult};
use crate::thread_safe::ThreadSafe;
use crate::traits::{Readable, StorageDesign, StorageKey, StorageValue, Writable};

/// Thread-safe in-memory storage.
///
/// Clones share the same underlying map.
pub struct MemoryStorage<K, V> {
    name: String,
    entries: Arc<ThreadSafe<HashMap<K, V>>>,
}

impl<K, V> Clone for MemoryStorage<K, V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<K: Eq + Hash, V> MemoryStorage<K, V> {
    /// Creates an empty storage named `memory-storage-<K>:<V>`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_entries(HashMap::new())
    }

    /// Creates a storage pre-populated with `entries`.
    #[must_use]
    pub fn with_entries(entries: HashMap<K, V>) -> Self {
        Self {
            name: format!("memory-storage-{}:{}", type_name::<K>(), type_name::<V>()),
            entries: Arc::new(ThreadSafe::new(entries)),
        }
    }

    /// Same storage (sharing entries) under a different name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Replaces every entry at once.
    pub fn replace(&self, entries: HashMap<K, V>) {
        self.entries.write(entries);
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read_with(HashMap::len)
    }

    /// Whether the storage holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read_with(HashMap::is_empty)
    }
}

impl<K: Eq + Hash + Clone, V: Clone> MemoryStorage<K, V> {
    /// Returns a consistent copy of every entry.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<K, V> {
        self.entries.read()
    }
}

impl<K: Eq + Hash, V> Default for MemoryStorage<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> StorageDesign for MemoryStorage<K, V> {
    fn storage_name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl<K, V> Readable<K, V> for MemoryStorage<K, V>
where
    K: StorageKey + Eq + Hash,
    V: StorageValue,
{
    async fn retrieve(&self, key: K) -> StorageResult<V> {
        self.entries
            .read_with(|entries| entries.get(&key).cloned())
            .ok_or(StorageError::NoValue)
    }
}

#[async_trait]
impl<K, V> Writable<K, V> for MemoryStorage<K, V>
where
    K: StorageKey + Eq + Hash,
    V: StorageValue,
{
    async fn set(&self, value: V, key: K) -> StorageResult<()> {
        self.entries.write_with(|entries| {
            entries.insert(key, value);
        });
        Ok(())
    }
}
