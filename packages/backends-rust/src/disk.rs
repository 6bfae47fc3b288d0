//! File-backed storages.
//!
//! [`DiskStorage`] reads and writes whole files addressed by path.
//! [`DiskFolderStorage`] confines a disk storage to one folder and derives
//! file names from [`Filename`] keys through a [`FilenameEncoder`].

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use shoal_core::{
    ReadOnlyStorage, ReadWrite, Readable, Storage, StorageDesign, StorageError, StorageResult,
    StorageValue, Writable, WriteOnlyStorage,
};
use tracing::debug;

use crate::filename::{Filename, FilenameEncoder};

/// Failures specific to file-backed storages.
#[derive(Debug, thiserror::Error)]
pub enum DiskError {
    #[error("cannot create directory {}", path.display())]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot write file {}", path.display())]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Whole-file storage keyed by path.
///
/// A missing file fails the retrieve with [`StorageError::Io`] of kind
/// `NotFound`.
#[derive(Debug, Clone)]
pub struct DiskStorage {
    creating_directories: bool,
}

impl DiskStorage {
    /// Disk storage that creates missing parent directories on write.
    #[must_use]
    pub fn new() -> Self {
        Self {
            creating_directories: true,
        }
    }

    /// Whether missing parent directories are created on write.
    #[must_use]
    pub fn creating_directories(mut self, enabled: bool) -> Self {
        self.creating_directories = enabled;
        self
    }

    /// A folder view of this storage.
    #[must_use]
    pub fn folder(self, folder: impl Into<PathBuf>, encoder: FilenameEncoder) -> DiskFolderStorage {
        DiskFolderStorage::new(folder)
            .with_encoder(encoder)
            .with_disk(self.into_storage())
    }

    async fn ensure_parent(&self, path: &Path) -> StorageResult<()> {
        if !self.creating_directories {
            return Ok(());
        }
        let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
            return Ok(());
        };
        tokio::fs::create_dir_all(parent).await.map_err(|source| {
            StorageError::backend(DiskError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            })
        })
    }
}

impl Default for DiskStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageDesign for DiskStorage {
    fn storage_name(&self) -> &str {
        "disk"
    }
}

#[async_trait]
impl Readable<PathBuf, Bytes> for DiskStorage {
    async fn retrieve(&self, key: PathBuf) -> StorageResult<Bytes> {
        let contents = tokio::fs::read(&key).await?;
        Ok(Bytes::from(contents))
    }
}

#[async_trait]
impl Writable<PathBuf, Bytes> for DiskStorage {
    async fn set(&self, value: Bytes, key: PathBuf) -> StorageResult<()> {
        self.ensure_parent(&key).await?;
        tokio::fs::write(&key, &value).await.map_err(|source| {
            StorageError::backend(DiskError::WriteFile {
                path: key.clone(),
                source,
            })
        })?;
        debug!(path = %key.display(), bytes = value.len(), "file written");
        Ok(())
    }
}

/// Files inside one folder, named by encoded [`Filename`]s.
#[derive(Debug, Clone)]
pub struct DiskFolderStorage {
    name: String,
    folder: PathBuf,
    encoder: FilenameEncoder,
    disk: Storage<PathBuf, Bytes>,
}

impl DiskFolderStorage {
    /// Folder storage over a directory-creating [`DiskStorage`], encoding
    /// names with [`FilenameEncoder::Base64Url`].
    ///
    /// The storage is named `disk-<last path component>`.
    #[must_use]
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        let folder = folder.into();
        let last = folder
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            name: format!("disk-{last}"),
            folder,
            encoder: FilenameEncoder::default(),
            disk: DiskStorage::new().into_storage(),
        }
    }

    #[must_use]
    pub fn with_encoder(mut self, encoder: FilenameEncoder) -> Self {
        self.encoder = encoder;
        self
    }

    /// Routes file access through `disk` instead of the default disk storage.
    #[must_use]
    pub fn with_disk(mut self, disk: impl ReadWrite<PathBuf, Bytes> + 'static) -> Self {
        self.disk = disk.into_storage();
        self
    }

    #[must_use]
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Where the value for `filename` is stored.
    #[must_use]
    pub fn file_path(&self, filename: &Filename) -> PathBuf {
        self.folder.join(self.encoder.encode(filename))
    }

    /// Removes the folder and everything in it. A missing folder is not an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] when the folder exists but cannot be
    /// removed.
    pub async fn clear(&self) -> StorageResult<()> {
        match tokio::fs::remove_dir_all(&self.folder).await {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }
}

impl StorageDesign for DiskFolderStorage {
    fn storage_name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl Readable<Filename, Bytes> for DiskFolderStorage {
    async fn retrieve(&self, key: Filename) -> StorageResult<Bytes> {
        self.disk.retrieve(self.file_path(&key)).await
    }
}

#[async_trait]
impl Writable<Filename, Bytes> for DiskFolderStorage {
    async fn set(&self, value: Bytes, key: Filename) -> StorageResult<()> {
        self.disk.set(value, self.file_path(&key)).await
    }
}

/// Addresses [`Filename`]-keyed storages with plain strings.
pub trait StringKeys {
    type Output;

    fn using_string_keys(self) -> Self::Output;
}

impl<V: StorageValue> StringKeys for Storage<Filename, V> {
    type Output = Storage<String, V>;

    fn using_string_keys(self) -> Self::Output {
        self.map_keys(|key: String| Ok(Filename::from(key)))
    }
}

impl<V: StorageValue> StringKeys for ReadOnlyStorage<Filename, V> {
    type Output = ReadOnlyStorage<String, V>;

    fn using_string_keys(self) -> Self::Output {
        self.map_keys(|key: String| Ok(Filename::from(key)))
    }
}

impl<V: StorageValue> StringKeys for WriteOnlyStorage<Filename, V> {
    type Output = WriteOnlyStorage<String, V>;

    fn using_string_keys(self) -> Self::Output {
        self.map_keys(|key: String| Ok(Filename::from(key)))
    }
}
