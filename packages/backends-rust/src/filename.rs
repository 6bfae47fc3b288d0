//! Filenames and how they are encoded on disk.

use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Logical name of a file inside a [`DiskFolderStorage`](crate::DiskFolderStorage).
///
/// The raw name is never used as a path directly: a [`FilenameEncoder`]
/// turns it into the on-disk file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filename(String);

impl Filename {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Standard base64 of the UTF-8 bytes, padded.
    #[must_use]
    pub fn base64_encoded(&self) -> String {
        STANDARD.encode(self.0.as_bytes())
    }

    /// URL-safe base64 (`-` and `_` instead of `+` and `/`), padded.
    #[must_use]
    pub fn base64_url_encoded(&self) -> String {
        URL_SAFE.encode(self.0.as_bytes())
    }

    /// Lowercase hex SHA-256 digest of the UTF-8 bytes.
    #[must_use]
    pub fn sha256_hex(&self) -> String {
        hex::encode(Sha256::digest(self.0.as_bytes()))
    }
}

impl fmt::Display for Filename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Filename {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl From<&str> for Filename {
    fn from(raw: &str) -> Self {
        Self(raw.to_owned())
    }
}

/// Maps a [`Filename`] to the name of the file actually written.
#[derive(Clone, Default)]
pub enum FilenameEncoder {
    /// Standard base64. May produce `/`, which nests files in directories.
    Base64,
    /// URL-safe base64.
    #[default]
    Base64Url,
    /// Hex SHA-256 digest. Fixed length, not reversible.
    Sha256,
    /// The raw name, unchanged.
    NoEncoding,
    /// Caller-provided encoding.
    Custom(Arc<dyn Fn(&Filename) -> String + Send + Sync>),
}

impl FilenameEncoder {
    /// Wraps a custom encoding function.
    pub fn custom(encode: impl Fn(&Filename) -> String + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(encode))
    }

    #[must_use]
    pub fn encode(&self, filename: &Filename) -> String {
        match self {
            Self::Base64 => filename.base64_encoded(),
            Self::Base64Url => filename.base64_url_encoded(),
            Self::Sha256 => filename.sha256_hex(),
            Self::NoEncoding => filename.as_str().to_owned(),
            Self::Custom(encode) => encode(filename),
        }
    }
}

impl fmt::Debug for FilenameEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base64 => f.write_str("Base64"),
            Self::Base64Url => f.write_str("Base64Url"),
            Self::Sha256 => f.write_str("Sha256"),
            Self::NoEncoding => f.write_str("NoEncoding"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
