//! Value codecs over byte storages.
//!
//! Each codec turns a `Storage<K, Bytes>` into a storage of typed values by
//! decoding on read and encoding on write. Decode failures carry the target
//! type name and a short preview of the offending bytes.

use std::any::type_name;
use std::error::Error as StdError;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use shoal_core::{Storage, StorageError, StorageKey, StorageValue};

const PREVIEW_CHARS: usize = 64;

/// Bytes that could not be decoded into the requested type.
#[derive(Debug, thiserror::Error)]
#[error("cannot decode {type_name} from {preview}")]
pub struct DecodeError {
    pub type_name: &'static str,
    pub preview: String,
    #[source]
    pub source: Box<dyn StdError + Send + Sync>,
}

impl DecodeError {
    fn new<T>(data: &[u8], source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self {
            type_name: type_name::<T>(),
            preview: preview(data),
            source: source.into(),
        }
    }
}

fn preview(data: &[u8]) -> String {
    match std::str::from_utf8(data) {
        Ok(text) if text.chars().count() > PREVIEW_CHARS => {
            let head: String = text.chars().take(PREVIEW_CHARS).collect();
            format!("{head:?}...")
        }
        Ok(text) => format!("{text:?}"),
        Err(_) => format!("<{} bytes of binary data>", data.len()),
    }
}

fn decode_failure<T>(data: &[u8], source: impl Into<Box<dyn StdError + Send + Sync>>) -> StorageError {
    StorageError::backend(DecodeError::new::<T>(data, source))
}

/// Typed views of a byte storage.
pub trait ValueCodecs<K> {
    /// JSON values through `serde_json`.
    fn json_values<T>(self) -> Storage<K, T>
    where
        T: Serialize + DeserializeOwned + StorageValue;

    /// `MessagePack` values through `rmp-serde`, with named fields.
    fn msgpack_values<T>(self) -> Storage<K, T>
    where
        T: Serialize + DeserializeOwned + StorageValue;

    /// UTF-8 text.
    fn string_values(self) -> Storage<K, String>;
}

impl<K: StorageKey> ValueCodecs<K> for Storage<K, Bytes> {
    fn json_values<T>(self) -> Storage<K, T>
    where
        T: Serialize + DeserializeOwned + StorageValue,
    {
        self.map_values(
            |data: Bytes| serde_json::from_slice(&data).map_err(|e| decode_failure::<T>(&data, e)),
            |value: T| {
                serde_json::to_vec(&value)
                    .map(Bytes::from)
                    .map_err(StorageError::backend)
            },
        )
    }

    fn msgpack_values<T>(self) -> Storage<K, T>
    where
        T: Serialize + DeserializeOwned + StorageValue,
    {
        self.map_values(
            |data: Bytes| rmp_serde::from_slice(&data).map_err(|e| decode_failure::<T>(&data, e)),
            |value: T| {
                rmp_serde::to_vec_named(&value)
                    .map(Bytes::from)
                    .map_err(StorageError::backend)
            },
        )
    }

    fn string_values(self) -> Storage<K, String> {
        self.map_values(
            |data: Bytes| {
                String::from_utf8(data.to_vec()).map_err(|e| decode_failure::<String>(&data, e))
            },
            |text: String| Ok(Bytes::from(text)),
        )
    }
}
