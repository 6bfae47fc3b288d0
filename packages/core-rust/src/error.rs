//! Error model shared by every storage, combinator and adapter.
//!
//! All asynchronous operations resolve to a [`StorageResult`]. Errors are
//! `Clone` so that the zip synchronizer can retain a result while pairing it
//! with several arrivals from the other side.

use std::fmt;
use std::sync::Arc;

/// Result of every storage operation.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors produced by storages, combinators and adapters.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum StorageError {
    /// A terminal store holds no value for the requested key.
    #[error("no value stored for the requested key")]
    NoValue,
    /// The store is deliberately always empty.
    #[error("storage is always empty")]
    Empty,
    /// At least one side of a zipped operation failed.
    #[error("{0}")]
    Zipped(Box<ZippedResultError>),
    /// An optional transformation produced no value.
    #[error("transformation produced no value")]
    Unwrap,
    /// A write was routed to a storage that only supports reads.
    #[error("storage is read-only")]
    ReadOnly,
    /// A read was routed to a storage that only supports writes.
    #[error("storage is write-only")]
    WriteOnly,
    /// A validation predicate rejected the value.
    #[error("value rejected by validation")]
    InvalidValue,
    /// I/O failure from a file-backed store.
    #[error("I/O error: {0}")]
    Io(Arc<std::io::Error>),
    /// Opaque backend or transform failure, passed through unchanged.
    #[error("{0:#}")]
    Backend(Arc<anyhow::Error>),
}

impl StorageError {
    /// Wraps an arbitrary backend failure.
    pub fn backend(error: impl Into<anyhow::Error>) -> Self {
        Self::Backend(Arc::new(error.into()))
    }

    /// Builds the aggregate error of a zipped operation.
    #[must_use]
    pub fn zipped(left: Option<StorageError>, right: Option<StorageError>) -> Self {
        Self::Zipped(Box::new(ZippedResultError { left, right }))
    }

    /// Returns `true` for a miss in a terminal store.
    #[must_use]
    pub fn is_no_value(&self) -> bool {
        matches!(self, Self::NoValue)
    }

    /// Returns the aggregate error if this is a zipped failure.
    #[must_use]
    pub fn as_zipped(&self) -> Option<&ZippedResultError> {
        match self {
            Self::Zipped(zipped) => Some(zipped),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(Arc::new(error))
    }
}

/// Aggregate error of two joined operations.
///
/// Each side is `None` when that side succeeded.
#[derive(Debug, Clone)]
pub struct ZippedResultError {
    /// Error of the left operation, if it failed.
    pub left: Option<StorageError>,
    /// Error of the right operation, if it failed.
    pub right: Option<StorageError>,
}

impl fmt::Display for ZippedResultError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.left, &self.right) {
            (Some(left), Some(right)) => {
                write!(f, "both zipped operations failed (left: {left}; right: {right})")
            }
            (Some(left), None) => write!(f, "left zipped operation failed: {left}"),
            (None, Some(right)) => write!(f, "right zipped operation failed: {right}"),
            (None, None) => f.write_str("zipped operation failed"),
        }
    }
}

impl std::error::Error for ZippedResultError {}

/// Joins two results into a result of the pair.
///
/// Succeeds only if both sides succeeded; otherwise fails with a
/// [`ZippedResultError`] that keeps the error of every failed side.
///
/// # Examples
///
/// ```
/// use shoal_core::error::{zip_results, StorageError};
///
/// let joined = zip_results(Ok::<_, StorageError>(10), Ok::<_, StorageError>("x"));
/// assert_eq!(joined.unwrap(), (10, "x"));
///
/// let failed = zip_results(Ok::<i32, _>(1), Err::<i32, _>(StorageError::NoValue));
/// let zipped = failed.unwrap_err();
/// assert!(zipped.as_zipped().unwrap().left.is_none());
/// ```
///
/// # Errors
///
/// Returns [`StorageError::Zipped`] when either side failed.
pub fn zip_results<A, B>(left: StorageResult<A>, right: StorageResult<B>) -> StorageResult<(A, B)> {
    match (left, right) {
        (Ok(left), Ok(right)) => Ok((left, right)),
        (left, right) => Err(StorageError::zipped(left.err(), right.err())),
    }
}

/// Turns an `Option`-returning function into a fallible one.
///
/// `None` becomes [`StorageError::Unwrap`]. Useful for building key or value
/// transformations out of partial conversions.
pub fn throwing<I, O, F>(block: F) -> impl Fn(I) -> StorageResult<O> + Send + Sync + 'static
where
    F: Fn(I) -> Option<O> + Send + Sync + 'static,
{
    move |input| block(input).ok_or(StorageError::Unwrap)
}
