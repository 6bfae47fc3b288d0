//! Shoal Core: composable async key-value storages.
//!
//! Leaf storages implement [`Readable`] and [`Writable`]. Everything else is
//! built by normalizing them into the canonical wrappers ([`ReadOnlyStorage`],
//! [`WriteOnlyStorage`], [`Storage`]) and chaining combinators: tiering
//! (`backed_by`, `pushing_to`, `combined`), key and value transformations,
//! [`zip`] and the blocking adapters.

pub mod composition;
pub mod config;
pub mod error;
pub mod logging;
pub mod memory;
pub mod storage;
pub mod sync;
pub mod thread_safe;
pub mod traits;
pub mod transform;
pub mod zip;

pub use composition::{PullStrategy, SetStrategy};
pub use config::CombinationConfig;
pub use error::{throwing, zip_results, StorageError, StorageResult, ZippedResultError};
pub use memory::MemoryStorage;
pub use storage::{ReadOnlyStorage, Storage, WriteOnlyStorage};
pub use sync::{ReadOnlySyncStorage, SyncStorage, WriteOnlySyncStorage};
pub use thread_safe::ThreadSafe;
pub use traits::{ReadWrite, Readable, StorageDesign, StorageKey, StorageValue, Writable};
pub use zip::{zip, zip_read_only, zip_write_only, CompletionZip, ZipStrategy};
