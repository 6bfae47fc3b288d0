//! Shoal Backends: storages that live outside memory, and the codecs and
//! tooling around them.
//!
//! - [`DiskStorage`] and [`DiskFolderStorage`] keep whole values in files.
//! - [`Filename`] and [`FilenameEncoder`] decide how keys become file names.
//! - [`ValueCodecs`] turns byte storages into JSON, `MessagePack` or UTF-8
//!   text storages.

pub mod cli;
pub mod codec;
pub mod disk;
pub mod filename;

pub use codec::{DecodeError, ValueCodecs};
pub use disk::{DiskError, DiskFolderStorage, DiskStorage, StringKeys};
pub use filename::{Filename, FilenameEncoder};
