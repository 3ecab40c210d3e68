//! The shared-mime-info binary cache (`mime.cache`).
//!
//! - [`format`] - on-disk layout and record types
//! - [`file`] - mapping and bounds-checked reads
//! - [`reader`] - queries over a mapped cache
//! - [`writer`] - compiling a [`crate::TypeRegistry`] into a cache image

pub mod file;
pub mod format;
pub mod reader;
pub mod writer;

pub use file::CacheFile;
pub use reader::CacheReader;
pub use writer::{CacheWriter, WriterStats};
