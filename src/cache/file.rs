//! Memory-mapped cache files with bounds-checked accessors.
//!
//! Every read goes through [`CacheFile::get_slice`], which checks
//! `offset + width <= size` before touching the bytes. Corrupt offsets
//! surface as [`MimeError::OffsetOutOfBounds`], never as out-of-bounds
//! memory access.
//!
//! # Example
//!
//! ```no_run
//! use mimedb::cache::CacheFile;
//!
//! let cache = CacheFile::open("/usr/share/mime/mime.cache")?;
//! println!("version {:?}, {} bytes", cache.version(), cache.size());
//! # Ok::<(), mimedb::MimeError>(())
//! ```

use crate::cache::format::{check_version, HEADER_SIZE};
use crate::error::{MimeError, Result};
use memmap2::Mmap;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};
use zerocopy::{FromBytes, Immutable, KnownLayout};

/// Storage for cache data - either owned or memory-mapped
enum CacheStorage {
    Owned(Vec<u8>),
    Mmap(Mmap),
}

impl CacheStorage {
    fn as_slice(&self) -> &[u8] {
        match self {
            CacheStorage::Owned(v) => v.as_slice(),
            CacheStorage::Mmap(m) => &m[..],
        }
    }
}

/// A validated, read-only cache database.
///
/// The mapping lives exactly as long as the `CacheFile`; borrowed strings
/// returned by the accessors are tied to `&self`.
pub struct CacheFile {
    storage: CacheStorage,
    source: Option<PathBuf>,
    major: u16,
    minor: u16,
    corruption_reported: AtomicBool,
}

impl CacheFile {
    /// Opens and memory-maps a cache file, then checks its version.
    ///
    /// # Errors
    ///
    /// - [`MimeError::Io`] if the file cannot be opened or mapped
    /// - [`MimeError::OffsetOutOfBounds`] if it is shorter than the header
    /// - [`MimeError::InvalidCacheVersion`] for an unsupported version
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        // SAFETY: the mapping is read-only and owned by the returned value.
        // Concurrent truncation by another process is outside our control,
        // as for any mmap user.
        let mmap = unsafe { Mmap::map(&file)? };
        debug!(path = %path.display(), size = mmap.len(), "mapped cache file");
        Self::from_storage(CacheStorage::Mmap(mmap), Some(path.to_path_buf()))
    }

    /// Wraps an in-memory cache image.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::from_storage(CacheStorage::Owned(data), None)
    }

    fn from_storage(storage: CacheStorage, source: Option<PathBuf>) -> Result<Self> {
        let size = storage.as_slice().len();
        if size < HEADER_SIZE {
            return Err(MimeError::OffsetOutOfBounds {
                offset: 0,
                width: HEADER_SIZE,
                size,
            });
        }
        let mut cache = CacheFile {
            storage,
            source,
            major: 0,
            minor: 0,
            corruption_reported: AtomicBool::new(false),
        };
        cache.major = cache.read_u16(0)?;
        cache.minor = cache.read_u16(2)?;
        check_version(cache.major, cache.minor)?;
        Ok(cache)
    }

    /// `(major, minor)` from the header.
    pub fn version(&self) -> (u16, u16) {
        (self.major, self.minor)
    }

    /// Path this cache was mapped from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Size of the mapped region in bytes.
    pub fn size(&self) -> usize {
        self.as_slice().len()
    }

    /// The whole mapped region.
    pub fn as_slice(&self) -> &[u8] {
        self.storage.as_slice()
    }

    /// `length` bytes at `offset`, or `OffsetOutOfBounds`.
    pub fn get_slice(&self, offset: usize, length: usize) -> Result<&[u8]> {
        let data = self.as_slice();
        match offset.checked_add(length) {
            Some(end) if end <= data.len() => Ok(&data[offset..end]),
            _ => Err(MimeError::OffsetOutOfBounds {
                offset,
                width: length,
                size: data.len(),
            }),
        }
    }

    /// Big-endian `u16` at `offset`.
    pub fn read_u16(&self, offset: usize) -> Result<u16> {
        let b = self.get_slice(offset, 2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    /// Big-endian `u32` at `offset`.
    pub fn read_u32(&self, offset: usize) -> Result<u32> {
        let b = self.get_slice(offset, 4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Big-endian `u32` at `offset`, widened for use as an offset or count.
    pub fn read_offset(&self, offset: usize) -> Result<usize> {
        Ok(self.read_u32(offset)? as usize)
    }

    /// NUL-terminated UTF-8 string starting at `offset`.
    pub fn read_cstr(&self, offset: usize) -> Result<&str> {
        let data = self.as_slice();
        let tail = data.get(offset..).ok_or(MimeError::OffsetOutOfBounds {
            offset,
            width: 1,
            size: data.len(),
        })?;
        let len = memchr::memchr(0, tail).ok_or(MimeError::InvalidString { offset })?;
        std::str::from_utf8(&tail[..len]).map_err(|_| MimeError::InvalidString { offset })
    }

    /// Fixed-size record at `offset`.
    pub fn record<T>(&self, offset: usize) -> Result<T>
    where
        T: FromBytes + KnownLayout + Immutable,
    {
        let bytes = self.get_slice(offset, std::mem::size_of::<T>())?;
        T::read_from_bytes(bytes).map_err(|_| MimeError::OffsetOutOfBounds {
            offset,
            width: std::mem::size_of::<T>(),
            size: self.size(),
        })
    }

    /// Logs a corrupt-database condition: a warning the first time, debug
    /// output afterwards.
    pub fn report_corruption(&self, query: &str, err: &MimeError) {
        let source = self
            .source
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<memory>".to_string());
        if !self.corruption_reported.swap(true, Ordering::Relaxed) {
            warn!(cache = %source, query, error = %err, "corrupt mime cache, query skipped");
        } else {
            debug!(cache = %source, query, error = %err, "corrupt mime cache");
        }
    }
}

impl fmt::Debug for CacheFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheFile")
            .field("source", &self.source)
            .field("size", &self.size())
            .field("version", &(self.major, self.minor))
            .finish()
    }
}
