//! mimedb - MIME Type Resolution over shared-mime-info Data
//!
//! mimedb answers "what type is this file?" from a file name, from the first
//! bytes of its contents, or both, and navigates the type hierarchy
//! (parents, aliases and the implicit `text/plain` /
//! `application/octet-stream` roots).
//!
//! Type information comes from two kinds of providers:
//!
//! - **Binary caches**: `mime.cache` files, memory-mapped and queried in place
//! - **Definition packages**: `<mime-info>` XML files loaded into a
//!   [`TypeRegistry`]
//!
//! # Quick Start
//!
//! ```rust
//! use mimedb::{CacheReader, CacheWriter, MimeDatabase, TypeRegistry};
//!
//! let xml = r#"<mime-info xmlns="http://www.freedesktop.org/standards/shared-mime-info">
//!   <mime-type type="image/bmp">
//!     <comment>Windows BMP image</comment>
//!     <glob pattern="*.bmp"/>
//!     <magic priority="80">
//!       <match type="string" value="BM" offset="0">
//!         <match type="byte" value="0x28" offset="14"/>
//!       </match>
//!     </magic>
//!   </mime-type>
//! </mime-info>"#;
//!
//! let mut registry = TypeRegistry::new();
//! mimedb::loader::load_str(&mut registry, xml)?;
//!
//! // Compile the registry into a cache and query it through the facade
//! let cache = CacheReader::from_bytes(CacheWriter::new(&registry).to_bytes()?)?;
//! let db = MimeDatabase::builder().provider(cache).build();
//!
//! assert_eq!(db.find_by_name("photo.BMP").types, vec!["image/bmp"]);
//!
//! let mut header = vec![0u8; 16];
//! header[..2].copy_from_slice(b"BM");
//! header[14] = 0x28;
//! let found = db.find_by_data(&header).unwrap();
//! assert_eq!((found.mime_type.as_str(), found.accuracy), ("image/bmp", 80));
//! # Ok::<(), mimedb::MimeError>(())
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │  MimeDatabase (facade)               │
//! ├──────────────────────────────────────┤
//! │  Provider::Cache     mime.cache      │
//! │  Provider::Cache     ...             │
//! │  Provider::Registry  XML packages    │
//! └──────────────────────────────────────┘
//!          ↓ per query, in order
//! ┌──────────────────────────────────────┐
//! │  globs → one shared tie-break        │
//! │  magic → highest accuracy            │
//! │  parents → merged, else fallback     │
//! └──────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Binary cache reader and writer
pub mod cache;
pub mod config;
/// Unified database API
pub mod database;
/// Error types for mimedb operations
pub mod error;
pub mod glob;
pub mod glob_list;
pub mod hierarchy;
pub mod loader;
pub mod magic;
pub mod mime_type;
pub mod provider;
pub mod registry;

// Re-exports for Rust consumers

pub use crate::cache::{CacheReader, CacheWriter, WriterStats};
pub use crate::config::DatabaseConfig;
pub use crate::database::{LazyMimeDatabase, MimeDatabase, MimeDatabaseBuilder};
pub use crate::error::{MimeError, Result};
pub use crate::glob::{GlobPattern, MatchMode};
pub use crate::glob_list::GlobMatch;
pub use crate::magic::{MagicRule, MagicRuleMatcher};
pub use crate::mime_type::MimeType;
pub use crate::provider::{DataMatch, MimeProvider, Provider};
pub use crate::registry::TypeRegistry;

// Version information
/// Library version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
