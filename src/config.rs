//! Database configuration.
//!
//! A [`DatabaseConfig`] names the binary caches and XML definition packages a
//! [`MimeDatabase`](crate::MimeDatabase) is assembled from. It can be built in
//! code or read from JSON:
//!
//! ```
//! use mimedb::DatabaseConfig;
//!
//! let config = DatabaseConfig::from_json_str(
//!     r#"{ "cache_files": ["/usr/share/mime/mime.cache"], "max_ancestor_depth": 8 }"#,
//! )?;
//! assert_eq!(config.cache_files.len(), 1);
//! assert!(config.packages.is_empty());
//! assert_eq!(config.max_ancestor_depth, 8);
//! # Ok::<(), mimedb::MimeError>(())
//! ```

use crate::error::{MimeError, Result};
use crate::hierarchy::DEFAULT_MAX_DEPTH;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Sources and limits for building a database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// `mime.cache` files, consulted in order before any package
    pub cache_files: Vec<PathBuf>,
    /// `<mime-info>` XML packages, loaded in order into one registry
    pub packages: Vec<PathBuf>,
    /// Bound on ancestor traversal
    pub max_ancestor_depth: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            cache_files: Vec::new(),
            packages: Vec::new(),
            max_ancestor_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl DatabaseConfig {
    /// Parses a configuration from JSON text. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()
    }

    /// Reads a configuration from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            MimeError::Config(format!("failed to open {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| MimeError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()
    }

    /// Serializes the configuration as pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn validate(self) -> Result<Self> {
        if self.max_ancestor_depth == 0 {
            return Err(MimeError::Config(
                "max_ancestor_depth must be at least 1".to_string(),
            ));
        }
        Ok(self)
    }
}
