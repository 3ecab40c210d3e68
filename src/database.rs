//! Unified Database API
//!
//! A [`MimeDatabase`] answers every query over an ordered list of providers:
//! binary caches first, then the registry built from XML packages. Name
//! matches from all providers compete in one tie-break, content matches go
//! to the highest accuracy, and hierarchy queries merge declared parents.
//!
//! The database is built once and is immutable afterwards; all lookups take
//! `&self` and it can be shared between threads. [`LazyMimeDatabase`] defers
//! the build to first use.

use crate::cache::CacheReader;
use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::glob_list::{GlobMatch, GlobMatchResult};
use crate::hierarchy::{self, with_fallback, DEFAULT_MAX_DEPTH};
use crate::loader;
use crate::mime_type::MimeType;
use crate::provider::{DataMatch, MimeProvider, Provider};
use crate::registry::TypeRegistry;
use once_cell::sync::OnceCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Bytes worth reading for content sniffing when no provider knows better.
pub const DEFAULT_MAGIC_EXTENT: usize = 4096;

/// MIME type database over caches and definition packages
///
/// # Examples
///
/// ```
/// use mimedb::MimeDatabase;
///
/// let xml = r#"<mime-info xmlns="http://www.freedesktop.org/standards/shared-mime-info">
///   <mime-type type="application/x-bzip"><glob pattern="*.bz2"/></mime-type>
///   <mime-type type="application/x-bzip-compressed-tar">
///     <sub-class-of type="application/x-bzip"/>
///     <glob pattern="*.tar.bz2"/>
///   </mime-type>
/// </mime-info>"#;
///
/// let mut registry = mimedb::TypeRegistry::new();
/// mimedb::loader::load_str(&mut registry, xml)?;
/// let db = MimeDatabase::builder().registry(registry).build();
///
/// let found = db.find_by_name("backup.tar.bz2");
/// assert_eq!(found.types, vec!["application/x-bzip-compressed-tar"]);
/// assert!(db.inherits("application/x-bzip-compressed-tar", "application/octet-stream"));
/// # Ok::<(), mimedb::MimeError>(())
/// ```
#[derive(Debug)]
pub struct MimeDatabase {
    providers: Vec<Provider>,
    max_ancestor_depth: usize,
}

impl MimeDatabase {
    /// Starts an empty builder.
    pub fn builder() -> MimeDatabaseBuilder {
        MimeDatabaseBuilder::new()
    }

    /// Builds a database from a configuration.
    ///
    /// Caches that fail to open and packages that fail to load are logged
    /// and left out.
    pub fn from_config(config: &DatabaseConfig) -> Self {
        Self::builder().config(config).build()
    }

    /// Reads a JSON configuration file and builds the database it describes.
    pub fn from_config_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = DatabaseConfig::from_json_file(path)?;
        Ok(Self::from_config(&config))
    }

    /// Providers in consultation order.
    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    /// Bound used by [`ancestors`](Self::ancestors).
    pub fn max_ancestor_depth(&self) -> usize {
        self.max_ancestor_depth
    }

    /// Best type name(s) for a file name.
    ///
    /// Every provider feeds the same result, so a heavier or longer pattern
    /// from a later provider still beats an earlier one. Several names mean
    /// the match is ambiguous.
    pub fn find_by_name(&self, file_name: &str) -> GlobMatch {
        let mut result = GlobMatchResult::new();
        for provider in &self.providers {
            provider.match_name(file_name, &mut result);
        }
        result.into_match()
    }

    /// Best content match for `data`. Equal accuracy keeps the earlier
    /// provider's answer.
    pub fn find_by_data(&self, data: &[u8]) -> Option<DataMatch> {
        let mut best: Option<DataMatch> = None;
        for provider in &self.providers {
            if let Some(candidate) = provider.find_by_data(data) {
                if best.as_ref().map_or(true, |b| candidate.accuracy > b.accuracy) {
                    best = Some(candidate);
                }
            }
        }
        best
    }

    /// Full record for a type name or one of its aliases.
    pub fn mime_type_for_name(&self, name: &str) -> Option<MimeType> {
        let canonical = self.resolve_alias(name);
        self.providers
            .iter()
            .find_map(|p| p.mime_type_for_name(&canonical))
    }

    /// Direct parents of `name`, merged across providers in order, or the
    /// fallback parent when no provider declares any.
    pub fn parents(&self, name: &str) -> Vec<String> {
        let mut merged: Vec<String> = Vec::new();
        for provider in &self.providers {
            for parent in provider.declared_parents(name) {
                if !merged.contains(&parent) {
                    merged.push(parent);
                }
            }
        }
        with_fallback(name, merged)
    }

    /// Canonical name for `name`. The first provider with an alias entry
    /// decides; a name that is no alias is returned unchanged.
    pub fn resolve_alias(&self, name: &str) -> String {
        self.providers
            .iter()
            .find_map(|p| p.lookup_alias(name))
            .unwrap_or_else(|| name.to_string())
    }

    /// Every known type, sorted by name. A type known to several providers
    /// is reported with the earliest provider's record.
    pub fn all_mime_types(&self) -> Vec<MimeType> {
        let mut all: BTreeMap<String, MimeType> = BTreeMap::new();
        for provider in &self.providers {
            for mime_type in provider.all_mime_types() {
                all.entry(mime_type.name().to_string()).or_insert(mime_type);
            }
        }
        all.into_values().collect()
    }

    /// All ancestors of `name`, nearest first, including fallback parents.
    pub fn ancestors(&self, name: &str) -> Vec<String> {
        let canonical = self.resolve_alias(name);
        hierarchy::ancestors(&canonical, self.max_ancestor_depth, |t| self.parents(t))
    }

    /// True when `name` is `ancestor` or derives from it. Aliases are
    /// resolved on both sides.
    pub fn inherits(&self, name: &str, ancestor: &str) -> bool {
        let name = self.resolve_alias(name);
        let ancestor = self.resolve_alias(ancestor);
        name == ancestor || self.ancestors(&name).contains(&ancestor)
    }

    /// Number of leading bytes worth reading before calling
    /// [`find_by_data`](Self::find_by_data).
    pub fn magic_extent(&self) -> usize {
        self.providers
            .iter()
            .filter_map(|p| p.magic_extent())
            .max()
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_MAGIC_EXTENT)
    }
}

/// Assembles a [`MimeDatabase`].
///
/// Providers end up in this order: cache files, then providers added with
/// [`provider`](Self::provider), then one registry holding the supplied
/// registry plus every package.
#[derive(Debug)]
pub struct MimeDatabaseBuilder {
    cache_files: Vec<PathBuf>,
    providers: Vec<Provider>,
    registry: Option<TypeRegistry>,
    packages: Vec<PathBuf>,
    max_ancestor_depth: usize,
}

impl Default for MimeDatabaseBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MimeDatabaseBuilder {
    /// Empty builder with the default ancestor depth.
    pub fn new() -> Self {
        Self {
            cache_files: Vec::new(),
            providers: Vec::new(),
            registry: None,
            packages: Vec::new(),
            max_ancestor_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Adds a `mime.cache` file.
    pub fn cache_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.cache_files.push(path.into());
        self
    }

    /// Adds a ready-made provider, such as a cache read from memory.
    pub fn provider<P: Into<Provider>>(mut self, provider: P) -> Self {
        self.providers.push(provider.into());
        self
    }

    /// Uses `registry` as the base the packages are loaded into.
    pub fn registry(mut self, registry: TypeRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Adds an XML definition package.
    pub fn package<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.packages.push(path.into());
        self
    }

    /// Adds every source named by `config` and takes its depth bound.
    pub fn config(mut self, config: &DatabaseConfig) -> Self {
        self.cache_files.extend(config.cache_files.iter().cloned());
        self.packages.extend(config.packages.iter().cloned());
        self.max_ancestor_depth = config.max_ancestor_depth;
        self
    }

    /// Bounds ancestor traversal.
    pub fn max_ancestor_depth(mut self, depth: usize) -> Self {
        self.max_ancestor_depth = depth.max(1);
        self
    }

    /// Opens and loads every source. Sources that fail are logged and left
    /// out; the database is still usable with whatever remains.
    pub fn build(self) -> MimeDatabase {
        let mut providers = Vec::with_capacity(self.cache_files.len() + self.providers.len() + 1);

        for path in &self.cache_files {
            match CacheReader::open(path) {
                Ok(reader) => {
                    debug!(cache = %path.display(), "opened cache");
                    providers.push(Provider::Cache(reader));
                }
                Err(e) => warn!(cache = %path.display(), error = %e, "skipping cache"),
            }
        }

        providers.extend(self.providers);

        let has_registry = self.registry.is_some();
        let mut registry = self.registry.unwrap_or_default();
        let mut loaded = 0usize;
        for path in &self.packages {
            match loader::load_package(&mut registry, path) {
                Ok(stats) => {
                    loaded += 1;
                    debug!(
                        package = %path.display(),
                        types = stats.types,
                        skipped = stats.skipped,
                        "loaded package"
                    );
                }
                Err(e) => warn!(package = %path.display(), error = %e, "skipping package"),
            }
        }
        if has_registry || loaded > 0 {
            providers.push(Provider::Registry(registry));
        }

        info!(providers = providers.len(), "mime database ready");
        MimeDatabase {
            providers,
            max_ancestor_depth: self.max_ancestor_depth,
        }
    }
}

/// A [`MimeDatabase`] built on first use.
///
/// Concurrent first calls to [`get`](Self::get) build the database exactly
/// once; every caller sees the same instance.
///
/// ```
/// use mimedb::{DatabaseConfig, LazyMimeDatabase};
///
/// let lazy = LazyMimeDatabase::new(DatabaseConfig::default());
/// assert!(!lazy.is_loaded());
/// assert!(lazy.get().find_by_name("a.txt").is_empty());
/// assert!(lazy.is_loaded());
/// ```
#[derive(Debug)]
pub struct LazyMimeDatabase {
    config: DatabaseConfig,
    db: OnceCell<MimeDatabase>,
}

impl LazyMimeDatabase {
    /// Wraps a configuration without loading anything.
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// The configuration the database is built from.
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// True once the database has been built.
    pub fn is_loaded(&self) -> bool {
        self.db.get().is_some()
    }

    /// The database, building it on the first call.
    pub fn get(&self) -> &MimeDatabase {
        self.db.get_or_init(|| {
            debug!("loading mime database on first use");
            MimeDatabase::from_config(&self.config)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheWriter;
    use crate::glob::{GlobPattern, MatchMode};
    use crate::magic::{MagicRule, MagicRuleMatcher};

    fn glob(r: &mut TypeRegistry, pattern: &str, name: &str, weight: u32) {
        r.add_mime_type(MimeType::builder(name).glob_pattern(pattern).build());
        let glob = GlobPattern::new(pattern, name, weight, MatchMode::CaseInsensitive).unwrap();
        r.add_glob_pattern(glob);
    }

    fn magic(r: &mut TypeRegistry, name: &str, priority: u32, value: &str) {
        let mut m = MagicRuleMatcher::new(name, priority);
        m.add_rule(None, MagicRule::parse("string", value, "0", None).unwrap())
            .unwrap();
        r.add_magic_matcher(m);
    }

    fn cache_provider(r: &TypeRegistry) -> CacheReader {
        CacheReader::from_bytes(CacheWriter::new(r).to_bytes().unwrap()).unwrap()
    }

    #[test]
    fn test_name_tie_break_spans_providers() {
        let mut first = TypeRegistry::new();
        glob(&mut first, "*.bz2", "application/x-bzip", 50);
        let mut second = TypeRegistry::new();
        glob(&mut second, "*.tar.bz2", "application/x-bzip-compressed-tar", 50);

        let db = MimeDatabase::builder()
            .provider(cache_provider(&first))
            .registry(second)
            .build();
        assert_eq!(db.providers().len(), 2);
        assert_eq!(
            db.find_by_name("a.tar.bz2").types,
            vec!["application/x-bzip-compressed-tar"]
        );
        assert_eq!(db.find_by_name("a.bz2").types, vec!["application/x-bzip"]);
    }

    #[test]
    fn test_ambiguity_across_providers() {
        let mut first = TypeRegistry::new();
        glob(&mut first, "*.foo", "application/x-one", 50);
        let mut second = TypeRegistry::new();
        glob(&mut second, "*.foo", "application/x-two", 50);

        let db = MimeDatabase::builder()
            .provider(first)
            .provider(second)
            .build();
        let found = db.find_by_name("x.foo");
        assert_eq!(found.types, vec!["application/x-one", "application/x-two"]);
        assert!(found.unique().is_none());
    }

    #[test]
    fn test_data_accuracy_and_ties() {
        let mut first = TypeRegistry::new();
        magic(&mut first, "application/x-low", 50, "AB");
        magic(&mut first, "application/x-tie-a", 60, "XY");
        let mut second = TypeRegistry::new();
        magic(&mut second, "application/x-high", 80, "AB");
        magic(&mut second, "application/x-tie-b", 60, "XY");

        let db = MimeDatabase::builder()
            .provider(first)
            .provider(second)
            .build();
        let found = db.find_by_data(b"ABCD").unwrap();
        assert_eq!(found.mime_type, "application/x-high");
        assert_eq!(found.accuracy, 80);
        assert_eq!(db.find_by_data(b"XYZ").unwrap().mime_type, "application/x-tie-a");
        assert!(db.find_by_data(b"nothing").is_none());
    }

    #[test]
    fn test_parents_merge_and_alias() {
        let mut first = TypeRegistry::new();
        first.add_mime_type(MimeType::named("application/x-both"));
        first.add_parent("application/x-both", "application/x-one");
        first.add_alias("application/x-old", "application/x-both");
        let mut second = TypeRegistry::new();
        second.add_parent("application/x-both", "application/x-two");
        second.add_parent("application/x-both", "application/x-one");
        second.add_alias("application/x-old", "application/x-other");

        let db = MimeDatabase::builder()
            .provider(first)
            .provider(second)
            .build();
        assert_eq!(
            db.parents("application/x-both"),
            vec!["application/x-one", "application/x-two"]
        );
        assert_eq!(db.resolve_alias("application/x-old"), "application/x-both");
        assert_eq!(db.resolve_alias("application/x-both"), "application/x-both");
        assert_eq!(
            db.mime_type_for_name("application/x-old").unwrap().name(),
            "application/x-both"
        );
        assert_eq!(db.parents("text/x-foo"), vec!["text/plain"]);
    }

    #[test]
    fn test_ancestors_and_inherits() {
        let mut r = TypeRegistry::new();
        r.add_parent("application/x-a", "application/x-b");
        r.add_parent("application/x-b", "application/x-a");
        r.add_parent("text/x-c", "application/x-a");
        r.add_alias("text/x-c-alias", "text/x-c");
        let db = MimeDatabase::builder().registry(r).build();

        assert_eq!(
            db.ancestors("text/x-c-alias"),
            vec!["application/x-a", "application/x-b"]
        );
        assert!(db.inherits("text/x-c-alias", "application/x-b"));
        assert!(db.inherits("text/x-c", "text/x-c-alias"));
        assert!(!db.inherits("application/x-a", "text/x-c"));
        assert!(db.inherits("text/x-d", "text/plain"));
        assert!(db.inherits("text/x-d", "application/octet-stream"));
    }

    #[test]
    fn test_depth_bound() {
        let mut r = TypeRegistry::new();
        r.add_parent("application/x-0", "application/x-1");
        r.add_parent("application/x-1", "application/x-2");
        r.add_parent("application/x-2", "application/x-3");
        let db = MimeDatabase::builder()
            .registry(r)
            .max_ancestor_depth(2)
            .build();
        assert_eq!(
            db.ancestors("application/x-0"),
            vec!["application/x-1", "application/x-2"]
        );
    }

    #[test]
    fn test_all_mime_types_earlier_wins() {
        let mut first = TypeRegistry::new();
        first.add_mime_type(MimeType::builder("image/png").comment("first").build());
        let mut second = TypeRegistry::new();
        second.add_mime_type(MimeType::builder("image/png").comment("second").build());
        second.add_mime_type(MimeType::named("image/gif"));

        let db = MimeDatabase::builder()
            .provider(first)
            .provider(second)
            .build();
        let all = db.all_mime_types();
        let names: Vec<&str> = all.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["image/gif", "image/png"]);
        assert_eq!(all[1].comment(), "first");
    }

    #[test]
    fn test_magic_extent() {
        assert_eq!(MimeDatabase::builder().build().magic_extent(), DEFAULT_MAGIC_EXTENT);

        let mut r = TypeRegistry::new();
        magic(&mut r, "application/x-a", 50, "ABCDEF");
        let db = MimeDatabase::builder().registry(r).build();
        assert_eq!(db.magic_extent(), 6);
    }

    #[test]
    fn test_bad_sources_are_skipped() {
        let db = MimeDatabase::builder()
            .cache_file("/nonexistent/mime.cache")
            .package("/nonexistent/package.xml")
            .build();
        assert!(db.providers().is_empty());
        assert!(db.find_by_name("a.txt").is_empty());
        assert_eq!(db.parents("text/x-foo"), vec!["text/plain"]);
    }

    #[test]
    fn test_lazy_loads_once() {
        let lazy = LazyMimeDatabase::new(DatabaseConfig::default());
        assert!(!lazy.is_loaded());
        let pointers: Vec<usize> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| lazy.get() as *const MimeDatabase as usize))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(lazy.is_loaded());
        assert!(pointers.windows(2).all(|w| w[0] == w[1]));
    }
}
