//! In-memory type registry.
//!
//! A [`TypeRegistry`] is filled once by a loader replaying definition
//! records (see [`crate::loader`]) and is read-only afterwards. It answers
//! the same queries as the binary cache, over ordinary hash maps.
//!
//! ```
//! use mimedb::glob::{GlobPattern, MatchMode};
//! use mimedb::{MimeType, TypeRegistry};
//!
//! let mut registry = TypeRegistry::new();
//! registry.add_mime_type(MimeType::builder("text/x-csrc").glob_pattern("*.c").build());
//! let glob = GlobPattern::new("*.c", "text/x-csrc", 50, MatchMode::CaseSensitive)?;
//! registry.add_glob_pattern(glob);
//!
//! assert_eq!(registry.find_by_name("main.c").types, vec!["text/x-csrc"]);
//! assert_eq!(registry.parents("text/x-csrc"), vec!["text/plain"]);
//! # Ok::<(), mimedb::MimeError>(())
//! ```

use crate::glob::GlobPattern;
use crate::glob_list::{GlobMatch, GlobMatchResult, GlobMatcher};
use crate::hierarchy::with_fallback;
use crate::magic::{best_match, MagicRuleMatcher};
use crate::mime_type::MimeType;
use crate::provider::DataMatch;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

/// Glob, magic, parent and alias tables built from parsed definitions.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: FxHashMap<String, MimeType>,
    globs: GlobMatcher,
    parents: FxHashMap<String, Vec<String>>,
    aliases: FxHashMap<String, String>,
    magic: Vec<MagicRuleMatcher>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a type record. A later record with the same name replaces
    /// the earlier one.
    pub fn add_mime_type(&mut self, mime_type: MimeType) {
        if let Some(old) = self.types.insert(mime_type.name().to_string(), mime_type) {
            debug!(mime_type = old.name(), "replacing existing type record");
        }
    }

    /// Registers a glob pattern used for name matching.
    pub fn add_glob_pattern(&mut self, glob: GlobPattern) {
        trace!(pattern = glob.pattern(), mime_type = glob.mime_type(), "add glob");
        self.globs.add(glob);
    }

    /// Declares `parent` as a parent of `child`. Declaration order is kept;
    /// repeating a declaration has no effect.
    pub fn add_parent(&mut self, child: &str, parent: &str) {
        let list = self.parents.entry(child.to_string()).or_default();
        if !list.iter().any(|p| p == parent) {
            list.push(parent.to_string());
        }
    }

    /// Declares `alias` as another name for `canonical`.
    pub fn add_alias(&mut self, alias: &str, canonical: &str) {
        self.aliases.insert(alias.to_string(), canonical.to_string());
    }

    /// Registers a type's magic rules.
    pub fn add_magic_matcher(&mut self, matcher: MagicRuleMatcher) {
        self.magic.push(matcher);
    }

    /// Adds every record of `other`, as if its `add_*` calls were replayed
    /// after this registry's own.
    pub fn merge(&mut self, other: TypeRegistry) {
        for (_, mime_type) in other.types {
            self.add_mime_type(mime_type);
        }
        for glob in other.globs.patterns() {
            self.globs.add(glob.clone());
        }
        for (child, parents) in other.parents {
            for parent in parents {
                self.add_parent(&child, &parent);
            }
        }
        self.aliases.extend(other.aliases);
        self.magic.extend(other.magic);
    }

    /// Number of type records.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// True when no type record was added.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Registered glob patterns.
    pub fn glob_patterns(&self) -> &[GlobPattern] {
        self.globs.patterns()
    }

    /// Registered magic matchers in registration order.
    pub fn magic_matchers(&self) -> &[MagicRuleMatcher] {
        &self.magic
    }

    /// All `(child, declared parents)` pairs.
    pub fn parent_entries(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.parents.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// All `(alias, canonical)` pairs.
    pub fn alias_entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.aliases.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Record for `name`, if registered. No alias resolution.
    pub fn mime_type_for_name(&self, name: &str) -> Option<MimeType> {
        self.types.get(name).cloned()
    }

    /// Feeds glob matches for `file_name` into a shared result.
    pub fn match_name(&self, file_name: &str, result: &mut GlobMatchResult) {
        self.globs.match_into(file_name, result);
    }

    /// Best type name(s) for `file_name`.
    pub fn find_by_name(&self, file_name: &str) -> GlobMatch {
        self.globs.find(file_name)
    }

    /// Highest-accuracy content match; the first registered matcher wins a tie.
    pub fn find_by_data(&self, data: &[u8]) -> Option<DataMatch> {
        best_match(&self.magic, data).map(|(matcher, accuracy)| DataMatch {
            mime_type: matcher.mime_type().to_string(),
            accuracy,
        })
    }

    /// Parents declared for `name`, without fallback.
    pub fn declared_parents(&self, name: &str) -> Vec<String> {
        self.parents.get(name).cloned().unwrap_or_default()
    }

    /// Declared parents, or the fallback parent.
    pub fn parents(&self, name: &str) -> Vec<String> {
        with_fallback(name, self.declared_parents(name))
    }

    /// Canonical name for an alias, if `name` is one.
    pub fn lookup_alias(&self, name: &str) -> Option<String> {
        self.aliases.get(name).cloned()
    }

    /// Canonical name for `name`; `name` itself when it is not an alias.
    pub fn resolve_alias(&self, name: &str) -> String {
        self.lookup_alias(name).unwrap_or_else(|| name.to_string())
    }

    /// Every registered type record, sorted by name.
    pub fn all_mime_types(&self) -> Vec<MimeType> {
        let mut all: Vec<MimeType> = self.types.values().cloned().collect();
        all.sort_by(|a, b| a.name().cmp(b.name()));
        all
    }

    /// Number of leading bytes the magic rules inspect.
    pub fn magic_extent(&self) -> usize {
        self.magic.iter().map(|m| m.extent()).max().unwrap_or(0)
    }
}
