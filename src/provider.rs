//! The query surface shared by the binary cache and the in-memory registry.

use crate::cache::CacheReader;
use crate::glob_list::{GlobMatch, GlobMatchResult};
use crate::hierarchy::with_fallback;
use crate::mime_type::MimeType;
use crate::registry::TypeRegistry;
use serde::Serialize;

/// Outcome of a content lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataMatch {
    /// Winning type name
    pub mime_type: String,
    /// Confidence: the priority of the magic block that matched (never 0)
    pub accuracy: u32,
}

/// Operations every source of type information answers.
///
/// Implementations never fail: a provider that cannot answer (for example a
/// corrupt cache) reports "no match".
pub trait MimeProvider {
    /// Short description used in logs.
    fn describe(&self) -> String;

    /// Feeds this provider's glob matches for `file_name` into `result`.
    fn match_name(&self, file_name: &str, result: &mut GlobMatchResult);

    /// Best type name(s) for `file_name` from this provider alone.
    fn find_by_name(&self, file_name: &str) -> GlobMatch {
        let mut result = GlobMatchResult::new();
        self.match_name(file_name, &mut result);
        result.into_match()
    }

    /// Best content match for `data`.
    fn find_by_data(&self, data: &[u8]) -> Option<DataMatch>;

    /// Full record for `name` (no alias resolution).
    fn mime_type_for_name(&self, name: &str) -> Option<MimeType>;

    /// Explicitly declared parents of `name`.
    fn declared_parents(&self, name: &str) -> Vec<String>;

    /// Declared parents, or the fallback parent.
    fn parents(&self, name: &str) -> Vec<String> {
        with_fallback(name, self.declared_parents(name))
    }

    /// Canonical name if `name` is an alias.
    fn lookup_alias(&self, name: &str) -> Option<String>;

    /// Canonical name, or `name` itself.
    fn resolve_alias(&self, name: &str) -> String {
        self.lookup_alias(name).unwrap_or_else(|| name.to_string())
    }

    /// Every type this provider knows.
    fn all_mime_types(&self) -> Vec<MimeType>;

    /// Leading bytes worth reading for content sniffing, if known.
    fn magic_extent(&self) -> Option<usize>;
}

/// The closed set of providers a database can hold.
#[derive(Debug)]
pub enum Provider {
    /// A mapped `mime.cache`
    Cache(CacheReader),
    /// Records loaded from definition packages
    Registry(TypeRegistry),
}

impl From<CacheReader> for Provider {
    fn from(reader: CacheReader) -> Self {
        Provider::Cache(reader)
    }
}

impl From<TypeRegistry> for Provider {
    fn from(registry: TypeRegistry) -> Self {
        Provider::Registry(registry)
    }
}

impl MimeProvider for Provider {
    fn describe(&self) -> String {
        match self {
            Provider::Cache(c) => c.describe(),
            Provider::Registry(r) => format!("registry ({} types)", r.len()),
        }
    }

    fn match_name(&self, file_name: &str, result: &mut GlobMatchResult) {
        match self {
            Provider::Cache(c) => c.match_name(file_name, result),
            Provider::Registry(r) => r.match_name(file_name, result),
        }
    }

    fn find_by_data(&self, data: &[u8]) -> Option<DataMatch> {
        match self {
            Provider::Cache(c) => c.find_by_data(data),
            Provider::Registry(r) => r.find_by_data(data),
        }
    }

    fn mime_type_for_name(&self, name: &str) -> Option<MimeType> {
        match self {
            Provider::Cache(c) => c.mime_type_for_name(name),
            Provider::Registry(r) => r.mime_type_for_name(name),
        }
    }

    fn declared_parents(&self, name: &str) -> Vec<String> {
        match self {
            Provider::Cache(c) => c.declared_parents(name),
            Provider::Registry(r) => r.declared_parents(name),
        }
    }

    fn lookup_alias(&self, name: &str) -> Option<String> {
        match self {
            Provider::Cache(c) => c.lookup_alias(name),
            Provider::Registry(r) => r.lookup_alias(name),
        }
    }

    fn all_mime_types(&self) -> Vec<MimeType> {
        match self {
            Provider::Cache(c) => c.all_mime_types(),
            Provider::Registry(r) => r.all_mime_types(),
        }
    }

    fn magic_extent(&self) -> Option<usize> {
        match self {
            Provider::Cache(c) => c.magic_extent(),
            Provider::Registry(r) => Some(r.magic_extent()),
        }
    }
}
