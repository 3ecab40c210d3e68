//! MIME type records.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Default, PartialEq, Eq, Serialize)]
struct MimeTypeData {
    name: String,
    comment: String,
    generic_icon_name: String,
    icon_name: String,
    glob_patterns: Vec<String>,
}

/// An immutable MIME type record.
///
/// Clones share the same underlying data. The glob pattern list is for
/// introspection only; matching goes through the glob matchers.
#[derive(Clone, PartialEq, Eq)]
pub struct MimeType {
    data: Arc<MimeTypeData>,
}

impl MimeType {
    /// Starts building a record for `name`.
    pub fn builder(name: &str) -> MimeTypeBuilder {
        MimeTypeBuilder {
            data: MimeTypeData {
                name: name.to_string(),
                ..Default::default()
            },
        }
    }

    /// A record with only a name.
    pub fn named(name: &str) -> Self {
        Self::builder(name).build()
    }

    /// Unique type name, e.g. `text/plain`.
    pub fn name(&self) -> &str {
        &self.data.name
    }

    /// Default (untranslated) description.
    pub fn comment(&self) -> &str {
        &self.data.comment
    }

    /// Generic icon name, or empty.
    pub fn generic_icon_name(&self) -> &str {
        &self.data.generic_icon_name
    }

    /// Specific icon name, or empty.
    pub fn icon_name(&self) -> &str {
        &self.data.icon_name
    }

    /// Glob patterns declared for this type.
    pub fn glob_patterns(&self) -> &[String] {
        &self.data.glob_patterns
    }

    /// Media group, the part before `/`.
    pub fn group(&self) -> &str {
        self.name().split('/').next().unwrap_or_default()
    }

    /// Suffixes of this type's `*.ext` patterns, in declaration order.
    pub fn suffixes(&self) -> Vec<&str> {
        self.data
            .glob_patterns
            .iter()
            .filter_map(|p| p.strip_prefix("*."))
            .filter(|s| !s.contains(['*', '?', '[']))
            .collect()
    }

    /// First suffix, if any.
    pub fn preferred_suffix(&self) -> Option<&str> {
        self.suffixes().into_iter().next()
    }
}

impl Serialize for MimeType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.data.serialize(serializer)
    }
}

impl fmt::Debug for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MimeType")
            .field("name", &self.data.name)
            .field("glob_patterns", &self.data.glob_patterns)
            .finish()
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Builder for [`MimeType`].
#[derive(Debug)]
pub struct MimeTypeBuilder {
    data: MimeTypeData,
}

impl MimeTypeBuilder {
    /// Sets the default comment.
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.data.comment = comment.into();
        self
    }

    /// Sets the generic icon name.
    pub fn generic_icon_name(mut self, name: impl Into<String>) -> Self {
        self.data.generic_icon_name = name.into();
        self
    }

    /// Sets the icon name.
    pub fn icon_name(mut self, name: impl Into<String>) -> Self {
        self.data.icon_name = name.into();
        self
    }

    /// Appends a glob pattern.
    pub fn glob_pattern(mut self, pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        if !self.data.glob_patterns.contains(&pattern) {
            self.data.glob_patterns.push(pattern);
        }
        self
    }

    /// Finishes the record.
    pub fn build(self) -> MimeType {
        MimeType {
            data: Arc::new(self.data),
        }
    }
}
