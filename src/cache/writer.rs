//! Compiles a [`TypeRegistry`] into the binary cache format.
//!
//! The writer lays out every table described in [`crate::cache::format`]
//! and appends one shared, de-duplicated string and byte pool at the end.
//! References into the pool are patched once its offsets are known.
//!
//! ```
//! use mimedb::cache::{CacheReader, CacheWriter};
//! use mimedb::glob::{GlobPattern, MatchMode};
//! use mimedb::TypeRegistry;
//!
//! let mut registry = TypeRegistry::new();
//! registry.add_glob_pattern(GlobPattern::new("*.rs", "text/rust", 50, MatchMode::CaseSensitive)?);
//!
//! let bytes = CacheWriter::new(&registry).to_bytes()?;
//! let reader = CacheReader::from_bytes(bytes)?;
//! assert_eq!(reader.find_by_name("main.rs").types, vec!["text/rust"]);
//! # Ok::<(), mimedb::MimeError>(())
//! ```

use crate::cache::format::{
    pack_flags, AliasEntry, GlobEntry, IconEntry, MagicListHeader, MagicMatch, Matchlet,
    ParentEntry, SuffixNode, HEADER_SIZE, MAJOR_VERSION, POS_ALIAS_LIST, POS_GENERIC_ICONS_LIST,
    POS_GLOB_LIST, POS_ICONS_LIST, POS_LITERAL_LIST, POS_MAGIC_LIST, POS_NAMESPACE_LIST,
    POS_PARENT_LIST, POS_REVERSE_SUFFIX_TREE, WEIGHT_MASK, WRITE_MINOR_VERSION,
};
use crate::error::{MimeError, Result};
use crate::glob::{GlobPattern, PatternKind};
use crate::magic::{MagicRuleMatcher, RuleId};
use crate::registry::TypeRegistry;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::mem::offset_of;
use std::path::Path;
use tracing::{debug, info};
use zerocopy::byteorder::U32;
use zerocopy::{Immutable, IntoBytes};

/// Counts of what went into a compiled cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WriterStats {
    /// Patterns stored as literals
    pub literals: usize,
    /// Patterns stored in the reverse suffix tree
    pub suffixes: usize,
    /// Patterns stored in the glob list
    pub globs: usize,
    /// Types with magic rules
    pub magic: usize,
    /// Alias entries
    pub aliases: usize,
    /// Types with declared parents
    pub parents: usize,
    /// Size of the image in bytes
    pub size: usize,
}

/// Serializes a registry as a `mime.cache` image.
pub struct CacheWriter<'a> {
    registry: &'a TypeRegistry,
}

impl<'a> CacheWriter<'a> {
    /// Creates a writer over `registry`.
    pub fn new(registry: &'a TypeRegistry) -> Self {
        Self { registry }
    }

    /// Builds the cache image.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.build().map(|(bytes, _)| bytes)
    }

    /// Builds the image and writes it to `path`.
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> Result<WriterStats> {
        let (bytes, stats) = self.build()?;
        let mut file = File::create(path.as_ref())?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        info!(path = %path.as_ref().display(), size = bytes.len(), "wrote mime cache");
        Ok(stats)
    }

    /// Builds the image along with layout statistics.
    pub fn build(&self) -> Result<(Vec<u8>, WriterStats)> {
        self.check_weights()?;
        let mut img = Image::new();
        let mut stats = WriterStats::default();

        img.set_section(POS_ALIAS_LIST);
        stats.aliases = self.write_aliases(&mut img);

        img.set_section(POS_PARENT_LIST);
        stats.parents = self.write_parents(&mut img);

        let (literals, suffixes, globs) = self.classify();
        stats.literals = literals.len();
        stats.suffixes = suffixes.len();
        stats.globs = globs.len();

        img.set_section(POS_LITERAL_LIST);
        write_glob_list(&mut img, &literals);

        img.set_section(POS_REVERSE_SUFFIX_TREE);
        write_suffix_tree(&mut img, &suffixes);

        img.set_section(POS_GLOB_LIST);
        write_glob_list(&mut img, &globs);

        img.set_section(POS_MAGIC_LIST);
        stats.magic = self.write_magic(&mut img);

        img.set_section(POS_NAMESPACE_LIST);
        img.push_u32(0);

        img.set_section(POS_ICONS_LIST);
        self.write_icons(&mut img, false);

        img.set_section(POS_GENERIC_ICONS_LIST);
        self.write_icons(&mut img, true);

        let bytes = img.finish()?;
        stats.size = bytes.len();
        debug!(?stats, "compiled mime cache");
        Ok((bytes, stats))
    }

    /// Glob weights are stored in one byte; larger ones would rank differently.
    fn check_weights(&self) -> Result<()> {
        match self
            .registry
            .glob_patterns()
            .iter()
            .find(|g| g.weight() > WEIGHT_MASK)
        {
            Some(glob) => Err(MimeError::InvalidPattern(format!(
                "weight {} of '{}' ({}) exceeds the cache limit of {}",
                glob.weight(),
                glob.pattern(),
                glob.mime_type(),
                WEIGHT_MASK
            ))),
            None => Ok(()),
        }
    }

    /// Splits glob patterns by the table that will hold them.
    fn classify(&self) -> (Vec<&GlobPattern>, Vec<&GlobPattern>, Vec<&GlobPattern>) {
        let mut literals = Vec::new();
        let mut suffixes = Vec::new();
        let mut globs = Vec::new();
        for glob in self.registry.glob_patterns() {
            match glob.kind() {
                // Escaped literals keep their backslashes in the stored text,
                // which only the glob matcher understands.
                PatternKind::Literal if !glob.pattern().contains('\\') => literals.push(glob),
                PatternKind::Suffix => suffixes.push(glob),
                _ => globs.push(glob),
            }
        }
        (literals, suffixes, globs)
    }

    fn write_aliases(&self, img: &mut Image) -> usize {
        let mut aliases: Vec<(&str, &str)> = self.registry.alias_entries().collect();
        aliases.sort();
        img.push_u32(aliases.len() as u32);
        for (alias, canonical) in &aliases {
            let at = img.push_record(&AliasEntry {
                alias_offset: U32::new(0),
                mime_offset: U32::new(0),
            });
            img.string_ref(at + offset_of!(AliasEntry, alias_offset), alias);
            img.string_ref(at + offset_of!(AliasEntry, mime_offset), canonical);
        }
        aliases.len()
    }

    fn write_parents(&self, img: &mut Image) -> usize {
        let mut entries: Vec<(&str, &[String])> = self
            .registry
            .parent_entries()
            .filter(|(_, parents)| !parents.is_empty())
            .collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));

        img.push_u32(entries.len() as u32);
        let mut slots = Vec::with_capacity(entries.len());
        for (name, _) in &entries {
            let at = img.push_record(&ParentEntry {
                mime_offset: U32::new(0),
                parents_offset: U32::new(0),
            });
            img.string_ref(at + offset_of!(ParentEntry, mime_offset), name);
            slots.push(at);
        }
        for (at, (_, parents)) in slots.into_iter().zip(&entries) {
            let list = img.pos();
            img.set_u32(at + offset_of!(ParentEntry, parents_offset), list as u32);
            img.push_u32(parents.len() as u32);
            for parent in parents.iter() {
                let slot = img.pos();
                img.push_u32(0);
                img.string_ref(slot, parent);
            }
        }
        entries.len()
    }

    /// Writes matchers with at least one rule, highest priority first. Equal
    /// priorities keep registration order.
    fn write_magic(&self, img: &mut Image) -> usize {
        let mut matchers: Vec<&MagicRuleMatcher> = self
            .registry
            .magic_matchers()
            .iter()
            .filter(|m| !m.roots().is_empty())
            .collect();
        matchers.sort_by(|a, b| b.priority().cmp(&a.priority()));
        let max_extent = matchers.iter().map(|m| m.extent()).max().unwrap_or(0);

        let header = img.pos();
        img.push_record(&MagicListHeader {
            match_count: U32::new(matchers.len() as u32),
            max_extent: U32::new(u32::try_from(max_extent).unwrap_or(u32::MAX)),
            first_match: U32::new(0),
        });
        let first_match = img.pos();
        img.set_u32(
            header + offset_of!(MagicListHeader, first_match),
            first_match as u32,
        );

        let mut slots = Vec::with_capacity(matchers.len());
        for matcher in &matchers {
            let at = img.push_record(&MagicMatch {
                priority: U32::new(matcher.priority()),
                mime_offset: U32::new(0),
                matchlet_count: U32::new(0),
                first_matchlet: U32::new(0),
            });
            img.string_ref(at + offset_of!(MagicMatch, mime_offset), matcher.mime_type());
            slots.push(at);
        }
        for (at, matcher) in slots.into_iter().zip(&matchers) {
            let (count, first) = write_matchlets(img, matcher, matcher.roots());
            img.set_u32(at + offset_of!(MagicMatch, matchlet_count), count as u32);
            img.set_u32(at + offset_of!(MagicMatch, first_matchlet), first as u32);
        }
        matchers.len()
    }

    fn write_icons(&self, img: &mut Image, generic: bool) {
        let icons: Vec<(String, String)> = self
            .registry
            .all_mime_types()
            .into_iter()
            .filter_map(|t| {
                let icon = if generic {
                    t.generic_icon_name()
                } else {
                    t.icon_name()
                };
                (!icon.is_empty()).then(|| (t.name().to_string(), icon.to_string()))
            })
            .collect();
        img.push_u32(icons.len() as u32);
        for (name, icon) in &icons {
            let at = img.push_record(&IconEntry {
                mime_offset: U32::new(0),
                icon_offset: U32::new(0),
            });
            img.string_ref(at + offset_of!(IconEntry, mime_offset), name);
            img.string_ref(at + offset_of!(IconEntry, icon_offset), icon);
        }
    }
}

fn write_glob_list(img: &mut Image, globs: &[&GlobPattern]) {
    img.push_u32(globs.len() as u32);
    for glob in globs {
        let at = img.push_record(&GlobEntry {
            pattern_offset: U32::new(0),
            mime_offset: U32::new(0),
            flags_and_weight: U32::new(pack_flags(glob.weight(), glob.mode().is_case_sensitive())),
        });
        img.string_ref(at + offset_of!(GlobEntry, pattern_offset), glob.pattern());
        img.string_ref(at + offset_of!(GlobEntry, mime_offset), glob.mime_type());
    }
}

/// Trie over reversed suffixes; leaves record where a pattern ends.
#[derive(Debug, Default)]
struct TrieNode {
    leaves: Vec<(String, u32)>,
    children: BTreeMap<char, TrieNode>,
}

impl TrieNode {
    fn insert(&mut self, suffix: &str, mime_type: &str, flags: u32) {
        let mut node = self;
        for ch in suffix.chars().rev() {
            node = node.children.entry(ch).or_default();
        }
        if !node.leaves.iter().any(|(m, f)| m == mime_type && *f == flags) {
            node.leaves.push((mime_type.to_string(), flags));
        }
    }
}

fn write_suffix_tree(img: &mut Image, globs: &[&GlobPattern]) {
    let mut root = TrieNode::default();
    for glob in globs {
        if let Some(text) = glob.fixed_text() {
            let flags = pack_flags(glob.weight(), glob.mode().is_case_sensitive());
            root.insert(&text, glob.mime_type(), flags);
        }
    }
    let header = img.pos();
    img.push_u32(0);
    img.push_u32(0);
    let (count, first) = write_trie(img, &root);
    img.set_u32(header, count as u32);
    img.set_u32(header + 4, first as u32);
}

/// Writes a node's entry array (leaves first, then children by code point)
/// followed by each child's array. Returns `(entries, first_entry)`.
fn write_trie(img: &mut Image, node: &TrieNode) -> (usize, usize) {
    let first = img.pos();
    for (mime_type, flags) in &node.leaves {
        let at = img.push_record(&SuffixNode {
            char_code: U32::new(0),
            child_count: U32::new(0),
            first_child: U32::new(*flags),
        });
        img.string_ref(at + offset_of!(SuffixNode, child_count), mime_type);
    }
    let mut slots = Vec::with_capacity(node.children.len());
    for (ch, child) in &node.children {
        let at = img.push_record(&SuffixNode {
            char_code: U32::new(*ch as u32),
            child_count: U32::new(0),
            first_child: U32::new(0),
        });
        slots.push((at, child));
    }
    for (at, child) in slots {
        let (count, child_first) = write_trie(img, child);
        img.set_u32(at + offset_of!(SuffixNode, child_count), count as u32);
        img.set_u32(at + offset_of!(SuffixNode, first_child), child_first as u32);
    }
    (node.leaves.len() + node.children.len(), first)
}

/// Writes the matchlet array for `ids`, then each matchlet's children.
fn write_matchlets(img: &mut Image, matcher: &MagicRuleMatcher, ids: &[RuleId]) -> (usize, usize) {
    let rules: Vec<_> = ids.iter().filter_map(|&id| matcher.rule(id)).collect();
    let first = img.pos();
    let mut slots = Vec::with_capacity(rules.len());
    for rule in &rules {
        // Rule ranges end at or before MAX_OFFSET, so both fit in 32 bits
        let at = img.push_record(&Matchlet {
            range_start: U32::new(rule.start() as u32),
            range_length: U32::new((rule.end() - rule.start() + 1) as u32),
            word_size: U32::new(1),
            value_length: U32::new(rule.value().len() as u32),
            value_offset: U32::new(0),
            mask_offset: U32::new(0),
            child_count: U32::new(0),
            first_child: U32::new(0),
        });
        img.bytes_ref(at + offset_of!(Matchlet, value_offset), rule.value());
        if let Some(mask) = rule.mask() {
            img.bytes_ref(at + offset_of!(Matchlet, mask_offset), mask);
        }
        slots.push((at, rule));
    }
    for (at, rule) in slots {
        let (count, child_first) = write_matchlets(img, matcher, rule.children());
        img.set_u32(at + offset_of!(Matchlet, child_count), count as u32);
        img.set_u32(at + offset_of!(Matchlet, first_child), child_first as u32);
    }
    (rules.len(), first)
}

/// Growing cache image plus the pool of referenced strings and byte values.
struct Image {
    data: Vec<u8>,
    pool: Vec<Vec<u8>>,
    pool_ids: FxHashMap<Vec<u8>, usize>,
    patches: Vec<(usize, usize)>,
}

impl Image {
    fn new() -> Self {
        let mut data = vec![0u8; HEADER_SIZE];
        data[0..2].copy_from_slice(&MAJOR_VERSION.to_be_bytes());
        data[2..4].copy_from_slice(&WRITE_MINOR_VERSION.to_be_bytes());
        Self {
            data,
            pool: Vec::new(),
            pool_ids: FxHashMap::default(),
            patches: Vec::new(),
        }
    }

    fn pos(&self) -> usize {
        self.data.len()
    }

    fn push_u32(&mut self, value: u32) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    fn set_u32(&mut self, at: usize, value: u32) {
        self.data[at..at + 4].copy_from_slice(&value.to_be_bytes());
    }

    /// Points the header slot at `pos` to the current end of the image.
    fn set_section(&mut self, pos: usize) {
        let here = self.pos() as u32;
        self.set_u32(pos, here);
    }

    fn push_record<T: IntoBytes + Immutable>(&mut self, record: &T) -> usize {
        let at = self.pos();
        self.data.extend_from_slice(record.as_bytes());
        at
    }

    fn string_ref(&mut self, at: usize, s: &str) {
        let mut bytes = Vec::with_capacity(s.len() + 1);
        bytes.extend_from_slice(s.as_bytes());
        bytes.push(0);
        self.pool_ref(at, bytes);
    }

    fn bytes_ref(&mut self, at: usize, bytes: &[u8]) {
        self.pool_ref(at, bytes.to_vec());
    }

    fn pool_ref(&mut self, at: usize, bytes: Vec<u8>) {
        let id = match self.pool_ids.get(&bytes) {
            Some(&id) => id,
            None => {
                let id = self.pool.len();
                self.pool.push(bytes.clone());
                self.pool_ids.insert(bytes, id);
                id
            }
        };
        self.patches.push((at, id));
    }

    /// Appends the pool and resolves every reference into it.
    fn finish(mut self) -> Result<Vec<u8>> {
        let mut offsets = Vec::with_capacity(self.pool.len());
        for bytes in std::mem::take(&mut self.pool) {
            offsets.push(self.pos());
            self.data.extend_from_slice(&bytes);
        }
        if self.data.len() > u32::MAX as usize {
            return Err(MimeError::CorruptCache(format!(
                "cache image of {} bytes exceeds 32-bit offsets",
                self.data.len()
            )));
        }
        for (at, id) in std::mem::take(&mut self.patches) {
            let offset = offsets[id] as u32;
            self.set_u32(at, offset);
        }
        Ok(self.data)
    }
}
