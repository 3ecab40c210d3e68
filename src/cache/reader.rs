//! Queries over a mapped `mime.cache`.
//!
//! [`CacheReader`] answers name, content, parent, alias and icon queries
//! straight from the mapped bytes. Each query runs as a fallible internal
//! walk; when the walk hits a corrupt offset the error is logged through
//! [`CacheFile::report_corruption`] and the query reports "no match".

use crate::cache::file::CacheFile;
use crate::cache::format::{
    split_flags, AliasEntry, GlobEntry, IconEntry, MagicListHeader, MagicMatch, Matchlet,
    ParentEntry, SuffixNode, POS_ALIAS_LIST, POS_GENERIC_ICONS_LIST, POS_GLOB_LIST,
    POS_ICONS_LIST, POS_LITERAL_LIST, POS_MAGIC_LIST, POS_PARENT_LIST, POS_REVERSE_SUFFIX_TREE,
};
use crate::error::{MimeError, Result};
use crate::glob::{fold, normalize_weight, GlobPattern, MatchMode};
use crate::glob_list::{GlobMatch, GlobMatchResult};
use crate::hierarchy::with_fallback;
use crate::magic::match_range;
use crate::mime_type::MimeType;
use crate::provider::DataMatch;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::trace;
use zerocopy::{FromBytes, Immutable, KnownLayout};

const GLOB_ENTRY_SIZE: usize = 12;
const SUFFIX_NODE_SIZE: usize = 12;
const PAIR_ENTRY_SIZE: usize = 8;
const MAGIC_MATCH_SIZE: usize = 16;
const MATCHLET_SIZE: usize = 32;

/// Deepest matchlet nesting accepted before the tree is treated as corrupt.
const MAX_MATCHLET_DEPTH: usize = 64;

/// Matchlets evaluated per magic block before giving up.
const MATCHLET_BUDGET: usize = 1 << 16;

/// Deepest suffix-tree path walked by a lookup or a listing.
const MAX_SUFFIX_DEPTH: usize = 255;

/// Node visits allowed while listing the whole suffix tree.
const SUFFIX_NODE_BUDGET: usize = 1 << 20;

/// Per-type data gathered while scanning every table.
#[derive(Debug, Default)]
struct RecordParts {
    patterns: Vec<String>,
    icon: String,
    generic_icon: String,
}

impl RecordParts {
    fn add_pattern(&mut self, pattern: String) {
        if !self.patterns.contains(&pattern) {
            self.patterns.push(pattern);
        }
    }

    fn into_mime_type(self, name: &str) -> MimeType {
        let mut builder = MimeType::builder(name)
            .icon_name(self.icon)
            .generic_icon_name(self.generic_icon);
        for pattern in self.patterns {
            builder = builder.glob_pattern(pattern);
        }
        builder.build()
    }
}

/// Per-type data keyed by type name.
type Records = BTreeMap<String, RecordParts>;

/// Read-only view of one cache file.
#[derive(Debug)]
pub struct CacheReader {
    file: CacheFile,
}

impl CacheReader {
    /// Maps and validates the cache at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            file: CacheFile::open(path)?,
        })
    }

    /// Validates an in-memory cache image.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Ok(Self {
            file: CacheFile::from_bytes(data)?,
        })
    }

    /// Wraps an already validated file.
    pub fn from_file(file: CacheFile) -> Self {
        Self { file }
    }

    /// Underlying file.
    pub fn file(&self) -> &CacheFile {
        &self.file
    }

    /// Short description used in logs.
    pub fn describe(&self) -> String {
        let (major, minor) = self.file.version();
        match self.file.source() {
            Some(path) => format!("cache {} (v{}.{})", path.display(), major, minor),
            None => format!("cache <memory> (v{}.{})", major, minor),
        }
    }

    // ---- public, infallible queries ----

    /// Feeds this cache's literal, suffix-tree and glob matches into `result`.
    ///
    /// Matches are committed only when the whole walk succeeds, so a corrupt
    /// table never leaves a partial answer behind.
    pub fn match_name(&self, file_name: &str, result: &mut GlobMatchResult) {
        let mut local = result.clone();
        if self
            .guarded(file_name, || self.try_match_name(file_name, &mut local))
            .is_some()
        {
            *result = local;
        }
    }

    /// Best type name(s) for `file_name` from this cache alone.
    pub fn find_by_name(&self, file_name: &str) -> GlobMatch {
        let mut result = GlobMatchResult::new();
        self.match_name(file_name, &mut result);
        result.into_match()
    }

    /// Highest-priority magic block matching `data`.
    pub fn find_by_data(&self, data: &[u8]) -> Option<DataMatch> {
        self.guarded("<data>", || self.try_find_by_data(data))
            .flatten()
    }

    /// Record for a type mentioned anywhere in the cache.
    pub fn mime_type_for_name(&self, name: &str) -> Option<MimeType> {
        let mut records = self.guarded(name, || self.collect_records(Some(name)))?;
        records
            .remove(name)
            .map(|parts| parts.into_mime_type(name))
    }

    /// Parents listed in the parent table.
    pub fn declared_parents(&self, name: &str) -> Vec<String> {
        self.guarded(name, || self.try_parents(name))
            .unwrap_or_default()
    }

    /// Declared parents, or the fallback parent.
    pub fn parents(&self, name: &str) -> Vec<String> {
        with_fallback(name, self.declared_parents(name))
    }

    /// Canonical name for an alias.
    pub fn lookup_alias(&self, name: &str) -> Option<String> {
        self.guarded(name, || self.lookup_pair(POS_ALIAS_LIST, name))
            .flatten()
    }

    /// Canonical name, or `name` itself.
    pub fn resolve_alias(&self, name: &str) -> String {
        self.lookup_alias(name).unwrap_or_else(|| name.to_string())
    }

    /// Icon name for a type.
    pub fn icon_name(&self, name: &str) -> Option<String> {
        self.guarded(name, || self.lookup_pair(POS_ICONS_LIST, name))
            .flatten()
    }

    /// Generic icon name for a type.
    pub fn generic_icon_name(&self, name: &str) -> Option<String> {
        self.guarded(name, || self.lookup_pair(POS_GENERIC_ICONS_LIST, name))
            .flatten()
    }

    /// Every type named in any table, sorted by name.
    pub fn all_mime_types(&self) -> Vec<MimeType> {
        self.guarded("<all>", || self.collect_records(None))
            .unwrap_or_default()
            .into_iter()
            .map(|(name, parts)| parts.into_mime_type(&name))
            .collect()
    }

    /// Leading bytes the magic table can inspect.
    pub fn magic_extent(&self) -> Option<usize> {
        self.guarded("<magic extent>", || {
            let header: MagicListHeader = self.file.record(self.section(POS_MAGIC_LIST)?)?;
            Ok(header.max_extent.get() as usize)
        })
    }

    fn guarded<T>(&self, query: &str, f: impl FnOnce() -> Result<T>) -> Option<T> {
        match f() {
            Ok(value) => Some(value),
            Err(err) => {
                self.file.report_corruption(query, &err);
                None
            }
        }
    }

    // ---- table walks ----

    fn section(&self, pos: usize) -> Result<usize> {
        self.file.read_offset(pos)
    }

    /// `count` records of `size` bytes at `first` must lie inside the file.
    fn check_array(&self, first: usize, count: usize, size: usize) -> Result<()> {
        let len = count
            .checked_mul(size)
            .ok_or_else(|| MimeError::CorruptCache(format!("array of {} entries", count)))?;
        self.file.get_slice(first, len).map(|_| ())
    }

    /// `(count, first_entry)` of a list section, validated against the file.
    fn list(&self, pos: usize, entry_size: usize) -> Result<(usize, usize)> {
        let off = self.section(pos)?;
        let count = self.file.read_offset(off)?;
        let first = off + 4;
        self.check_array(first, count, entry_size)?;
        Ok((count, first))
    }

    fn entry<T>(&self, first: usize, index: usize, size: usize) -> Result<T>
    where
        T: FromBytes + KnownLayout + Immutable,
    {
        self.file.record(first + index * size)
    }

    fn try_match_name(&self, file_name: &str, result: &mut GlobMatchResult) -> Result<()> {
        self.match_literals(file_name, result)?;
        self.match_suffix_tree(file_name, result)?;
        self.match_globs(file_name, result)
    }

    fn match_literals(&self, file_name: &str, result: &mut GlobMatchResult) -> Result<()> {
        let (count, first) = self.list(POS_LITERAL_LIST, GLOB_ENTRY_SIZE)?;
        let folded: String = file_name.chars().map(fold).collect();
        for i in 0..count {
            let entry: GlobEntry = self.entry(first, i, GLOB_ENTRY_SIZE)?;
            let literal = self.file.read_cstr(entry.pattern_offset.get() as usize)?;
            let (weight, case_sensitive) = split_flags(entry.flags_and_weight.get());
            let hit = if case_sensitive {
                literal == file_name
            } else {
                literal.chars().map(fold).eq(folded.chars())
            };
            if hit {
                let mime_type = self.file.read_cstr(entry.mime_offset.get() as usize)?;
                result.add_match(mime_type, normalize_weight(weight), literal);
            }
        }
        Ok(())
    }

    fn match_globs(&self, file_name: &str, result: &mut GlobMatchResult) -> Result<()> {
        let (count, first) = self.list(POS_GLOB_LIST, GLOB_ENTRY_SIZE)?;
        for i in 0..count {
            let entry: GlobEntry = self.entry(first, i, GLOB_ENTRY_SIZE)?;
            let pattern = self.file.read_cstr(entry.pattern_offset.get() as usize)?;
            let mime_type = self.file.read_cstr(entry.mime_offset.get() as usize)?;
            let (weight, case_sensitive) = split_flags(entry.flags_and_weight.get());
            let glob = match GlobPattern::new(
                pattern,
                mime_type,
                weight,
                MatchMode::from_flag(case_sensitive),
            ) {
                Ok(glob) => glob,
                Err(err) => {
                    trace!(pattern, error = %err, "skipping unusable cached glob");
                    continue;
                }
            };
            if glob.matches(file_name) {
                result.add_match(mime_type, glob.weight(), pattern);
            }
        }
        Ok(())
    }

    /// Walks the reverse suffix tree once over the folded name (accepting
    /// case-insensitive leaves) and once over the name as given (accepting
    /// case-sensitive leaves).
    fn match_suffix_tree(&self, file_name: &str, result: &mut GlobMatchResult) -> Result<()> {
        let off = self.section(POS_REVERSE_SUFFIX_TREE)?;
        let root_count = self.file.read_offset(off)?;
        let first_root = self.file.read_offset(off + 4)?;
        let exact: Vec<char> = file_name.chars().collect();
        if exact.is_empty() {
            return Ok(());
        }
        let folded: Vec<char> = exact.iter().copied().map(fold).collect();
        self.suffix_node(result, root_count, first_root, &folded, folded.len(), false)?;
        self.suffix_node(result, root_count, first_root, &exact, exact.len(), true)?;
        Ok(())
    }

    /// Matches `name[remaining - 1]` against the sibling array at `first`.
    ///
    /// After a hit, deeper matches win; only when nothing deeper matched are
    /// the leading leaves of the node collected. The leaf scan stops at the
    /// first non-leaf child.
    fn suffix_node(
        &self,
        result: &mut GlobMatchResult,
        count: usize,
        first: usize,
        name: &[char],
        remaining: usize,
        case_sensitive_pass: bool,
    ) -> Result<bool> {
        if remaining == 0 || count == 0 {
            return Ok(false);
        }
        if name.len() - remaining > MAX_SUFFIX_DEPTH {
            return Err(MimeError::CorruptCache(format!(
                "suffix tree deeper than {}",
                MAX_SUFFIX_DEPTH
            )));
        }
        self.check_array(first, count, SUFFIX_NODE_SIZE)?;
        let wanted = name[remaining - 1] as u32;

        let (mut lo, mut hi) = (0usize, count);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let node: SuffixNode = self.entry(first, mid, SUFFIX_NODE_SIZE)?;
            match node.char_code.get().cmp(&wanted) {
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid,
                Ordering::Equal => {
                    let remaining = remaining - 1;
                    let child_count = node.child_count.get() as usize;
                    let first_child = node.first_child.get() as usize;
                    let mut success = remaining > 0
                        && self.suffix_node(
                            result,
                            child_count,
                            first_child,
                            name,
                            remaining,
                            case_sensitive_pass,
                        )?;
                    if !success {
                        success = self.suffix_leaves(
                            result,
                            child_count,
                            first_child,
                            name,
                            remaining,
                            case_sensitive_pass,
                        )?;
                    }
                    return Ok(success);
                }
            }
        }
        Ok(false)
    }

    fn suffix_leaves(
        &self,
        result: &mut GlobMatchResult,
        count: usize,
        first: usize,
        name: &[char],
        remaining: usize,
        case_sensitive_pass: bool,
    ) -> Result<bool> {
        let mut success = false;
        for i in 0..count {
            let leaf: SuffixNode = self.entry(first, i, SUFFIX_NODE_SIZE)?;
            if leaf.char_code.get() != 0 {
                break;
            }
            let (weight, case_sensitive) = split_flags(leaf.first_child.get());
            if case_sensitive != case_sensitive_pass {
                continue;
            }
            let mime_type = self.file.read_cstr(leaf.child_count.get() as usize)?;
            let pattern: String = std::iter::once('*')
                .chain(name[remaining..].iter().copied())
                .collect();
            result.add_match(mime_type, normalize_weight(weight), &pattern);
            success = true;
        }
        Ok(success)
    }

    /// Binary search over a sorted 8-byte `(key, value)` string table.
    fn lookup_pair(&self, pos: usize, name: &str) -> Result<Option<String>> {
        let (count, first) = self.list(pos, PAIR_ENTRY_SIZE)?;
        let (mut lo, mut hi) = (0usize, count);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let entry: AliasEntry = self.entry(first, mid, PAIR_ENTRY_SIZE)?;
            let key = self.file.read_cstr(entry.alias_offset.get() as usize)?;
            match key.as_bytes().cmp(name.as_bytes()) {
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid,
                Ordering::Equal => {
                    let value = self.file.read_cstr(entry.mime_offset.get() as usize)?;
                    return Ok(Some(value.to_string()));
                }
            }
        }
        Ok(None)
    }

    fn try_parents(&self, name: &str) -> Result<Vec<String>> {
        let (count, first) = self.list(POS_PARENT_LIST, PAIR_ENTRY_SIZE)?;
        let (mut lo, mut hi) = (0usize, count);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let entry: ParentEntry = self.entry(first, mid, PAIR_ENTRY_SIZE)?;
            let key = self.file.read_cstr(entry.mime_offset.get() as usize)?;
            match key.as_bytes().cmp(name.as_bytes()) {
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid,
                Ordering::Equal => return self.parent_names(entry.parents_offset.get() as usize),
            }
        }
        Ok(Vec::new())
    }

    fn parent_names(&self, off: usize) -> Result<Vec<String>> {
        let count = self.file.read_offset(off)?;
        self.check_array(off + 4, count, 4)?;
        (0..count)
            .map(|i| {
                let name_off = self.file.read_offset(off + 4 + 4 * i)?;
                Ok(self.file.read_cstr(name_off)?.to_string())
            })
            .collect()
    }

    fn try_find_by_data(&self, data: &[u8]) -> Result<Option<DataMatch>> {
        let off = self.section(POS_MAGIC_LIST)?;
        let header: MagicListHeader = self.file.record(off)?;
        let count = header.match_count.get() as usize;
        let first = header.first_match.get() as usize;
        self.check_array(first, count, MAGIC_MATCH_SIZE)?;

        let mut best: Option<DataMatch> = None;
        for i in 0..count {
            let block: MagicMatch = self.entry(first, i, MAGIC_MATCH_SIZE)?;
            let priority = block.priority.get();
            if priority <= best.as_ref().map_or(0, |b| b.accuracy) {
                continue;
            }
            let mut budget = MATCHLET_BUDGET;
            let hit = self.any_matchlet(
                block.matchlet_count.get() as usize,
                block.first_matchlet.get() as usize,
                data,
                0,
                &mut budget,
            )?;
            if hit {
                let mime_type = self.file.read_cstr(block.mime_offset.get() as usize)?;
                best = Some(DataMatch {
                    mime_type: mime_type.to_string(),
                    accuracy: priority,
                });
            }
        }
        Ok(best)
    }

    /// OR over a sibling array of matchlets.
    fn any_matchlet(
        &self,
        count: usize,
        first: usize,
        data: &[u8],
        depth: usize,
        budget: &mut usize,
    ) -> Result<bool> {
        self.check_array(first, count, MATCHLET_SIZE)?;
        for i in 0..count {
            if self.matchlet(first + i * MATCHLET_SIZE, data, depth, budget)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// One matchlet: its own range test AND every child.
    fn matchlet(&self, off: usize, data: &[u8], depth: usize, budget: &mut usize) -> Result<bool> {
        if depth >= MAX_MATCHLET_DEPTH {
            return Err(MimeError::CorruptCache(format!(
                "matchlet nesting deeper than {}",
                MAX_MATCHLET_DEPTH
            )));
        }
        *budget = budget.checked_sub(1).ok_or_else(|| {
            MimeError::CorruptCache("matchlet tree too large".to_string())
        })?;

        let m: Matchlet = self.file.record(off)?;
        let len = m.value_length.get() as usize;
        let value = self.file.get_slice(m.value_offset.get() as usize, len)?;
        let mask = match m.mask_offset.get() as usize {
            0 => None,
            mask_off => Some(self.file.get_slice(mask_off, len)?),
        };
        let start = m.range_start.get() as usize;
        let end = start + (m.range_length.get() as usize).saturating_sub(1);

        let word_size = m.word_size.get() as usize;
        let hit = if cfg!(target_endian = "little") && (word_size == 2 || word_size == 4) {
            let value = swap_words(value, word_size);
            let mask = mask.map(|mk| swap_words(mk, word_size));
            match_range(data, &value, mask.as_deref(), start, end)
        } else {
            match_range(data, value, mask, start, end)
        };
        if !hit {
            return Ok(false);
        }

        let child_count = m.child_count.get() as usize;
        let first_child = m.first_child.get() as usize;
        self.check_array(first_child, child_count, MATCHLET_SIZE)?;
        for i in 0..child_count {
            if !self.matchlet(first_child + i * MATCHLET_SIZE, data, depth + 1, budget)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    // ---- introspection ----

    /// Gathers every type name in the cache with the patterns and icons
    /// recorded for it. With `only`, other names are not kept.
    fn collect_records(&self, only: Option<&str>) -> Result<Records> {
        let mut records = Records::new();
        let touch = |records: &mut Records, name: &str| -> bool {
            if only.is_some_and(|o| o != name) {
                return false;
            }
            records.entry(name.to_string()).or_default();
            true
        };

        for pos in [POS_LITERAL_LIST, POS_GLOB_LIST] {
            let (count, first) = self.list(pos, GLOB_ENTRY_SIZE)?;
            for i in 0..count {
                let entry: GlobEntry = self.entry(first, i, GLOB_ENTRY_SIZE)?;
                let name = self.file.read_cstr(entry.mime_offset.get() as usize)?;
                if touch(&mut records, name) {
                    let pattern = self.file.read_cstr(entry.pattern_offset.get() as usize)?;
                    if let Some(parts) = records.get_mut(name) {
                        parts.add_pattern(pattern.to_string());
                    }
                }
            }
        }

        let off = self.section(POS_REVERSE_SUFFIX_TREE)?;
        let root_count = self.file.read_offset(off)?;
        let first_root = self.file.read_offset(off + 4)?;
        let mut path = Vec::new();
        let mut leaves = Vec::new();
        let mut budget = SUFFIX_NODE_BUDGET;
        self.suffix_leaves_all(root_count, first_root, &mut path, &mut leaves, &mut budget)?;
        for (name, pattern) in leaves {
            if touch(&mut records, &name) {
                if let Some(parts) = records.get_mut(&name) {
                    parts.add_pattern(pattern);
                }
            }
        }

        let (count, first) = self.list(POS_PARENT_LIST, PAIR_ENTRY_SIZE)?;
        for i in 0..count {
            let entry: ParentEntry = self.entry(first, i, PAIR_ENTRY_SIZE)?;
            touch(&mut records, self.file.read_cstr(entry.mime_offset.get() as usize)?);
            for parent in self.parent_names(entry.parents_offset.get() as usize)? {
                touch(&mut records, &parent);
            }
        }

        let (count, first) = self.list(POS_ALIAS_LIST, PAIR_ENTRY_SIZE)?;
        for i in 0..count {
            let entry: AliasEntry = self.entry(first, i, PAIR_ENTRY_SIZE)?;
            touch(&mut records, self.file.read_cstr(entry.mime_offset.get() as usize)?);
        }

        let magic: MagicListHeader = self.file.record(self.section(POS_MAGIC_LIST)?)?;
        let count = magic.match_count.get() as usize;
        let first = magic.first_match.get() as usize;
        self.check_array(first, count, MAGIC_MATCH_SIZE)?;
        for i in 0..count {
            let block: MagicMatch = self.entry(first, i, MAGIC_MATCH_SIZE)?;
            touch(&mut records, self.file.read_cstr(block.mime_offset.get() as usize)?);
        }

        for (pos, generic) in [(POS_ICONS_LIST, false), (POS_GENERIC_ICONS_LIST, true)] {
            let (count, first) = self.list(pos, PAIR_ENTRY_SIZE)?;
            for i in 0..count {
                let entry: IconEntry = self.entry(first, i, PAIR_ENTRY_SIZE)?;
                let name = self.file.read_cstr(entry.mime_offset.get() as usize)?;
                if touch(&mut records, name) {
                    let icon = self.file.read_cstr(entry.icon_offset.get() as usize)?;
                    if let Some(parts) = records.get_mut(name) {
                        if generic {
                            parts.generic_icon = icon.to_string();
                        } else {
                            parts.icon = icon.to_string();
                        }
                    }
                }
            }
        }

        Ok(records)
    }

    /// Depth-first listing of every `(type, pattern)` leaf in the suffix tree.
    fn suffix_leaves_all(
        &self,
        count: usize,
        first: usize,
        path: &mut Vec<char>,
        leaves: &mut Vec<(String, String)>,
        budget: &mut usize,
    ) -> Result<()> {
        if path.len() > MAX_SUFFIX_DEPTH {
            return Err(MimeError::CorruptCache(format!(
                "suffix tree deeper than {}",
                MAX_SUFFIX_DEPTH
            )));
        }
        self.check_array(first, count, SUFFIX_NODE_SIZE)?;
        for i in 0..count {
            *budget = budget
                .checked_sub(1)
                .ok_or_else(|| MimeError::CorruptCache("suffix tree too large".to_string()))?;
            let node: SuffixNode = self.entry(first, i, SUFFIX_NODE_SIZE)?;
            match node.char_code.get() {
                0 => {
                    let name = self.file.read_cstr(node.child_count.get() as usize)?;
                    let pattern: String =
                        std::iter::once('*').chain(path.iter().rev().copied()).collect();
                    leaves.push((name.to_string(), pattern));
                }
                code => {
                    let ch = char::from_u32(code).ok_or_else(|| {
                        MimeError::CorruptCache(format!(
                            "invalid code point {:#x} in suffix tree",
                            code
                        ))
                    })?;
                    path.push(ch);
                    self.suffix_leaves_all(
                        node.child_count.get() as usize,
                        node.first_child.get() as usize,
                        path,
                        leaves,
                        budget,
                    )?;
                    path.pop();
                }
            }
        }
        Ok(())
    }
}

/// Reverses the bytes of every `word_size` chunk.
fn swap_words(bytes: &[u8], word_size: usize) -> Vec<u8> {
    let mut out = bytes.to_vec();
    for chunk in out.chunks_exact_mut(word_size) {
        chunk.reverse();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::format::{pack_flags, HEADER_SIZE};
    use tracing_test::traced_test;

    /// Hand-assembles a cache image with one suffix-tree branch for ".txt"
    /// and the given leaves under the final '.' node.
    fn suffix_cache(leaves: &[(u32, &str, u32)]) -> Vec<u8> {
        let mut data = vec![0u8; HEADER_SIZE];
        data[0..2].copy_from_slice(&1u16.to_be_bytes());
        data[2..4].copy_from_slice(&2u16.to_be_bytes());

        let push = |data: &mut Vec<u8>, v: u32| data.extend_from_slice(&v.to_be_bytes());
        let set = |data: &mut Vec<u8>, at: usize, v: u32| {
            data[at..at + 4].copy_from_slice(&v.to_be_bytes())
        };

        // One shared empty list serves every count-prefixed section.
        let empty = data.len() as u32;
        push(&mut data, 0);
        push(&mut data, 0);
        push(&mut data, 0);
        for pos in [
            POS_ALIAS_LIST,
            POS_PARENT_LIST,
            POS_LITERAL_LIST,
            POS_GLOB_LIST,
            POS_MAGIC_LIST,
            POS_ICONS_LIST,
            POS_GENERIC_ICONS_LIST,
        ] {
            set(&mut data, pos, empty);
        }

        // Strings
        let mut name_offsets = Vec::new();
        for (_, name, _) in leaves {
            name_offsets.push(data.len() as u32);
            data.extend_from_slice(name.as_bytes());
            data.push(0);
        }

        // Tree root: count, first
        let tree = data.len();
        set(&mut data, POS_REVERSE_SUFFIX_TREE, tree as u32);
        push(&mut data, 1);
        push(&mut data, (tree + 8) as u32);

        // Chain t <- x <- t <- '.', each node 12 bytes with one child
        let chain = ['t', 'x', 't', '.'];
        let nodes_start = tree + 8;
        let leaves_start = nodes_start + chain.len() * 12;
        for (i, ch) in chain.iter().enumerate() {
            let last = i == chain.len() - 1;
            push(&mut data, *ch as u32);
            push(&mut data, if last { leaves.len() as u32 } else { 1 });
            push(
                &mut data,
                if last {
                    leaves_start as u32
                } else {
                    (nodes_start + (i + 1) * 12) as u32
                },
            );
        }
        for ((code, _, flags), name_off) in leaves.iter().zip(&name_offsets) {
            push(&mut data, *code);
            push(&mut data, *name_off);
            push(&mut data, *flags);
        }
        data
    }

    #[test]
    fn test_suffix_tree_match() {
        let reader =
            CacheReader::from_bytes(suffix_cache(&[(0, "text/plain", pack_flags(50, false))]))
                .unwrap();
        let found = reader.find_by_name("notes.TXT");
        assert_eq!(found.types, vec!["text/plain"]);
        assert_eq!(found.suffix.as_deref(), Some("txt"));
        assert!(reader.find_by_name("notes.md").is_empty());
        assert!(reader.find_by_name("").is_empty());
    }

    #[test]
    fn test_suffix_tree_case_sensitive_leaf() {
        let reader =
            CacheReader::from_bytes(suffix_cache(&[(0, "text/x-exact", pack_flags(50, true))]))
                .unwrap();
        assert_eq!(reader.find_by_name("a.txt").types, vec!["text/x-exact"]);
        assert!(reader.find_by_name("a.TXT").is_empty());
    }

    #[test]
    fn test_leaf_scan_stops_at_first_non_leaf() {
        let reader = CacheReader::from_bytes(suffix_cache(&[
            (0, "text/plain", pack_flags(50, false)),
            ('z' as u32, "text/x-hidden-a", pack_flags(50, false)),
            (0, "text/x-hidden-b", pack_flags(50, false)),
        ]))
        .unwrap();
        assert_eq!(reader.find_by_name("a.txt").types, vec!["text/plain"]);
    }

    #[test]
    fn test_introspection_lists_suffix_patterns() {
        let reader =
            CacheReader::from_bytes(suffix_cache(&[(0, "text/plain", pack_flags(50, false))]))
                .unwrap();
        let all = reader.all_mime_types();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name(), "text/plain");
        assert_eq!(all[0].glob_patterns(), &["*.txt".to_string()]);
        assert!(reader.mime_type_for_name("text/plain").is_some());
        assert!(reader.mime_type_for_name("text/html").is_none());
    }

    #[test]
    fn test_corrupt_tree_gives_no_match() {
        let mut data = suffix_cache(&[(0, "text/plain", pack_flags(50, false))]);
        let tree = u32::from_be_bytes(data[16..20].try_into().unwrap()) as usize;
        // Point the root array far past the end of the buffer
        data[tree + 4..tree + 8].copy_from_slice(&0x00ff_ffffu32.to_be_bytes());
        let reader = CacheReader::from_bytes(data).unwrap();
        assert!(reader.find_by_name("a.txt").is_empty());
        assert!(reader.all_mime_types().is_empty());
        // Other tables still answer
        assert!(reader.declared_parents("text/plain").is_empty());
        assert_eq!(reader.parents("text/x-log"), vec!["text/plain"]);
    }

    /// Points the first '.txt' chain node back at its own sibling array.
    fn cyclic_suffix_cache() -> Vec<u8> {
        let mut data = suffix_cache(&[(0, "text/plain", pack_flags(50, false))]);
        let tree = u32::from_be_bytes(data[16..20].try_into().unwrap()) as usize;
        let nodes = tree + 8;
        data[nodes + 8..nodes + 12].copy_from_slice(&(nodes as u32).to_be_bytes());
        data
    }

    #[test]
    fn test_cyclic_suffix_tree_gives_no_match() {
        let reader = CacheReader::from_bytes(cyclic_suffix_cache()).unwrap();
        assert!(reader.find_by_name(&"t".repeat(100_000)).is_empty());
        assert!(reader.find_by_name("a.txt").is_empty());
        assert!(reader.all_mime_types().is_empty());
    }

    #[traced_test]
    #[test]
    fn test_corruption_warns_once() {
        let reader = CacheReader::from_bytes(cyclic_suffix_cache()).unwrap();
        assert!(reader.find_by_name(&"t".repeat(1000)).is_empty());
        assert!(reader.find_by_name(&"t".repeat(2000)).is_empty());

        logs_assert(|lines: &[&str]| {
            let warned = lines
                .iter()
                .filter(|l| l.contains("WARN") && l.contains("corrupt mime cache"))
                .count();
            let debugged = lines
                .iter()
                .filter(|l| l.contains("DEBUG") && l.contains("corrupt mime cache"))
                .count();
            match (warned, debugged) {
                (1, 1) => Ok(()),
                other => Err(format!("(warn, debug) lines = {:?}", other)),
            }
        });
    }

    #[test]
    fn test_swap_words() {
        assert_eq!(swap_words(&[1, 2, 3, 4], 2), vec![2, 1, 4, 3]);
        assert_eq!(swap_words(&[1, 2, 3, 4], 4), vec![4, 3, 2, 1]);
    }
}
