//! Binary layout of the shared-mime-info `mime.cache` file.
//!
//! # Layout
//!
//! ```text
//! [Header]
//!   major: u16                  // 1
//!   minor: u16                  // 1 or 2
//!   alias_list: u32             // @4
//!   parent_list: u32            // @8
//!   literal_list: u32           // @12
//!   reverse_suffix_tree: u32    // @16
//!   glob_list: u32              // @20
//!   magic_list: u32             // @24
//!   namespace_list: u32         // @28 (unused)
//!   icons_list: u32             // @32
//!   generic_icons_list: u32     // @36
//!
//! [AliasList]      count: u32, AliasEntry[count]         sorted by alias
//! [ParentList]     count: u32, ParentEntry[count]        sorted by type
//!                  each parents array: count: u32, name offsets: u32[count]
//! [LiteralList]    count: u32, GlobEntry[count]
//! [GlobList]       count: u32, GlobEntry[count]
//! [ReverseSuffixTree]
//!                  root_count: u32, first_root: u32
//!                  nodes: SuffixNode arrays sorted by char code;
//!                  a leaf has char 0 and stores (0, type offset, flags)
//! [MagicList]      count: u32, max_extent: u32, first_match: u32
//!                  MagicMatch[count] sorted by priority descending
//!                  Matchlet trees referenced by the matches
//! [IconsList]      count: u32, IconEntry[count]          sorted by type
//! [Strings]        NUL-terminated
//! ```
//!
//! All integers are big-endian. Records are declared with zerocopy's
//! big-endian integer types so they can be read from any byte offset.

use crate::error::MimeError;
use zerocopy::byteorder::{BigEndian, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Supported major version.
pub const MAJOR_VERSION: u16 = 1;

/// Lowest supported minor version.
pub const MIN_MINOR_VERSION: u16 = 1;

/// Highest supported minor version.
pub const MAX_MINOR_VERSION: u16 = 2;

/// Minor version written by the cache writer.
pub const WRITE_MINOR_VERSION: u16 = 2;

/// Size of the fixed header.
pub const HEADER_SIZE: usize = 40;

/// Header positions of the section offsets.
pub const POS_ALIAS_LIST: usize = 4;
/// Parent list offset position.
pub const POS_PARENT_LIST: usize = 8;
/// Literal list offset position.
pub const POS_LITERAL_LIST: usize = 12;
/// Reverse suffix tree offset position.
pub const POS_REVERSE_SUFFIX_TREE: usize = 16;
/// Glob list offset position.
pub const POS_GLOB_LIST: usize = 20;
/// Magic list offset position.
pub const POS_MAGIC_LIST: usize = 24;
/// Namespace list offset position (reserved, never read).
pub const POS_NAMESPACE_LIST: usize = 28;
/// Icons list offset position.
pub const POS_ICONS_LIST: usize = 32;
/// Generic icons list offset position.
pub const POS_GENERIC_ICONS_LIST: usize = 36;

/// Bits of `flags_and_weight` holding the weight.
pub const WEIGHT_MASK: u32 = 0xff;

/// Bit of `flags_and_weight` marking a case-sensitive pattern.
pub const CASE_SENSITIVE_FLAG: u32 = 0x100;

/// Accepts exactly major 1, minor 1..=2.
pub fn check_version(major: u16, minor: u16) -> Result<(), MimeError> {
    if major == MAJOR_VERSION && (MIN_MINOR_VERSION..=MAX_MINOR_VERSION).contains(&minor) {
        Ok(())
    } else {
        Err(MimeError::InvalidCacheVersion { major, minor })
    }
}

/// Splits `flags_and_weight` into (weight, case_sensitive).
pub fn split_flags(flags_and_weight: u32) -> (u32, bool) {
    (
        flags_and_weight & WEIGHT_MASK,
        flags_and_weight & CASE_SENSITIVE_FLAG != 0,
    )
}

/// Packs a weight and case flag into `flags_and_weight`.
pub fn pack_flags(weight: u32, case_sensitive: bool) -> u32 {
    let flags = if case_sensitive { CASE_SENSITIVE_FLAG } else { 0 };
    (weight.min(WEIGHT_MASK)) | flags
}

/// Literal/glob list record (12 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct GlobEntry {
    /// Offset of the pattern string
    pub pattern_offset: U32<BigEndian>,
    /// Offset of the type name
    pub mime_offset: U32<BigEndian>,
    /// Weight in the low byte, `0x100` = case-sensitive
    pub flags_and_weight: U32<BigEndian>,
}

/// Reverse suffix tree record (12 bytes).
///
/// Interior nodes use `(char_code, child_count, first_child)`; leaves use
/// `(0, mime_offset, flags_and_weight)`.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct SuffixNode {
    /// Unicode code point, 0 for a leaf
    pub char_code: U32<BigEndian>,
    /// Child count, or type offset for a leaf
    pub child_count: U32<BigEndian>,
    /// First child offset, or flags for a leaf
    pub first_child: U32<BigEndian>,
}

/// Alias list record (8 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct AliasEntry {
    /// Offset of the alias name
    pub alias_offset: U32<BigEndian>,
    /// Offset of the canonical name
    pub mime_offset: U32<BigEndian>,
}

/// Parent list record (8 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct ParentEntry {
    /// Offset of the type name
    pub mime_offset: U32<BigEndian>,
    /// Offset of the length-prefixed parent name offsets
    pub parents_offset: U32<BigEndian>,
}

/// Icons list record (8 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct IconEntry {
    /// Offset of the type name
    pub mime_offset: U32<BigEndian>,
    /// Offset of the icon name
    pub icon_offset: U32<BigEndian>,
}

/// Magic list header (12 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct MagicListHeader {
    /// Number of matches
    pub match_count: U32<BigEndian>,
    /// Largest number of bytes any matchlet inspects
    pub max_extent: U32<BigEndian>,
    /// Offset of the first match
    pub first_match: U32<BigEndian>,
}

/// One type's magic block (16 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct MagicMatch {
    /// Priority of the block
    pub priority: U32<BigEndian>,
    /// Offset of the type name
    pub mime_offset: U32<BigEndian>,
    /// Number of top-level matchlets
    pub matchlet_count: U32<BigEndian>,
    /// Offset of the first top-level matchlet
    pub first_matchlet: U32<BigEndian>,
}

/// One byte-range test (32 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct Matchlet {
    /// First offset to test
    pub range_start: U32<BigEndian>,
    /// Number of offsets to test
    pub range_length: U32<BigEndian>,
    /// 1 for byte data, 2/4 for host-order words stored big-endian
    pub word_size: U32<BigEndian>,
    /// Length of value (and mask)
    pub value_length: U32<BigEndian>,
    /// Offset of the value bytes
    pub value_offset: U32<BigEndian>,
    /// Offset of the mask bytes, 0 for no mask
    pub mask_offset: U32<BigEndian>,
    /// Number of child matchlets
    pub child_count: U32<BigEndian>,
    /// Offset of the first child matchlet
    pub first_child: U32<BigEndian>,
}
