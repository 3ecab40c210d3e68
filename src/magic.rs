//! Content sniffing with nested magic rules.
//!
//! A [`MagicRuleMatcher`] owns the rule tree for one MIME type. Rules live in
//! an arena and refer to their children by [`RuleId`], so a loader can build
//! the tree with a plain stack of parent ids while it streams definitions.
//!
//! ```
//! use mimedb::magic::{MagicRule, MagicRuleMatcher};
//!
//! let mut bmp = MagicRuleMatcher::new("image/bmp", 80);
//! let root = bmp.add_rule(None, MagicRule::parse("string", "BM", "0", None)?)?;
//! bmp.add_rule(Some(root), MagicRule::parse("byte", "0x28", "14", None)?)?;
//!
//! let mut data = vec![0u8; 32];
//! data[..2].copy_from_slice(b"BM");
//! data[14] = 0x28;
//! assert_eq!(bmp.matches(&data), 80);
//! data[14] = 0x0c;
//! assert_eq!(bmp.matches(&data), 0);
//! # Ok::<(), mimedb::MimeError>(())
//! ```

use crate::error::{MimeError, Result};
use std::fmt;
use std::str::FromStr;

/// Priority given to `<magic>` blocks that do not declare one.
pub const DEFAULT_PRIORITY: u32 = 50;

/// Largest offset a rule range may end at. Ranges must fit the 32-bit
/// fields of the binary cache.
pub const MAX_OFFSET: usize = u32::MAX as usize - 1;

/// Index of a rule inside its matcher's arena.
pub type RuleId = usize;

/// How a rule's value is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MagicKind {
    /// Byte string, compared as-is
    String,
    /// Single byte
    Byte,
    /// 16-bit big-endian integer
    Big16,
    /// 32-bit big-endian integer
    Big32,
    /// 16-bit little-endian integer
    Little16,
    /// 32-bit little-endian integer
    Little32,
    /// 16-bit integer in the byte order of the running host
    Host16,
    /// 32-bit integer in the byte order of the running host
    Host32,
}

impl MagicKind {
    /// Token used in definition files.
    pub fn as_str(self) -> &'static str {
        match self {
            MagicKind::String => "string",
            MagicKind::Byte => "byte",
            MagicKind::Big16 => "big16",
            MagicKind::Big32 => "big32",
            MagicKind::Little16 => "little16",
            MagicKind::Little32 => "little32",
            MagicKind::Host16 => "host16",
            MagicKind::Host32 => "host32",
        }
    }

    /// Width in bytes of numeric kinds; `None` for strings.
    pub fn width(self) -> Option<usize> {
        match self {
            MagicKind::String => None,
            MagicKind::Byte => Some(1),
            MagicKind::Big16 | MagicKind::Little16 | MagicKind::Host16 => Some(2),
            MagicKind::Big32 | MagicKind::Little32 | MagicKind::Host32 => Some(4),
        }
    }

    /// Encodes a number in this kind's byte order.
    fn encode(self, n: u32) -> Vec<u8> {
        match self {
            MagicKind::String | MagicKind::Byte => vec![n as u8],
            MagicKind::Big16 => (n as u16).to_be_bytes().to_vec(),
            MagicKind::Little16 => (n as u16).to_le_bytes().to_vec(),
            MagicKind::Host16 => (n as u16).to_ne_bytes().to_vec(),
            MagicKind::Big32 => n.to_be_bytes().to_vec(),
            MagicKind::Little32 => n.to_le_bytes().to_vec(),
            MagicKind::Host32 => n.to_ne_bytes().to_vec(),
        }
    }
}

impl FromStr for MagicKind {
    type Err = MimeError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "string" => MagicKind::String,
            "byte" => MagicKind::Byte,
            "big16" => MagicKind::Big16,
            "big32" => MagicKind::Big32,
            "little16" => MagicKind::Little16,
            "little32" => MagicKind::Little32,
            "host16" => MagicKind::Host16,
            "host32" => MagicKind::Host32,
            other => return Err(MimeError::UnsupportedMagicKind(other.to_string())),
        })
    }
}

impl fmt::Display for MagicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single byte-range test.
///
/// The rule passes when `value` (under `mask`) occurs at some offset in
/// `start..=end` and every child rule passes as well. Children are extra
/// conditions on the same buffer, not anchored to where the parent matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagicRule {
    kind: MagicKind,
    value: Vec<u8>,
    mask: Option<Vec<u8>>,
    start: usize,
    end: usize,
    children: Vec<RuleId>,
}

impl MagicRule {
    /// Creates a rule from already-encoded value and mask bytes.
    ///
    /// # Errors
    ///
    /// [`MimeError::MalformedDefinition`] if the value is empty, the mask
    /// length differs from the value length, `start > end` or `end` is past
    /// [`MAX_OFFSET`].
    pub fn new(
        kind: MagicKind,
        value: Vec<u8>,
        mask: Option<Vec<u8>>,
        start: usize,
        end: usize,
    ) -> Result<Self> {
        if value.is_empty() {
            return Err(MimeError::MalformedDefinition(
                "empty match value".to_string(),
            ));
        }
        if let Some(m) = &mask {
            if m.len() != value.len() {
                return Err(MimeError::MalformedDefinition(format!(
                    "mask length {} does not match value length {}",
                    m.len(),
                    value.len()
                )));
            }
        }
        if start > end {
            return Err(MimeError::MalformedDefinition(format!(
                "offset range {}:{} is reversed",
                start, end
            )));
        }
        if end > MAX_OFFSET {
            return Err(MimeError::MalformedDefinition(format!(
                "offset {} is past {}",
                end, MAX_OFFSET
            )));
        }
        Ok(Self {
            kind,
            value,
            mask,
            start,
            end,
            children: Vec::new(),
        })
    }

    /// Builds a rule from the textual attributes of a `<match>` element.
    ///
    /// `offset` is `"N"` or `"N:M"`. Numeric values accept decimal, `0x` hex
    /// and leading-zero octal; string values accept C escapes. String masks
    /// are `0x` hex byte strings, numeric masks are numbers.
    pub fn parse(kind: &str, value: &str, offset: &str, mask: Option<&str>) -> Result<Self> {
        let kind: MagicKind = kind.parse()?;
        if value.is_empty() {
            return Err(MimeError::MalformedDefinition(
                "empty match value".to_string(),
            ));
        }
        let (start, end) = parse_offset(offset)?;
        let value_bytes = match kind {
            MagicKind::String => unescape(value)?,
            _ => kind.encode(parse_number(value, kind)?),
        };
        let mask_bytes = match mask.filter(|m| !m.is_empty()) {
            None => None,
            Some(m) if kind == MagicKind::String => Some(parse_hex_bytes(m)?),
            Some(m) => Some(kind.encode(parse_number(m, kind)?)),
        };
        Self::new(kind, value_bytes, mask_bytes, start, end)
    }

    /// Value encoding.
    pub fn kind(&self) -> MagicKind {
        self.kind
    }

    /// Expected bytes.
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Mask bytes, same length as the value.
    pub fn mask(&self) -> Option<&[u8]> {
        self.mask.as_deref()
    }

    /// First offset where the value may start.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Last offset where the value may start.
    pub fn end(&self) -> usize {
        self.end
    }

    /// Child rule ids in declaration order.
    pub fn children(&self) -> &[RuleId] {
        &self.children
    }

    /// Tests only this rule's own byte range, ignoring children.
    pub fn matches_range(&self, data: &[u8]) -> bool {
        match_range(data, &self.value, self.mask.as_deref(), self.start, self.end)
    }
}

/// Tests `value` under `mask` at every offset of `start..=end`.
///
/// Shared with the binary cache, which evaluates matchlets straight from the
/// mapped bytes.
pub(crate) fn match_range(
    data: &[u8],
    value: &[u8],
    mask: Option<&[u8]>,
    start: usize,
    end: usize,
) -> bool {
    if value.is_empty() || start >= data.len() {
        return false;
    }
    let window_end = end.saturating_add(value.len()).min(data.len());
    if window_end < start + value.len() {
        return false;
    }
    let window = &data[start..window_end];
    match mask {
        None => memchr::memmem::find(window, value).is_some(),
        Some(mask) => window.windows(value.len()).any(|candidate| {
            candidate
                .iter()
                .zip(value)
                .zip(mask)
                .all(|((d, v), m)| d & m == v & m)
        }),
    }
}

/// The rule tree and priority for one MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagicRuleMatcher {
    mime_type: String,
    priority: u32,
    rules: Vec<MagicRule>,
    roots: Vec<RuleId>,
}

impl MagicRuleMatcher {
    /// Creates an empty matcher.
    pub fn new(mime_type: &str, priority: u32) -> Self {
        Self {
            mime_type: mime_type.to_string(),
            priority,
            rules: Vec::new(),
            roots: Vec::new(),
        }
    }

    /// Owning type name.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Priority (higher is tried first across types).
    pub fn priority(&self) -> u32 {
        self.priority
    }

    /// Adds `rule` as a top-level rule (`parent == None`) or as the last
    /// child of `parent`. Returns the new rule's id.
    ///
    /// Parents always precede their children in the arena, so the tree can
    /// not contain cycles.
    pub fn add_rule(&mut self, parent: Option<RuleId>, mut rule: MagicRule) -> Result<RuleId> {
        let id = self.rules.len();
        rule.children.clear();
        match parent {
            None => self.roots.push(id),
            Some(p) => {
                let parent_rule = self.rules.get_mut(p).ok_or_else(|| {
                    MimeError::MalformedDefinition(format!("unknown parent rule {}", p))
                })?;
                parent_rule.children.push(id);
            }
        }
        self.rules.push(rule);
        Ok(id)
    }

    /// Top-level rule ids.
    pub fn roots(&self) -> &[RuleId] {
        &self.roots
    }

    /// Rule by id.
    pub fn rule(&self, id: RuleId) -> Option<&MagicRule> {
        self.rules.get(id)
    }

    /// Total number of rules in the tree.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True when no rule was added.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// True if any top-level rule passes on `data`.
    pub fn evaluate(&self, data: &[u8]) -> bool {
        self.roots.iter().any(|&id| self.evaluate_rule(id, data))
    }

    /// Accuracy of this matcher on `data`: its priority on success, 0 otherwise.
    pub fn matches(&self, data: &[u8]) -> u32 {
        if self.evaluate(data) {
            self.priority
        } else {
            0
        }
    }

    /// Number of leading bytes the rules can look at.
    pub fn extent(&self) -> usize {
        self.rules
            .iter()
            .map(|r| r.end.saturating_add(r.value.len()))
            .max()
            .unwrap_or(0)
    }

    fn evaluate_rule(&self, id: RuleId, data: &[u8]) -> bool {
        let rule = &self.rules[id];
        rule.matches_range(data)
            && rule
                .children
                .iter()
                .all(|&child| self.evaluate_rule(child, data))
    }
}

/// Highest-accuracy matcher for `data`; at equal accuracy the first one wins.
pub fn best_match<'a, I>(matchers: I, data: &[u8]) -> Option<(&'a MagicRuleMatcher, u32)>
where
    I: IntoIterator<Item = &'a MagicRuleMatcher>,
{
    let mut best: Option<(&MagicRuleMatcher, u32)> = None;
    for matcher in matchers {
        let accuracy = matcher.matches(data);
        if accuracy > best.map_or(0, |(_, a)| a) {
            best = Some((matcher, accuracy));
        }
    }
    best
}

fn parse_offset(text: &str) -> Result<(usize, usize)> {
    let parse = |s: &str| {
        s.trim().parse::<usize>().map_err(|_| {
            MimeError::MalformedDefinition(format!("not a number '{}' in offset", s))
        })
    };
    match text.split_once(':') {
        Some((a, b)) => Ok((parse(a)?, parse(b)?)),
        None => {
            let n = parse(text)?;
            Ok((n, n))
        }
    }
}

fn parse_number(text: &str, kind: MagicKind) -> Result<u32> {
    let t = text.trim();
    let parsed = if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else if t.len() > 1 && t.starts_with('0') {
        u32::from_str_radix(&t[1..], 8)
    } else {
        t.parse::<u32>()
    };
    let n = parsed
        .map_err(|_| MimeError::MalformedDefinition(format!("not a number '{}'", text)))?;
    let limit = match kind.width() {
        Some(1) => u8::MAX as u32,
        Some(2) => u16::MAX as u32,
        _ => u32::MAX,
    };
    if n > limit {
        return Err(MimeError::MalformedDefinition(format!(
            "value {} does not fit a {} match",
            text, kind
        )));
    }
    Ok(n)
}

fn parse_hex_bytes(text: &str) -> Result<Vec<u8>> {
    let hex = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    if hex.is_empty() || hex.len() % 2 != 0 {
        return Err(MimeError::MalformedDefinition(format!("bad mask '{}'", text)));
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|_| MimeError::MalformedDefinition(format!("bad mask '{}'", text)))
        })
        .collect()
}

/// Decodes C-style escapes in a string match value.
fn unescape(text: &str) -> Result<Vec<u8>> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'\\' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        i += 1;
        let esc = *bytes.get(i).ok_or_else(|| {
            MimeError::MalformedDefinition(format!("trailing backslash in '{}'", text))
        })?;
        match esc {
            b'n' => out.push(b'\n'),
            b't' => out.push(b'\t'),
            b'r' => out.push(b'\r'),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0c),
            b'v' => out.push(0x0b),
            b'x' => {
                let digits: Vec<u8> = bytes[i + 1..]
                    .iter()
                    .take(2)
                    .take_while(|b| b.is_ascii_hexdigit())
                    .copied()
                    .collect();
                if digits.is_empty() {
                    return Err(MimeError::MalformedDefinition(format!(
                        "bad \\x escape in '{}'",
                        text
                    )));
                }
                let s = std::str::from_utf8(&digits).unwrap_or("0");
                out.push(u8::from_str_radix(s, 16).unwrap_or(0));
                i += digits.len();
            }
            b'0'..=b'7' => {
                let digits: Vec<u8> = bytes[i..]
                    .iter()
                    .take(3)
                    .take_while(|b| (b'0'..=b'7').contains(*b))
                    .copied()
                    .collect();
                let s = std::str::from_utf8(&digits).unwrap_or("0");
                let n = u16::from_str_radix(s, 8).unwrap_or(0);
                out.push(n as u8);
                i += digits.len() - 1;
            }
            other => out.push(other),
        }
        i += 1;
    }
    Ok(out)
}
