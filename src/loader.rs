//! Definition package loader.
//!
//! Reads shared-mime-info `<mime-info>` XML and replays every record into a
//! [`TypeRegistry`]. The element walk is driven by [`next_state`], a pure
//! transition function over [`ParseState`].
//!
//! Bad records (an unparsable glob, an unsupported match type, a missing
//! attribute) are logged with `warn!` and skipped. An element that is not
//! allowed where it appears rejects the whole package, and the registry is
//! left unchanged.
//!
//! # Example
//!
//! ```
//! use mimedb::loader::load_str;
//! use mimedb::TypeRegistry;
//!
//! let xml = r#"<?xml version="1.0"?>
//! <mime-info xmlns="http://www.freedesktop.org/standards/shared-mime-info">
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
//! let stats = load_str(&mut registry, xml)?;
//! assert_eq!(stats.types, 1);
//! assert_eq!(registry.find_by_name("a.bmp").types, vec!["image/bmp"]);
//! # Ok::<(), mimedb::MimeError>(())
//! ```

use crate::error::{MimeError, Result};
use crate::glob::{GlobPattern, MatchMode, DEFAULT_WEIGHT};
use crate::magic::{MagicRule, MagicRuleMatcher, RuleId, DEFAULT_PRIORITY};
use crate::mime_type::{MimeType, MimeTypeBuilder};
use crate::registry::TypeRegistry;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use rustc_hash::FxHashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, warn};

const TAG_MIME_INFO: &str = "mime-info";
const TAG_MIME_TYPE: &str = "mime-type";
const TAG_COMMENT: &str = "comment";
const TAG_GENERIC_ICON: &str = "generic-icon";
const TAG_ICON: &str = "icon";
const TAG_GLOB: &str = "glob";
const TAG_SUB_CLASS_OF: &str = "sub-class-of";
const TAG_ALIAS: &str = "alias";
const TAG_MAGIC: &str = "magic";
const TAG_MATCH: &str = "match";

/// Where the walk is in the element tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseState {
    /// Before the root element
    Beginning,
    /// Inside `<mime-info>`
    MimeInfo,
    /// Inside `<mime-type>`
    MimeType,
    /// `<comment>`
    Comment,
    /// `<generic-icon>`
    GenericIcon,
    /// `<icon>`
    Icon,
    /// `<glob>`
    GlobPattern,
    /// `<sub-class-of>`
    SubClass,
    /// `<alias>`
    Alias,
    /// `<magic>`
    Magic,
    /// `<match>`, at any depth
    MagicMatchRule,
    /// Any other element inside a `<mime-type>`; ignored
    OtherMimeTypeSubTag,
    /// Element not allowed here
    Error,
}

/// Next state after opening the element `tag` in `current`.
///
/// ```
/// use mimedb::loader::{next_state, ParseState};
///
/// assert_eq!(next_state(ParseState::Beginning, "mime-info"), ParseState::MimeInfo);
/// assert_eq!(next_state(ParseState::MimeType, "x-custom"), ParseState::OtherMimeTypeSubTag);
/// assert_eq!(next_state(ParseState::Magic, "glob"), ParseState::Error);
/// ```
pub fn next_state(current: ParseState, tag: &str) -> ParseState {
    match current {
        ParseState::Beginning => match tag {
            TAG_MIME_INFO => ParseState::MimeInfo,
            TAG_MIME_TYPE => ParseState::MimeType,
            _ => ParseState::Error,
        },
        ParseState::MimeInfo => {
            if tag == TAG_MIME_TYPE {
                ParseState::MimeType
            } else {
                ParseState::Error
            }
        }
        ParseState::MimeType
        | ParseState::Comment
        | ParseState::GenericIcon
        | ParseState::Icon
        | ParseState::GlobPattern
        | ParseState::SubClass
        | ParseState::Alias
        | ParseState::OtherMimeTypeSubTag
        | ParseState::MagicMatchRule => match tag {
            TAG_MIME_TYPE => ParseState::MimeType,
            TAG_COMMENT => ParseState::Comment,
            TAG_GENERIC_ICON => ParseState::GenericIcon,
            TAG_ICON => ParseState::Icon,
            TAG_GLOB => ParseState::GlobPattern,
            TAG_SUB_CLASS_OF => ParseState::SubClass,
            TAG_ALIAS => ParseState::Alias,
            TAG_MAGIC => ParseState::Magic,
            TAG_MATCH => ParseState::MagicMatchRule,
            _ => ParseState::OtherMimeTypeSubTag,
        },
        ParseState::Magic => {
            if tag == TAG_MATCH {
                ParseState::MagicMatchRule
            } else {
                ParseState::Error
            }
        }
        ParseState::Error => ParseState::Error,
    }
}

/// Counts from one package.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    /// `<mime-type>` records added
    pub types: usize,
    /// Records skipped with a warning
    pub skipped: usize,
}

/// Loads the package at `path` into `registry`.
pub fn load_package<P: AsRef<Path>>(registry: &mut TypeRegistry, path: P) -> Result<LoadStats> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let source = path.display().to_string();
    let stats = load_reader(registry, BufReader::new(file), &source)?;
    debug!(path = %source, types = stats.types, skipped = stats.skipped, "loaded package");
    Ok(stats)
}

/// Loads a package held in memory.
pub fn load_str(registry: &mut TypeRegistry, xml: &str) -> Result<LoadStats> {
    load_reader(registry, xml.as_bytes(), "<memory>")
}

/// Loads a package from any buffered reader; `source` names it in messages.
pub fn load_reader<R: BufRead>(
    registry: &mut TypeRegistry,
    input: R,
    source: &str,
) -> Result<LoadStats> {
    let mut reader = Reader::from_reader(input);
    reader.config_mut().trim_text(true);

    let mut package = PackageParser::new(source);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => package.start(&e)?,
            Event::Empty(e) => {
                package.start(&e)?;
                package.end(&tag_name(&e));
            }
            Event::End(e) => {
                let tag = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                package.end(&tag);
            }
            Event::Text(t) => {
                if package.wants_text() {
                    package.text(&t.unescape()?);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    let stats = package.stats;
    registry.merge(package.registry);
    Ok(stats)
}

fn tag_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attributes(e: &BytesStart<'_>) -> Result<FxHashMap<String, String>> {
    let mut attrs = FxHashMap::default();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| MimeError::Xml(err.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        attrs.insert(key, attr.unescape_value()?.into_owned());
    }
    Ok(attrs)
}

/// Parse-time state for one package.
struct PackageParser<'s> {
    source: &'s str,
    state: ParseState,
    registry: TypeRegistry,
    stats: LoadStats,
    /// Name and record being built; `None` inside a skipped `<mime-type>`
    current: Option<(String, MimeTypeBuilder)>,
    /// Default-locale comment text collected so far
    comment: Option<String>,
    /// Matcher of the open `<magic>`; `None` when the block is skipped
    magic: Option<MagicRuleMatcher>,
    /// Inside a `<magic>` element, whether or not its matcher was kept
    in_magic: bool,
    /// One entry per open `<match>`; `None` marks a skipped rule
    rule_stack: Vec<Option<RuleId>>,
}

impl<'s> PackageParser<'s> {
    fn new(source: &'s str) -> Self {
        Self {
            source,
            state: ParseState::Beginning,
            registry: TypeRegistry::new(),
            stats: LoadStats::default(),
            current: None,
            comment: None,
            magic: None,
            in_magic: false,
            rule_stack: Vec::new(),
        }
    }

    fn skip(&mut self, what: &str, err: &dyn std::fmt::Display) {
        warn!(source = self.source, what, error = %err, "skipping definition record");
        self.stats.skipped += 1;
    }

    fn start(&mut self, e: &BytesStart<'_>) -> Result<()> {
        let tag = tag_name(e);
        self.state = next_state(self.state, &tag);
        let attrs = attributes(e)?;
        let attr = |name: &str| attrs.get(name).map(String::as_str).unwrap_or("");

        match self.state {
            ParseState::MimeType => {
                let name = attr("type");
                if name.is_empty() {
                    self.skip(TAG_MIME_TYPE, &"missing 'type' attribute");
                    self.current = None;
                } else {
                    self.current = Some((name.to_string(), MimeType::builder(name)));
                }
            }
            ParseState::Comment => {
                // Localized comments are not stored
                self.comment = attr("xml:lang").is_empty().then(String::new);
            }
            ParseState::GenericIcon => {
                let icon = attr("name").to_string();
                self.update(|b| b.generic_icon_name(icon));
            }
            ParseState::Icon => {
                let icon = attr("name").to_string();
                self.update(|b| b.icon_name(icon));
            }
            ParseState::GlobPattern => {
                self.glob(attr("pattern"), attr("weight"), attr("case-sensitive"))
            }
            ParseState::SubClass => {
                let parent = attr("type");
                if let Some(name) = self.current_name() {
                    if parent.is_empty() {
                        self.skip(TAG_SUB_CLASS_OF, &"missing 'type' attribute");
                    } else {
                        self.registry.add_parent(&name, parent);
                    }
                }
            }
            ParseState::Alias => {
                let alias = attr("type");
                if let Some(name) = self.current_name() {
                    if alias.is_empty() {
                        self.skip(TAG_ALIAS, &"missing 'type' attribute");
                    } else {
                        self.registry.add_alias(alias, &name);
                    }
                }
            }
            ParseState::Magic => {
                self.rule_stack.clear();
                self.magic = None;
                self.in_magic = true;
                if let Some(name) = self.current_name() {
                    match attr("priority") {
                        "" => self.magic = Some(MagicRuleMatcher::new(&name, DEFAULT_PRIORITY)),
                        text => match text.trim().parse::<u32>() {
                            Ok(priority) => {
                                self.magic = Some(MagicRuleMatcher::new(&name, priority))
                            }
                            Err(_) => self.skip(
                                TAG_MAGIC,
                                &MimeError::MalformedDefinition(format!(
                                    "not a number '{}'",
                                    text
                                )),
                            ),
                        },
                    }
                }
            }
            ParseState::MagicMatchRule => {
                let mask = attrs.get("mask").map(String::as_str);
                let id = self.match_rule(attr("type"), attr("value"), attr("offset"), mask);
                self.rule_stack.push(id);
            }
            ParseState::Error => {
                return Err(MimeError::MalformedDefinition(format!(
                    "unexpected element <{}> in {}",
                    tag, self.source
                )));
            }
            ParseState::Beginning | ParseState::MimeInfo | ParseState::OtherMimeTypeSubTag => {}
        }
        Ok(())
    }

    fn end(&mut self, tag: &str) {
        match tag {
            TAG_MIME_TYPE => {
                if let Some((_, builder)) = self.current.take() {
                    self.registry.add_mime_type(builder.build());
                    self.stats.types += 1;
                }
            }
            TAG_COMMENT => {
                if let Some(text) = self.comment.take() {
                    self.update(|b| b.comment(text));
                }
            }
            TAG_MATCH => {
                self.rule_stack.pop();
            }
            TAG_MAGIC => {
                if let Some(matcher) = self.magic.take() {
                    if !matcher.is_empty() {
                        self.registry.add_magic_matcher(matcher);
                    }
                }
                self.rule_stack.clear();
                self.in_magic = false;
                // An empty <magic/> may be followed by more sub-tags
                if self.state == ParseState::Magic {
                    self.state = ParseState::MimeType;
                }
            }
            _ => {}
        }
    }

    fn current_name(&self) -> Option<String> {
        self.current.as_ref().map(|(name, _)| name.clone())
    }

    fn wants_text(&self) -> bool {
        self.comment.is_some()
    }

    fn text(&mut self, text: &str) {
        if let Some(comment) = &mut self.comment {
            comment.push_str(text);
        }
    }

    fn update(&mut self, f: impl FnOnce(MimeTypeBuilder) -> MimeTypeBuilder) {
        if let Some((name, builder)) = self.current.take() {
            self.current = Some((name, f(builder)));
        }
    }

    fn glob(&mut self, pattern: &str, weight: &str, case_sensitive: &str) {
        let Some((name, _)) = &self.current else {
            return;
        };
        // Unparsable weights fall back to the default, like a missing one
        let weight = weight.trim().parse::<u32>().unwrap_or(DEFAULT_WEIGHT);
        let mode = MatchMode::from_flag(case_sensitive == "true");
        match GlobPattern::new(pattern, name, weight, mode) {
            Ok(glob) => {
                self.registry.add_glob_pattern(glob);
                let pattern = pattern.to_string();
                self.update(|b| b.glob_pattern(pattern));
            }
            Err(err) => self.skip(TAG_GLOB, &err),
        }
    }

    /// Adds a `<match>` under the innermost open one. Returns `None` when the
    /// rule (and so its subtree) is skipped.
    fn match_rule(
        &mut self,
        kind: &str,
        value: &str,
        offset: &str,
        mask: Option<&str>,
    ) -> Option<RuleId> {
        if !self.in_magic {
            if self.current.is_some() && self.rule_stack.is_empty() {
                self.skip(TAG_MATCH, &"<match> outside <magic>");
            }
            return None;
        }
        let parent = match self.rule_stack.last() {
            None => None,
            Some(Some(id)) => Some(*id),
            // Parent was skipped
            Some(None) => return None,
        };
        let matcher = self.magic.as_mut()?;
        let added = MagicRule::parse(kind, value, offset, mask)
            .and_then(|rule| matcher.add_rule(parent, rule));
        match added {
            Ok(id) => Some(id),
            Err(err) => {
                self.skip(TAG_MATCH, &err);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    const PACKAGE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<mime-info xmlns="http://www.freedesktop.org/standards/shared-mime-info">
  <mime-type type="application/x-bzip-compressed-tar">
    <comment>Tar archive (bzip-compressed)</comment>
    <comment xml:lang="de">Tar-Archiv (bzip-komprimiert)</comment>
    <sub-class-of type="application/x-bzip"/>
    <generic-icon name="package-x-generic"/>
    <glob pattern="*.tar.bz2"/>
    <glob pattern="*.tbz2" weight="60"/>
  </mime-type>
  <mime-type type="application/x-bzip">
    <glob pattern="*.bz2"/>
    <alias type="application/x-bzip2"/>
    <magic priority="50">
      <match type="string" value="BZh" offset="0"/>
    </magic>
  </mime-type>
  <mime-type type="image/bmp">
    <icon name="image-bmp"/>
    <glob pattern="*.BMP" case-sensitive="true"/>
    <x-vendor-hint level="3"/>
    <magic priority="80">
      <match type="string" value="BM" offset="0">
        <match type="byte" value="0x28" offset="14"/>
      </match>
    </magic>
  </mime-type>
</mime-info>"#;

    fn load(xml: &str) -> (TypeRegistry, Result<LoadStats>) {
        let mut registry = TypeRegistry::new();
        let result = load_str(&mut registry, xml);
        (registry, result)
    }

    #[test]
    fn test_transitions() {
        use ParseState as S;
        assert_eq!(next_state(S::Beginning, "mime-type"), S::MimeType);
        assert_eq!(next_state(S::Beginning, "glob"), S::Error);
        assert_eq!(next_state(S::MimeInfo, "glob"), S::Error);
        assert_eq!(next_state(S::MimeType, "glob"), S::GlobPattern);
        assert_eq!(next_state(S::GlobPattern, "mime-type"), S::MimeType);
        assert_eq!(next_state(S::Magic, "match"), S::MagicMatchRule);
        assert_eq!(next_state(S::MagicMatchRule, "match"), S::MagicMatchRule);
        assert_eq!(next_state(S::MagicMatchRule, "alias"), S::Alias);
        assert_eq!(next_state(S::Error, "mime-type"), S::Error);
    }

    #[test]
    fn test_load_package() {
        let (registry, result) = load(PACKAGE);
        let stats = result.unwrap();
        assert_eq!(stats, LoadStats { types: 3, skipped: 0 });

        let tar = registry
            .mime_type_for_name("application/x-bzip-compressed-tar")
            .unwrap();
        assert_eq!(tar.comment(), "Tar archive (bzip-compressed)");
        assert_eq!(tar.generic_icon_name(), "package-x-generic");
        assert_eq!(tar.glob_patterns(), &["*.tar.bz2".to_string(), "*.tbz2".to_string()]);

        assert_eq!(
            registry.find_by_name("x.tar.bz2").types,
            vec!["application/x-bzip-compressed-tar"]
        );
        assert_eq!(
            registry.parents("application/x-bzip-compressed-tar"),
            vec!["application/x-bzip"]
        );
        assert_eq!(registry.resolve_alias("application/x-bzip2"), "application/x-bzip");
        assert_eq!(registry.mime_type_for_name("image/bmp").unwrap().icon_name(), "image-bmp");
        assert!(registry.find_by_name("a.bmp").is_empty());
        assert_eq!(registry.find_by_name("a.BMP").types, vec!["image/bmp"]);
    }

    #[test]
    fn test_nested_magic() {
        let (registry, result) = load(PACKAGE);
        result.unwrap();
        let mut data = vec![0u8; 20];
        data[..2].copy_from_slice(b"BM");
        data[14] = 0x28;
        assert_eq!(registry.find_by_data(&data).unwrap().mime_type, "image/bmp");
        data[14] = 0;
        assert!(registry.find_by_data(&data).is_none());
        assert_eq!(
            registry.find_by_data(b"BZh91AY").unwrap().mime_type,
            "application/x-bzip"
        );
    }

    #[traced_test]
    #[test]
    fn test_unsupported_match_skips_subtree() {
        let xml = r#"<mime-info>
  <mime-type type="application/x-test">
    <magic>
      <match type="regex" value="a+" offset="0">
        <match type="string" value="never" offset="0"/>
      </match>
      <match type="string" value="TEST" offset="0:4"/>
    </magic>
  </mime-type>
</mime-info>"#;
        let (registry, result) = load(xml);
        assert_eq!(result.unwrap().skipped, 1);
        assert!(logs_contain("skipping definition record"));
        let matcher = &registry.magic_matchers()[0];
        assert_eq!(matcher.len(), 1);
        assert_eq!(matcher.priority(), DEFAULT_PRIORITY);
        assert!(registry.find_by_data(b"xxTEST").is_some());
        assert!(registry.find_by_data(b"never").is_none());
    }

    #[test]
    fn test_bad_records_skipped() {
        let xml = r#"<mime-info>
  <mime-type>
    <glob pattern="*.orphan"/>
  </mime-type>
  <mime-type type="text/x-ok">
    <glob pattern="file[abc"/>
    <glob pattern="*.ok" weight="bogus"/>
    <match type="byte" value="" offset="0"/>
    <magic priority="high"><match type="string" value="x" offset="0"/></magic>
  </mime-type>
</mime-info>"#;
        let (registry, result) = load(xml);
        let stats = result.unwrap();
        assert_eq!(stats.types, 1);
        assert_eq!(stats.skipped, 4);
        assert!(registry.find_by_name("a.orphan").is_empty());
        assert_eq!(registry.find_by_name("a.ok").types, vec!["text/x-ok"]);
        assert!(registry.magic_matchers().is_empty());
    }

    #[traced_test]
    #[test]
    fn test_match_outside_magic_is_skipped() {
        let xml = r#"<mime-info>
  <mime-type type="text/x-stray">
    <match type="string" value="STRAY" offset="0">
      <match type="string" value="NESTED" offset="0"/>
    </match>
    <glob pattern="*.stray"/>
  </mime-type>
</mime-info>"#;
        let (registry, result) = load(xml);
        assert_eq!(result.unwrap(), LoadStats { types: 1, skipped: 1 });
        assert!(logs_contain("outside <magic>"));
        assert!(registry.magic_matchers().is_empty());
        assert_eq!(registry.find_by_name("a.stray").types, vec!["text/x-stray"]);
    }

    #[test]
    fn test_unexpected_element_rejects_package() {
        let mut registry = TypeRegistry::new();
        load_str(
            &mut registry,
            r#"<mime-info><mime-type type="text/x-keep"/></mime-info>"#,
        )
        .unwrap();

        let bad = r#"<mime-info>
  <mime-type type="text/x-a">
    <glob pattern="*.a"/>
    <magic><glob pattern="*.b"/></magic>
  </mime-type>
</mime-info>"#;
        assert!(matches!(
            load_str(&mut registry, bad),
            Err(MimeError::MalformedDefinition(_))
        ));
        assert!(load_str(&mut registry, r#"<glob pattern="*.c"/>"#).is_err());

        assert!(registry.mime_type_for_name("text/x-keep").is_some());
        assert!(registry.mime_type_for_name("text/x-a").is_none());
        assert!(registry.find_by_name("x.a").is_empty());
    }

    #[test]
    fn test_malformed_xml() {
        let mut registry = TypeRegistry::new();
        let result = load_str(&mut registry, "<mime-info><mime-type type=\"a/b\"></mime-info>");
        assert!(matches!(result, Err(MimeError::Xml(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_load_package_file() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(PACKAGE.as_bytes()).unwrap();
        file.flush().unwrap();
        let mut registry = TypeRegistry::new();
        let stats = load_package(&mut registry, file.path()).unwrap();
        assert_eq!(stats.types, 3);
        assert!(load_package(&mut registry, "/nonexistent/package.xml").is_err());
    }
}
