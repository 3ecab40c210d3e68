//! Type hierarchy helpers: the implicit fallback parent and bounded
//! ancestor traversal.

use std::collections::VecDeque;

/// The plain-text root type.
pub const TEXT_PLAIN: &str = "text/plain";

/// The root of every regular-file type.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Groups that do not describe file contents and get no implicit parent.
const NON_FILE_GROUPS: [&str; 5] = ["inode", "all", "fonts", "print", "uri"];

/// Default bound on ancestor traversal depth.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Implicit parent for a type with no declared parents.
///
/// `text/*` derives from `text/plain`; every other real-file type derives
/// from `application/octet-stream`.
///
/// ```
/// use mimedb::hierarchy::fallback_parent;
///
/// assert_eq!(fallback_parent("text/x-foo"), Some("text/plain"));
/// assert_eq!(fallback_parent("application/x-bar"), Some("application/octet-stream"));
/// assert_eq!(fallback_parent("inode/directory"), None);
/// ```
pub fn fallback_parent(mime_type: &str) -> Option<&'static str> {
    let group = mime_type.split('/').next().unwrap_or(mime_type);
    if group == "text" && mime_type != TEXT_PLAIN {
        return Some(TEXT_PLAIN);
    }
    if !NON_FILE_GROUPS.contains(&group) && mime_type != OCTET_STREAM {
        return Some(OCTET_STREAM);
    }
    None
}

/// Declared parents, or the fallback parent when none are declared.
pub fn with_fallback(mime_type: &str, declared: Vec<String>) -> Vec<String> {
    if declared.is_empty() {
        fallback_parent(mime_type)
            .map(|p| vec![p.to_string()])
            .unwrap_or_default()
    } else {
        declared
    }
}

/// Breadth-first ancestors of `mime_type`, nearest first, without duplicates.
///
/// `parents` returns the direct parents of a type. Traversal stops after
/// `max_depth` levels and never revisits a type, so a cyclic hierarchy
/// terminates.
pub fn ancestors<F>(mime_type: &str, max_depth: usize, mut parents: F) -> Vec<String>
where
    F: FnMut(&str) -> Vec<String>,
{
    let mut seen = vec![mime_type.to_string()];
    let mut out = Vec::new();
    let mut queue = VecDeque::from([(mime_type.to_string(), 0usize)]);

    while let Some((current, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }
        for parent in parents(&current) {
            if seen.contains(&parent) {
                continue;
            }
            seen.push(parent.clone());
            out.push(parent.clone());
            queue.push_back((parent, depth + 1));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_parent() {
        assert_eq!(fallback_parent("text/x-foo"), Some(TEXT_PLAIN));
        assert_eq!(fallback_parent("text/plain"), Some(OCTET_STREAM));
        assert_eq!(fallback_parent("application/x-bar"), Some(OCTET_STREAM));
        assert_eq!(fallback_parent("image/png"), Some(OCTET_STREAM));
        assert_eq!(fallback_parent(OCTET_STREAM), None);
        for group in NON_FILE_GROUPS {
            assert_eq!(fallback_parent(&format!("{}/thing", group)), None);
        }
    }

    #[test]
    fn test_with_fallback_keeps_declared() {
        let declared = vec!["application/xml".to_string()];
        assert_eq!(with_fallback("image/svg+xml", declared.clone()), declared);
        assert_eq!(with_fallback("inode/directory", Vec::new()), Vec::<String>::new());
    }

    #[test]
    fn test_ancestors_order() {
        let chain = |t: &str| -> Vec<String> {
            match t {
                "image/svg+xml" => vec!["application/xml".into()],
                "application/xml" => vec!["text/plain".into()],
                "text/plain" => vec![OCTET_STREAM.into()],
                _ => vec![],
            }
        };
        assert_eq!(
            ancestors("image/svg+xml", DEFAULT_MAX_DEPTH, chain),
            vec!["application/xml", "text/plain", OCTET_STREAM]
        );
    }

    #[test]
    fn test_ancestors_cycle_terminates() {
        let cyclic = |t: &str| -> Vec<String> {
            match t {
                "a/a" => vec!["a/b".into()],
                "a/b" => vec!["a/a".into()],
                _ => vec![],
            }
        };
        assert_eq!(ancestors("a/a", DEFAULT_MAX_DEPTH, cyclic), vec!["a/b"]);
    }

    #[test]
    fn test_ancestors_depth_bound() {
        let endless = |t: &str| -> Vec<String> { vec![format!("{}x", t)] };
        assert_eq!(ancestors("a/", 3, endless).len(), 3);
    }
}
