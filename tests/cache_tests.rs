//! Binary cache robustness: version gate, files on disk and damaged images.

use mimedb::{loader, CacheReader, CacheWriter, MimeDatabase, MimeError, TypeRegistry};
use proptest::prelude::*;
use std::path::PathBuf;
use std::sync::OnceLock;
use tempfile::TempDir;

fn package_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data/sample-types.xml")
}

fn compiled() -> &'static [u8] {
    static BYTES: OnceLock<Vec<u8>> = OnceLock::new();
    BYTES.get_or_init(|| {
        let mut registry = TypeRegistry::new();
        loader::load_package(&mut registry, package_path()).unwrap();
        CacheWriter::new(&registry).to_bytes().unwrap()
    })
}

/// Runs every query; damaged caches must answer without panicking.
fn exercise(reader: &CacheReader) {
    let _ = reader.find_by_name("backup.tar.bz2");
    let _ = reader.find_by_name("main.C");
    let _ = reader.find_by_name("Makefile");
    let _ = reader.find_by_data(b"BM\0\0\0\0\0\0\0\0\0\0\0\0\x28\0");
    let _ = reader.mime_type_for_name("image/png");
    let _ = reader.parents("application/x-shellscript");
    let _ = reader.resolve_alias("image/x-png");
    let _ = reader.all_mime_types();
    let _ = reader.magic_extent();
}

#[test]
fn test_open_from_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mime.cache");
    std::fs::write(&path, compiled()).unwrap();

    let reader = CacheReader::open(&path).unwrap();
    assert_eq!(reader.file().version(), (1, 2));
    assert_eq!(reader.find_by_name("x.sh").types, vec!["application/x-shellscript"]);
    assert!(reader.describe().contains("mime.cache"));
}

#[test]
fn test_version_gate_excludes_cache() {
    let mut bytes = compiled().to_vec();
    bytes[0..2].copy_from_slice(&2u16.to_be_bytes());

    let err = CacheReader::from_bytes(bytes.clone()).unwrap_err();
    assert!(matches!(err, MimeError::InvalidCacheVersion { major: 2, .. }));

    let dir = TempDir::new().unwrap();
    let bad = dir.path().join("mime.cache");
    std::fs::write(&bad, &bytes).unwrap();

    let db = MimeDatabase::builder()
        .cache_file(&bad)
        .package(package_path())
        .build();
    assert_eq!(db.providers().len(), 1);
    assert_eq!(
        db.find_by_name("backup.tar.bz2").types,
        vec!["application/x-bzip-compressed-tar"]
    );
}

#[test]
fn test_version_gate_alone_gives_empty_database() {
    let mut bytes = compiled().to_vec();
    bytes[2..4].copy_from_slice(&9u16.to_be_bytes());

    let dir = TempDir::new().unwrap();
    let bad = dir.path().join("mime.cache");
    std::fs::write(&bad, &bytes).unwrap();

    let db = MimeDatabase::builder().cache_file(&bad).build();
    assert!(db.providers().is_empty());
    assert!(db.find_by_name("a.png").is_empty());
    assert!(db.find_by_data(b"\x89PNG").is_none());
    assert_eq!(db.parents("image/png"), vec!["application/octet-stream"]);
}

#[test]
fn test_header_only_is_rejected_or_empty() {
    let bytes = compiled()[..4].to_vec();
    match CacheReader::from_bytes(bytes) {
        Ok(reader) => {
            assert!(reader.find_by_name("a.png").is_empty());
            exercise(&reader);
        }
        Err(e) => assert!(e.is_corrupt_cache(), "unexpected error: {e}"),
    }
}

#[test]
fn test_truncated_cache_falls_through_to_registry() {
    let bytes = compiled();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mime.cache");
    std::fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

    let db = MimeDatabase::builder()
        .cache_file(&path)
        .package(package_path())
        .build();
    assert_eq!(db.find_by_name("table.dat").types, vec!["application/x-high"]);
    assert_eq!(db.resolve_alias("image/x-png"), "image/png");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_truncated_cache_never_panics(cut in 0usize..4096) {
        let bytes = compiled();
        let cut = cut % bytes.len();
        if let Ok(reader) = CacheReader::from_bytes(bytes[..cut].to_vec()) {
            exercise(&reader);
        }
    }

    #[test]
    fn prop_corrupted_cache_never_panics(
        edits in prop::collection::vec((any::<usize>(), any::<u8>()), 1..16)
    ) {
        let mut bytes = compiled().to_vec();
        let len = bytes.len();
        for (pos, value) in edits {
            // Keep the version valid so the damage reaches the tables
            let pos = 4 + pos % (len - 4);
            bytes[pos] = value;
        }
        if let Ok(reader) = CacheReader::from_bytes(bytes) {
            exercise(&reader);
        }
    }
}
