use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mimedb::glob::{GlobPattern, MatchMode};
use mimedb::{
    CacheReader, CacheWriter, MagicRule, MagicRuleMatcher, MimeDatabase, MimeType, TypeRegistry,
};
use std::hint::black_box;
use std::time::Duration;

/// Registry with `n` suffix types, a few wildcard globs and magic blocks.
fn build_registry(n: usize) -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    for i in 0..n {
        let name = format!("application/x-bench{}", i);
        let pattern = format!("*.ext{}", i);
        registry.add_mime_type(MimeType::builder(&name).glob_pattern(&pattern).build());
        registry.add_glob_pattern(
            GlobPattern::new(&pattern, &name, 50, MatchMode::CaseInsensitive).unwrap(),
        );
        if i % 10 == 0 {
            let mut matcher = MagicRuleMatcher::new(&name, 50 + (i % 50) as u32);
            let value = format!("MAGIC{:04}", i);
            matcher
                .add_rule(None, MagicRule::parse("string", &value, "0:16", None).unwrap())
                .unwrap();
            registry.add_magic_matcher(matcher);
        }
    }
    for i in 0..20 {
        let name = format!("text/x-wild{}", i);
        let pattern = format!("wild{}-*.log", i);
        let glob = GlobPattern::new(&pattern, &name, 50, MatchMode::CaseSensitive).unwrap();
        registry.add_glob_pattern(glob);
    }
    registry
}

fn bench_find_by_name(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_by_name");
    group.measurement_time(Duration::from_secs(5));

    for size in [100usize, 1000] {
        let registry = build_registry(size);
        let bytes = CacheWriter::new(&registry).to_bytes().unwrap();
        let cache = CacheReader::from_bytes(bytes).unwrap();
        let names: Vec<String> = (0..size)
            .map(|i| format!("file{}.EXT{}", i, (i * 7) % size))
            .chain((0..20).map(|i| format!("wild{}-today.log", i)))
            .collect();
        group.throughput(Throughput::Elements(names.len() as u64));

        let registry_db = MimeDatabase::builder().registry(registry).build();
        let cache_db = MimeDatabase::builder().provider(cache).build();

        for (label, db) in [("registry", &registry_db), ("cache", &cache_db)] {
            group.bench_with_input(BenchmarkId::new(label, size), &names, |b, names| {
                b.iter(|| {
                    for name in names {
                        black_box(db.find_by_name(black_box(name)));
                    }
                });
            });
        }
    }
    group.finish();
}

fn bench_find_by_data(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_by_data");
    group.measurement_time(Duration::from_secs(5));

    let registry = build_registry(1000);
    let cache = CacheReader::from_bytes(CacheWriter::new(&registry).to_bytes().unwrap()).unwrap();
    let mut hit = vec![b' '; 64];
    hit[8..17].copy_from_slice(b"MAGIC0500");
    let miss = vec![0u8; 64];

    let registry_db = MimeDatabase::builder().registry(registry).build();
    let cache_db = MimeDatabase::builder().provider(cache).build();

    for (label, db) in [("registry", &registry_db), ("cache", &cache_db)] {
        group.bench_function(BenchmarkId::new(label, "hit"), |b| {
            b.iter(|| black_box(db.find_by_data(black_box(&hit))))
        });
        group.bench_function(BenchmarkId::new(label, "miss"), |b| {
            b.iter(|| black_box(db.find_by_data(black_box(&miss))))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_find_by_name, bench_find_by_data);
criterion_main!(benches);
