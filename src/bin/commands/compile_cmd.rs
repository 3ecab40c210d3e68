use anyhow::{bail, Context, Result};
use mimedb::{loader, CacheWriter, TypeRegistry};
use std::path::Path;
use tracing::warn;

use crate::cli_utils::{print_json, Sources};

pub fn cmd_compile(sources: &Sources, output: &Path, json: bool) -> Result<bool> {
    let config = sources.config()?;
    if config.packages.is_empty() {
        bail!("compile needs at least one --package");
    }
    if !config.cache_files.is_empty() {
        warn!("caches are not compiled; only packages go into the output");
    }

    let mut registry = TypeRegistry::new();
    for package in &config.packages {
        let stats = loader::load_package(&mut registry, package)
            .with_context(|| format!("Failed to load package: {}", package.display()))?;
        if stats.skipped > 0 {
            warn!(
                package = %package.display(),
                skipped = stats.skipped,
                "some records were skipped"
            );
        }
    }

    let stats = CacheWriter::new(&registry)
        .write_to_file(output)
        .with_context(|| format!("Failed to write cache: {}", output.display()))?;

    if json {
        print_json(&stats)?;
    } else {
        println!("Wrote {} ({} bytes)", output.display(), stats.size);
        println!(
            "  {} types, {} literals, {} suffixes, {} globs, {} magic, {} aliases, {} parents",
            registry.len(),
            stats.literals,
            stats.suffixes,
            stats.globs,
            stats.magic,
            stats.aliases,
            stats.parents
        );
    }
    Ok(true)
}
