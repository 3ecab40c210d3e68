use anyhow::{Context, Result};
use serde_json::json;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use crate::cli_utils::{print_json, Sources};

/// Reads at most `limit` leading bytes from a file or stdin ("-").
fn read_head(path: &Path, limit: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(limit);
    if path.as_os_str() == "-" {
        io::stdin()
            .lock()
            .take(limit as u64)
            .read_to_end(&mut buf)
            .context("Failed to read stdin")?;
    } else {
        File::open(path)
            .with_context(|| format!("Failed to open: {}", path.display()))?
            .take(limit as u64)
            .read_to_end(&mut buf)
            .with_context(|| format!("Failed to read: {}", path.display()))?;
    }
    Ok(buf)
}

pub fn cmd_data(sources: &Sources, path: &Path, json: bool) -> Result<bool> {
    let db = sources.open_database()?;
    let head = read_head(path, db.magic_extent())?;
    let found = db.find_by_data(&head);

    if json {
        print_json(&json!({
            "bytes_read": head.len(),
            "match": found,
        }))?;
    } else if let Some(m) = &found {
        println!("{} (accuracy {})", m.mime_type, m.accuracy);
    }

    Ok(found.is_some())
}
