use anyhow::Result;

use crate::cli_utils::{print_json, Sources};

pub fn cmd_list(sources: &Sources, json: bool) -> Result<bool> {
    let db = sources.open_database()?;
    let all = db.all_mime_types();

    if json {
        print_json(&all)?;
    } else {
        for mime_type in &all {
            if mime_type.comment().is_empty() {
                println!("{}", mime_type.name());
            } else {
                println!("{}\t{}", mime_type.name(), mime_type.comment());
            }
        }
    }
    Ok(!all.is_empty())
}
