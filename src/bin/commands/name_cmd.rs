use anyhow::Result;

use crate::cli_utils::{print_json, Sources};

pub fn cmd_name(sources: &Sources, file_name: &str, json: bool) -> Result<bool> {
    let db = sources.open_database()?;
    let found = db.find_by_name(file_name);

    if json {
        print_json(&found)?;
    } else {
        for mime_type in &found.types {
            println!("{}", mime_type);
        }
    }

    Ok(!found.is_empty())
}
