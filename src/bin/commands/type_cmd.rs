use anyhow::Result;
use serde_json::json;

use crate::cli_utils::{print_json, Sources};

pub fn cmd_type(sources: &Sources, name: &str, json: bool) -> Result<bool> {
    let db = sources.open_database()?;
    let Some(mime_type) = db.mime_type_for_name(name) else {
        if json {
            println!("null");
        }
        return Ok(false);
    };
    let parents = db.parents(mime_type.name());

    if json {
        print_json(&json!({
            "type": mime_type,
            "parents": parents,
        }))?;
        return Ok(true);
    }

    println!("{}", mime_type.name());
    if !mime_type.comment().is_empty() {
        println!("  comment:      {}", mime_type.comment());
    }
    if !mime_type.icon_name().is_empty() {
        println!("  icon:         {}", mime_type.icon_name());
    }
    if !mime_type.generic_icon_name().is_empty() {
        println!("  generic icon: {}", mime_type.generic_icon_name());
    }
    if !mime_type.glob_patterns().is_empty() {
        println!("  globs:        {}", mime_type.glob_patterns().join(" "));
    }
    if !parents.is_empty() {
        println!("  parents:      {}", parents.join(" "));
    }
    Ok(true)
}
