use anyhow::Result;

use crate::cli_utils::{print_json, print_lines, Sources};

pub fn cmd_parents(sources: &Sources, name: &str, all: bool, json: bool) -> Result<bool> {
    let db = sources.open_database()?;
    let parents = if all {
        db.ancestors(name)
    } else {
        db.parents(&db.resolve_alias(name))
    };

    print_lines(&parents, json)?;
    Ok(!parents.is_empty())
}

pub fn cmd_alias(sources: &Sources, name: &str, json: bool) -> Result<bool> {
    let db = sources.open_database()?;
    let canonical = db.resolve_alias(name);

    if json {
        print_json(&canonical)?;
    } else {
        println!("{}", canonical);
    }
    Ok(canonical != name)
}
