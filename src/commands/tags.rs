//! `tags` subcommands.

use super::Session;
use crate::cli::{TagsQueryArgs, TagsSetArgs};
use leasekeeper::error::Result;
use leasekeeper::store::Store;
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;

/// Parse `raw` as JSON, falling back to a JSON string.
pub(super) fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn print_keys(keys: HashSet<String>) {
    if keys.is_empty() {
        println!("No keys.");
        return;
    }
    let mut keys: Vec<_> = keys.into_iter().collect();
    keys.sort();
    for key in keys {
        println!("{}", key);
    }
}

pub(super) fn cmd_tags_set<S: Store>(session: &Session<S>, args: TagsSetArgs) -> Result<()> {
    let value = parse_value(&args.value);
    let ttl = args.ttl_secs.map(Duration::from_secs);

    let mut conn = session.connect()?;
    let added = session
        .tag_index()
        .set_with_tags(&mut conn, &args.key, &value, &args.tags, ttl)?;
    println!(
        "Stored '{}' ({} new tag association(s)).",
        args.key, added
    );
    Ok(())
}

pub(super) fn cmd_tags_any<S: Store>(session: &Session<S>, args: TagsQueryArgs) -> Result<()> {
    let mut conn = session.connect()?;
    print_keys(session.tag_index().get_keys_by_any_tag(&mut conn, &args.tags)?);
    Ok(())
}

pub(super) fn cmd_tags_all<S: Store>(session: &Session<S>, args: TagsQueryArgs) -> Result<()> {
    let mut conn = session.connect()?;
    print_keys(session.tag_index().get_keys_by_all_tags(&mut conn, &args.tags)?);
    Ok(())
}

pub(super) fn cmd_tags_cleanup<S: Store>(session: &Session<S>) -> Result<()> {
    let mut conn = session.connect()?;
    let removed = session.tag_index().cleanup_tags(&mut conn)?;
    println!("Removed {} stale tag member(s).", removed);
    Ok(())
}
