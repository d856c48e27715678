//! Entry collection loading: one directory in, an ordered listing out.
//!
//! Collections are loaded fresh on every request and every build pass;
//! nothing is cached, so edits show up on the next load.

use crate::config::{DOC_EXT, SortPolicy};
use crate::entry::{Entry, load_entry};
use crate::resolve::UrlResolver;
use crate::utils::fs::safe_join;
use anyhow::Result;
use chrono::NaiveDateTime;
use std::cmp::Reverse;
use std::fs;
use std::path::Path;

/// Load the listing for one collection directory.
///
/// - a missing directory is an empty collection, not an error;
/// - only direct children with the document extension are considered;
/// - candidates whose join would escape the directory are skipped;
/// - documents that vanish between listing and parsing are skipped;
/// - hidden entries are dropped;
/// - the sort is stable, over a lexicographic base order so live and static
///   passes agree regardless of platform directory order.
pub fn load_entries(
    dir: &Path,
    meta_only: bool,
    sort: SortPolicy,
    resolver: &UrlResolver,
) -> Result<Vec<Entry>> {
    let listing = match fs::read_dir(dir) {
        Ok(listing) => listing,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };

    let mut names: Vec<String> = listing
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| Path::new(name).extension().is_some_and(|ext| ext == DOC_EXT))
        .collect();
    names.sort();

    let mut entries = Vec::with_capacity(names.len());
    for name in names {
        let Some(path) = safe_join(dir, &name) else {
            continue;
        };
        if let Some(entry) = load_entry(&path, meta_only, resolver)? {
            if !entry.hidden {
                entries.push(entry);
            }
        }
    }

    match sort {
        // ascending by explicit order, entries without one last
        SortPolicy::Order => entries.sort_by_key(|e| e.order.unwrap_or(i64::MAX)),
        // descending by creation time, entries without one first
        SortPolicy::Created => {
            entries.sort_by_key(|e| Reverse(e.created.unwrap_or(NaiveDateTime::MAX)));
        }
    }

    Ok(entries)
}
