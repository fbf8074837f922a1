//! Keys command implementation.

use super::{open_store, CliResult, OpenedStore};
use fuelkv_core::KvStore;
use std::path::Path;

/// Runs the keys command, one key per line.
pub fn run(
    path: &Path,
    force_relational: bool,
    table: Option<&str>,
    limit: Option<usize>,
) -> CliResult<()> {
    for key in list(path, force_relational, table, limit)? {
        println!("{key}");
    }
    Ok(())
}

/// Lists keys in store order, truncated to `limit`.
pub fn list(
    path: &Path,
    force_relational: bool,
    table: Option<&str>,
    limit: Option<usize>,
) -> CliResult<Vec<String>> {
    let mut keys = match open_store(path, force_relational)? {
        OpenedStore::Mapped(mut store) => {
            if table.is_some() {
                return Err("--table only applies to relational stores".into());
            }
            store.keys()?
        }
        OpenedStore::Relational(mut store) => match table {
            Some(table) => store.as_table(table).keys()?,
            None => store.keys()?,
        },
    };

    if let Some(limit) = limit {
        keys.truncate(limit);
    }
    Ok(keys)
}
