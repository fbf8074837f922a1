//! Tables command implementation.

use super::{open_store, CliResult, OpenedStore};
use std::path::Path;

/// Runs the tables command, one table name per line.
pub fn run(path: &Path) -> CliResult<()> {
    match open_store(path, false)? {
        OpenedStore::Relational(store) => {
            for table in store.tables()? {
                println!("{table}");
            }
            Ok(())
        }
        OpenedStore::Mapped(_) => Err("mapped stores have no tables".into()),
    }
}
