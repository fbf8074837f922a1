//! Get command implementation.

use super::{open_store, value_to_json, CliResult, OpenedStore};
use fuelkv_core::{KvStore, Value};
use std::path::Path;

/// Runs the get command, printing the value as JSON.
pub fn run(path: &Path, force_relational: bool, key: &str, table: Option<&str>) -> CliResult<()> {
    let value = lookup(path, force_relational, key, table)?;
    println!("{}", serde_json::to_string_pretty(&value_to_json(&value))?);
    Ok(())
}

/// Reads one value. `table` is rejected for mapped stores.
pub fn lookup(
    path: &Path,
    force_relational: bool,
    key: &str,
    table: Option<&str>,
) -> CliResult<Value> {
    let value = match open_store(path, force_relational)? {
        OpenedStore::Mapped(mut store) => {
            if table.is_some() {
                return Err("--table only applies to relational stores".into());
            }
            store.get(key)?
        }
        OpenedStore::Relational(mut store) => match table {
            Some(table) => store.as_table(table).get(key)?,
            None => store.get(key)?,
        },
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fuelkv_core::{MappedStore, RelationalStore, StoreOptions};
    use tempfile::tempdir;

    #[test]
    fn get_from_both_backends() {
        let dir = tempdir().unwrap();
        let mapped = dir.path().join("a.mmap");
        let relational = dir.path().join("a.db");

        let mut store = MappedStore::open(&mapped, StoreOptions::new()).unwrap();
        store.set("a", "one").unwrap();
        store.close().unwrap();

        let mut store = RelationalStore::open(&relational, StoreOptions::new()).unwrap();
        store.as_table("features").set("f1", vec![1.0f64]).unwrap();
        store.close().unwrap();

        assert_eq!(lookup(&mapped, false, "a", None).unwrap(), Value::from("one"));
        assert_eq!(
            lookup(&relational, false, "f1", Some("features")).unwrap(),
            Value::from(vec![1.0f64])
        );
        assert!(lookup(&mapped, false, "a", Some("features")).is_err());
        assert!(lookup(&mapped, false, "missing", None).is_err());
    }

    #[test]
    fn get_from_missing_table_reports_missing_key() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.db");
        let mut store = RelationalStore::open(&path, StoreOptions::new()).unwrap();
        store.set("a", 1).unwrap();
        store.close().unwrap();

        let err = lookup(&path, false, "x", Some("labels")).unwrap_err();
        let err = err.downcast::<fuelkv_core::StoreError>().unwrap();
        assert!(err.is_key_not_found());
    }
}
