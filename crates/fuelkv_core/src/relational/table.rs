//! Scoped access to one table of a relational store.

use super::RelationalStore;
use crate::error::StoreResult;
use crate::store::KvStore;
use fuelkv_codec::Value;

/// Runs each operation against a fixed table of a [`RelationalStore`].
///
/// Every call switches the store to the view's table (creating it on a
/// writable handle) and switches back afterwards, so the store's own
/// current table is never changed by a view, even when the operation
/// fails.
#[derive(Debug)]
pub struct TableView<'a> {
    store: &'a mut RelationalStore,
    name: String,
}

impl<'a> TableView<'a> {
    pub(super) fn new(store: &'a mut RelationalStore, name: String) -> Self {
        Self { store, name }
    }

    /// The table this view targets.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// See [`KvStore::get`].
    ///
    /// # Errors
    ///
    /// As for [`KvStore::get`], plus table selection errors.
    pub fn get(&mut self, key: &str) -> StoreResult<Value> {
        self.store.with_table(&self.name, |s| s.get(key))
    }

    /// See [`RelationalStore::get_many`].
    ///
    /// # Errors
    ///
    /// As for [`RelationalStore::get_many`].
    pub fn get_many<S: AsRef<str>>(&mut self, keys: &[S]) -> StoreResult<Vec<Value>> {
        self.store.with_table(&self.name, |s| s.get_many(keys))
    }

    /// See [`KvStore::set`].
    ///
    /// # Errors
    ///
    /// As for [`KvStore::set`].
    pub fn set<K, V>(&mut self, key: K, value: V) -> StoreResult<()>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.store.with_table(&self.name, |s| s.set(key, value))
    }

    /// See [`KvStore::update`].
    ///
    /// # Errors
    ///
    /// As for [`KvStore::update`].
    pub fn update<I, K, V>(&mut self, entries: I) -> StoreResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.store.with_table(&self.name, |s| s.update(entries))
    }

    /// See [`KvStore::delete`].
    ///
    /// # Errors
    ///
    /// As for [`KvStore::delete`].
    pub fn delete(&mut self, key: &str) -> StoreResult<()> {
        self.store.with_table(&self.name, |s| s.delete(key))
    }

    /// See [`RelationalStore::delete_many`].
    ///
    /// # Errors
    ///
    /// As for [`RelationalStore::delete_many`].
    pub fn delete_many<S: AsRef<str>>(&mut self, keys: &[S]) -> StoreResult<()> {
        self.store.with_table(&self.name, |s| s.delete_many(keys))
    }

    /// Whether `key` is present in this table.
    ///
    /// # Errors
    ///
    /// Table selection or query errors.
    pub fn contains(&mut self, key: &str) -> StoreResult<bool> {
        self.store.with_table(&self.name, |s| s.contains(key))
    }

    /// Number of keys in this table.
    ///
    /// # Errors
    ///
    /// Table selection or query errors.
    pub fn len(&mut self) -> StoreResult<usize> {
        self.store.with_table(&self.name, KvStore::len)
    }

    /// Whether this table is empty.
    ///
    /// # Errors
    ///
    /// Table selection or query errors.
    pub fn is_empty(&mut self) -> StoreResult<bool> {
        self.store.with_table(&self.name, KvStore::is_empty)
    }

    /// Keys of this table.
    ///
    /// # Errors
    ///
    /// Table selection or query errors.
    pub fn keys(&mut self) -> StoreResult<Vec<String>> {
        self.store.with_table(&self.name, KvStore::keys)
    }

    /// Values of this table.
    ///
    /// # Errors
    ///
    /// Table selection or query errors.
    pub fn values(&mut self) -> StoreResult<Vec<Value>> {
        self.store.with_table(&self.name, KvStore::values)
    }

    /// Entries of this table.
    ///
    /// # Errors
    ///
    /// Table selection or query errors.
    pub fn items(&mut self) -> StoreResult<Vec<(String, Value)>> {
        self.store.with_table(&self.name, KvStore::items)
    }

    /// Removes every entry of this table.
    ///
    /// # Errors
    ///
    /// As for [`KvStore::clear`].
    pub fn clear(&mut self) -> StoreResult<()> {
        self.store.with_table(&self.name, KvStore::clear)
    }

    /// Flushes this table's pending writes.
    ///
    /// # Errors
    ///
    /// As for [`KvStore::flush`].
    pub fn flush(&mut self) -> StoreResult<()> {
        self.store.with_table(&self.name, |s| s.flush(false))
    }
}

#[cfg(test)]
mod tests {
    use super::super::DEFAULT_TABLE;
    use super::*;
    use crate::config::StoreOptions;
    use crate::error::StoreError;
    use tempfile::tempdir;

    #[test]
    fn view_does_not_change_current_table() {
        let dir = tempdir().unwrap();
        let mut store = RelationalStore::open(dir.path().join("s.db"), StoreOptions::new()).unwrap();

        store.as_table("features").set("f1", 1.5).unwrap();
        assert_eq!(store.current_table(), DEFAULT_TABLE);
        assert!(!store.contains("f1").unwrap());
        assert_eq!(store.as_table("features").get("f1").unwrap(), Value::Float(1.5));
    }

    #[test]
    fn view_restores_table_after_error() {
        let dir = tempdir().unwrap();
        let mut store = RelationalStore::open(dir.path().join("s.db"), StoreOptions::new()).unwrap();
        store.set_table("labels").unwrap();

        let result = store.as_table("features").get("missing");
        assert!(matches!(result, Err(StoreError::KeyNotFound { .. })));
        assert_eq!(store.current_table(), "labels");
    }

    #[test]
    fn read_only_view_of_missing_table_reads_as_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("s.db");
        let mut store = RelationalStore::open(&path, StoreOptions::new()).unwrap();
        store.set("a", 1).unwrap();
        store.close().unwrap();

        let mut store = RelationalStore::open(&path, StoreOptions::read_only_mode()).unwrap();
        let mut view = store.as_table("features");
        assert!(view.get("x").unwrap_err().is_key_not_found());
        assert!(!view.contains("x").unwrap());
        assert_eq!(view.len().unwrap(), 0);
        assert!(view.keys().unwrap().is_empty());
        assert!(view.set("x", 1).unwrap_err().is_read_only());
        assert!(matches!(
            view.get_many(&["x"]),
            Err(StoreError::KeyNotFound { .. })
        ));

        assert_eq!(store.current_table(), DEFAULT_TABLE);
        assert!(!store.table_exists("features").unwrap());
        assert!(matches!(
            store.as_table("bad name").get("x"),
            Err(StoreError::InvalidOperation { .. })
        ));
        assert_eq!(store.get("a").unwrap(), Value::Integer(1));
    }

    #[test]
    fn view_covers_bulk_operations() {
        let dir = tempdir().unwrap();
        let mut store = RelationalStore::open(dir.path().join("s.db"), StoreOptions::new()).unwrap();

        let mut view = store.as_table("t");
        assert_eq!(view.name(), "t");
        view.update([("a", 1), ("b", 2), ("c", 3)]).unwrap();
        view.flush().unwrap();
        assert_eq!(view.len().unwrap(), 3);
        assert_eq!(
            view.get_many(&["b", "a"]).unwrap(),
            vec![Value::Integer(2), Value::Integer(1)]
        );

        view.delete_many(&["a", "b"]).unwrap();
        assert_eq!(view.keys().unwrap(), vec!["c"]);
        assert_eq!(view.values().unwrap(), vec![Value::Integer(3)]);
        assert_eq!(view.items().unwrap().len(), 1);

        view.delete("c").unwrap();
        assert!(view.is_empty().unwrap());
        view.set("d", 4).unwrap();
        view.clear().unwrap();
        assert!(!view.contains("d").unwrap());
    }
}
