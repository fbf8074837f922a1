//! SQLite-backed store with one table per namespace.
//!
//! Every table has the schema
//!
//! ```sql
//! CREATE TABLE "<name>" (key TEXT NOT NULL, value TEXT NOT NULL, PRIMARY KEY (key))
//! ```
//!
//! and holds encoded records as BLOBs in the `value` column. Operations
//! act on the *current table*, which starts as [`DEFAULT_TABLE`] and is
//! changed with [`RelationalStore::set_table`] or scoped with
//! [`RelationalStore::as_table`]. Each table has its own write cache.

mod table;

pub use table::TableView;

use crate::cache::WriteCache;
use crate::config::StoreOptions;
use crate::error::{StoreError, StoreResult};
use crate::registry::Registration;
use crate::store::KvStore;
use crate::types::BackendKind;
use fuelkv_codec::{decode_record, encode_record, Value};
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Table used until another is selected.
pub const DEFAULT_TABLE: &str = "_default_";

/// Keys bound per `IN (...)` statement.
const MAX_BATCH_KEYS: usize = 500;

/// A key-value cache stored in a SQLite database.
///
/// Writable handles take an exclusive lock on the database and run with
/// `synchronous = OFF` and an in-memory journal: fast, single-writer, and
/// not crash-safe for writes that have not been flushed.
///
/// # Example
///
/// ```rust,no_run
/// use fuelkv_core::{KvStore, RelationalStore, StoreOptions};
///
/// let mut store = RelationalStore::open("train.db", StoreOptions::new())?;
/// store.set_table("features")?;
/// store.set("f1", vec![1.0f64, 2.0])?;
/// store.close()?;
///
/// let mut store = RelationalStore::open("train.db", StoreOptions::read_only_mode())?;
/// let value = store.as_table("features").get("f1")?;
/// assert_eq!(value, vec![1.0f64, 2.0].into());
/// # Ok::<(), fuelkv_core::StoreError>(())
/// ```
pub struct RelationalStore {
    path: PathBuf,
    options: StoreOptions,
    conn: Option<Connection>,
    current_table: String,
    caches: HashMap<String, WriteCache>,
    known_tables: HashSet<String>,
    registration: Option<Registration>,
}

impl RelationalStore {
    /// Opens or creates a SQLite store.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] for a read-only open of a missing file
    /// - [`StoreError::Sqlite`] if the file is not a database
    pub fn open(path: impl AsRef<Path>, options: StoreOptions) -> StoreResult<Self> {
        let path = std::path::absolute(path.as_ref())?;

        if options.override_existing && !options.read_only && path.is_file() {
            fs::remove_file(&path)?;
            debug!(path = %path.display(), "removed existing relational store");
        }

        let conn = if options.read_only {
            if !path.is_file() {
                return Err(StoreError::not_found(path));
            }
            Connection::open_with_flags(
                &path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?
        } else {
            let conn = Connection::open(&path)?;
            apply_pragmas(&conn)?;
            conn
        };

        let mut store = Self {
            path,
            options,
            conn: Some(conn),
            current_table: DEFAULT_TABLE.to_string(),
            caches: HashMap::new(),
            known_tables: HashSet::new(),
            registration: None,
        };
        store.known_tables = store.tables()?.into_iter().collect();
        if !store.options.read_only {
            store.set_table(DEFAULT_TABLE)?;
        }

        info!(
            path = %store.path.display(),
            read_only = store.options.read_only,
            tables = store.known_tables.len(),
            "opened relational store"
        );
        Ok(store)
    }

    pub(crate) fn attach(&mut self, registration: Registration) {
        self.registration = Some(registration);
    }

    /// Name of the current table.
    #[must_use]
    pub fn current_table(&self) -> &str {
        &self.current_table
    }

    /// Makes `name` the current table, creating it if needed.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidOperation`] if `name` is not a valid
    ///   identifier
    /// - [`StoreError::ReadOnly`] if the table does not exist and the
    ///   handle is read-only
    pub fn set_table(&mut self, name: &str) -> StoreResult<()> {
        self.ensure_open()?;
        validate_table_name(name)?;

        if !self.table_exists(name)? {
            if self.options.read_only {
                return Err(StoreError::read_only("create table"));
            }
            self.conn()?.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS \"{name}\" \
                 (key TEXT NOT NULL, value TEXT NOT NULL, PRIMARY KEY (key));"
            ))?;
            self.known_tables.insert(name.to_string());
            debug!(path = %self.path.display(), table = name, "created table");
        }

        self.current_table = name.to_string();
        Ok(())
    }

    /// Names of all tables in the database, sorted.
    ///
    /// # Errors
    ///
    /// [`StoreError::Sqlite`] if the schema cannot be read.
    pub fn tables(&self) -> StoreResult<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    /// Drops `name` and its pending writes. If it was the current table,
    /// the default table becomes current.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidOperation`] for the default table or an
    ///   invalid name
    /// - [`StoreError::ReadOnly`] on a read-only handle
    pub fn drop_table(&mut self, name: &str) -> StoreResult<()> {
        self.ensure_writable("drop table")?;
        validate_table_name(name)?;
        if name == DEFAULT_TABLE {
            return Err(StoreError::invalid_operation(
                "the default table cannot be dropped",
            ));
        }

        self.conn()?
            .execute_batch(&format!("DROP TABLE IF EXISTS \"{name}\";"))?;
        self.caches.remove(name);
        self.known_tables.remove(name);
        if self.current_table == name {
            self.current_table = DEFAULT_TABLE.to_string();
        }
        debug!(path = %self.path.display(), table = name, "dropped table");
        Ok(())
    }

    /// A view that runs every operation against `name`, leaving the current
    /// table unchanged afterwards.
    pub fn as_table(&mut self, name: impl Into<String>) -> TableView<'_> {
        TableView::new(self, name.into())
    }

    /// Runs `f` with `name` as the current table, then restores the
    /// previous current table whether or not `f` succeeded.
    ///
    /// A read-only handle switches to a missing table without creating
    /// it; reads then see an empty table and writes fail in `f`.
    pub(crate) fn with_table<T>(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut Self) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let previous = self.current_table.clone();
        if self.options.read_only {
            self.ensure_open()?;
            validate_table_name(name)?;
            self.current_table = name.to_string();
        } else {
            self.set_table(name)?;
        }
        let result = f(self);
        self.current_table = previous;
        result
    }

    /// Values for `keys`, in request order. Pending writes are served from
    /// the cache; the rest are fetched with batched `IN` queries.
    ///
    /// # Errors
    ///
    /// [`StoreError::KeyNotFound`] carrying the failing query if any key is
    /// absent.
    pub fn get_many<S: AsRef<str>>(&mut self, keys: &[S]) -> StoreResult<Vec<Value>> {
        self.ensure_open()?;
        let table = self.current_table.clone();

        let keys: Vec<&str> = keys.iter().map(|key| key.as_ref()).collect();

        let mut found: HashMap<String, Value> = HashMap::with_capacity(keys.len());
        let mut remaining: Vec<&str> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        for &key in &keys {
            if !seen.insert(key) {
                continue;
            }
            match self.caches.get(&table).and_then(|cache| cache.get(key)) {
                Some(value) => {
                    found.insert(key.to_string(), value.clone());
                }
                None => remaining.push(key),
            }
        }

        let table_exists = self.table_exists(&table)?;
        for chunk in remaining.chunks(MAX_BATCH_KEYS) {
            let rows: Vec<(String, Vec<u8>)> = if table_exists {
                let sql = format!(
                    "SELECT key, value FROM \"{table}\" WHERE key IN ({})",
                    placeholders(chunk.len())
                );
                let mut stmt = self.conn()?.prepare(&sql)?;
                let rows = stmt
                    .query_map(params_from_iter(chunk.iter()), |row| {
                        Ok((row.get(0)?, row.get(1)?))
                    })?
                    .collect::<Result<Vec<(String, Vec<u8>)>, _>>()?;
                rows
            } else {
                Vec::new()
            };

            if rows.len() != chunk.len() {
                let quoted: Vec<String> = chunk.iter().map(|k| format!("'{k}'")).collect();
                return Err(StoreError::key_not_found(format!(
                    "SELECT key, value FROM \"{table}\" WHERE key IN ({})",
                    quoted.join(", ")
                )));
            }
            for (key, blob) in rows {
                found.insert(key, decode_record(&blob)?);
            }
        }

        keys.iter()
            .map(|&key| {
                found
                    .get(key)
                    .cloned()
                    .ok_or_else(|| StoreError::key_not_found(key))
            })
            .collect()
    }

    /// Removes every key in `keys` that exists, pending or persisted.
    /// Missing keys are ignored.
    ///
    /// # Errors
    ///
    /// [`StoreError::ReadOnly`] on a read-only handle.
    pub fn delete_many<S: AsRef<str>>(&mut self, keys: &[S]) -> StoreResult<()> {
        self.ensure_writable("delete")?;
        let table = self.current_table.clone();
        let keys: Vec<&str> = keys.iter().map(|key| key.as_ref()).collect();

        if let Some(cache) = self.caches.get_mut(&table) {
            for key in &keys {
                cache.remove(key);
            }
        }
        if !self.table_exists(&table)? || keys.is_empty() {
            return Ok(());
        }

        let conn = self.conn.as_mut().ok_or(StoreError::Closed)?;
        let tx = conn.transaction()?;
        for chunk in keys.chunks(MAX_BATCH_KEYS) {
            let sql = format!(
                "DELETE FROM \"{table}\" WHERE key IN ({})",
                placeholders(chunk.len())
            );
            tx.execute(&sql, params_from_iter(chunk.iter()))?;
        }
        tx.commit()?;
        Ok(())
    }

    fn conn(&self) -> StoreResult<&Connection> {
        self.conn.as_ref().ok_or(StoreError::Closed)
    }

    fn ensure_open(&self) -> StoreResult<()> {
        self.conn().map(|_| ())
    }

    fn ensure_writable(&self, operation: &'static str) -> StoreResult<()> {
        self.ensure_open()?;
        if self.options.read_only {
            return Err(StoreError::read_only(operation));
        }
        Ok(())
    }

    /// Whether table `name` exists.
    ///
    /// Checks the known-table set first, then the schema, so tables created
    /// by another connection are picked up.
    ///
    /// # Errors
    ///
    /// [`StoreError::Closed`] on a closed store, or a SQLite error.
    pub fn table_exists(&mut self, name: &str) -> StoreResult<bool> {
        if self.known_tables.contains(name) {
            return Ok(true);
        }
        let exists = self
            .conn()?
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![name],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if exists {
            self.known_tables.insert(name.to_string());
        }
        Ok(exists)
    }

    fn count_rows(&self, table: &str) -> StoreResult<usize> {
        let count: i64 =
            self.conn()?
                .query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn row_exists(&self, table: &str, key: &str) -> StoreResult<bool> {
        let mut stmt = self
            .conn()?
            .prepare_cached(&format!("SELECT 1 FROM \"{table}\" WHERE key = ?1 LIMIT 1"))?;
        Ok(stmt.exists(params![key])?)
    }

    fn current_cache(&self) -> Option<&WriteCache> {
        self.caches.get(&self.current_table)
    }

    /// Writes one table's pending entries in a single transaction.
    fn flush_table(&mut self, table: &str) -> StoreResult<()> {
        let Some(cache) = self.caches.get_mut(table) else {
            return Ok(());
        };
        if cache.is_empty() {
            return Ok(());
        }

        let conn = self.conn.as_mut().ok_or(StoreError::Closed)?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(&format!(
                "INSERT OR REPLACE INTO \"{table}\" (key, value) VALUES (?1, ?2)"
            ))?;
            for (key, value) in cache.iter() {
                stmt.execute(params![key, encode_record(value)?])?;
            }
        }
        tx.commit()?;

        debug!(path = %self.path.display(), table, records = cache.len(), "flushed write cache");
        cache.clear();
        Ok(())
    }
}

fn apply_pragmas(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch("PRAGMA locking_mode = EXCLUSIVE;")?;
    conn.execute_batch("PRAGMA synchronous = OFF;")?;
    conn.execute_batch("PRAGMA journal_mode = MEMORY;")?;
    Ok(())
}

/// Table names are interpolated into SQL, so only plain identifiers pass.
/// SQLite reserves the `sqlite_` prefix.
fn validate_table_name(name: &str) -> StoreResult<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let reserved = name
        .get(..7)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("sqlite_"));
    if valid_start && !reserved && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(StoreError::invalid_operation(format!(
            "invalid table name {name:?}"
        )))
    }
}

fn placeholders(n: usize) -> String {
    (1..=n).map(|i| format!("?{i}")).collect::<Vec<_>>().join(", ")
}

impl KvStore for RelationalStore {
    fn backend_kind(&self) -> BackendKind {
        BackendKind::Relational
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn is_read_only(&self) -> bool {
        self.options.read_only
    }

    fn cache_capacity(&self) -> usize {
        self.options.cache_capacity
    }

    fn is_closed(&self) -> bool {
        self.conn.is_none()
    }

    /// Pending writes of the current table.
    fn pending_len(&self) -> usize {
        self.current_cache().map_or(0, WriteCache::len)
    }

    fn get(&mut self, key: &str) -> StoreResult<Value> {
        self.ensure_open()?;
        if let Some(value) = self.current_cache().and_then(|cache| cache.get(key)) {
            return Ok(value.clone());
        }

        let table = self.current_table.clone();
        if !self.table_exists(&table)? {
            return Err(StoreError::key_not_found(key));
        }
        let mut stmt = self
            .conn()?
            .prepare_cached(&format!("SELECT value FROM \"{table}\" WHERE key = ?1 LIMIT 1"))?;
        let blob: Option<Vec<u8>> = stmt.query_row(params![key], |row| row.get(0)).optional()?;

        match blob {
            Some(blob) => Ok(decode_record(&blob)?),
            None => Err(StoreError::key_not_found(key)),
        }
    }

    fn set<K, V>(&mut self, key: K, value: V) -> StoreResult<()>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.ensure_writable("set")?;
        let table = self.current_table.clone();
        let capacity = self.options.cache_capacity;
        let full = self
            .caches
            .entry(table.clone())
            .or_insert_with(|| WriteCache::new(capacity))
            .insert(key.into(), value.into());
        if full {
            self.flush_table(&table)?;
        }
        Ok(())
    }

    fn delete(&mut self, key: &str) -> StoreResult<()> {
        self.ensure_writable("delete")?;
        let table = self.current_table.clone();

        let was_pending = self
            .caches
            .get_mut(&table)
            .is_some_and(|cache| cache.remove(key).is_some());
        let deleted_rows = if self.table_exists(&table)? {
            self.conn()?
                .execute(&format!("DELETE FROM \"{table}\" WHERE key = ?1"), params![key])?
        } else {
            0
        };

        if !was_pending && deleted_rows == 0 {
            return Err(StoreError::key_not_found(key));
        }
        Ok(())
    }

    fn contains(&mut self, key: &str) -> StoreResult<bool> {
        self.ensure_open()?;
        if self.current_cache().is_some_and(|cache| cache.contains_key(key)) {
            return Ok(true);
        }
        let table = self.current_table.clone();
        if !self.table_exists(&table)? {
            return Ok(false);
        }
        self.row_exists(&table, key)
    }

    fn len(&mut self) -> StoreResult<usize> {
        self.ensure_open()?;
        let table = self.current_table.clone();
        if !self.table_exists(&table)? {
            return Ok(self.pending_len());
        }

        let mut len = self.count_rows(&table)?;
        if let Some(cache) = self.current_cache() {
            for key in cache.keys() {
                if !self.row_exists(&table, key)? {
                    len += 1;
                }
            }
        }
        Ok(len)
    }

    fn keys(&mut self) -> StoreResult<Vec<String>> {
        Ok(self.items()?.into_iter().map(|(key, _)| key).collect())
    }

    fn items(&mut self) -> StoreResult<Vec<(String, Value)>> {
        self.ensure_open()?;
        let table = self.current_table.clone();

        let mut items = Vec::new();
        let mut persisted = HashSet::new();
        if self.table_exists(&table)? {
            let mut stmt = self
                .conn()?
                .prepare(&format!("SELECT key, value FROM \"{table}\" ORDER BY rowid"))?;
            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?)))?;
            for row in rows {
                let (key, blob) = row?;
                let value = match self.current_cache().and_then(|cache| cache.get(&key)) {
                    Some(value) => value.clone(),
                    None => decode_record(&blob)?,
                };
                persisted.insert(key.clone());
                items.push((key, value));
            }
        }

        if let Some(cache) = self.current_cache() {
            for (key, value) in cache.iter() {
                if !persisted.contains(key) {
                    items.push((key.clone(), value.clone()));
                }
            }
        }
        Ok(items)
    }

    fn clear(&mut self) -> StoreResult<()> {
        self.ensure_writable("clear")?;
        let table = self.current_table.clone();
        if let Some(cache) = self.caches.get_mut(&table) {
            cache.clear();
        }
        if self.table_exists(&table)? {
            self.conn()?.execute(&format!("DELETE FROM \"{table}\""), [])?;
        }
        Ok(())
    }

    fn flush(&mut self, save_all: bool) -> StoreResult<()> {
        self.ensure_open()?;
        if self.options.read_only {
            return Ok(());
        }
        if save_all {
            let mut tables: Vec<String> = self.caches.keys().cloned().collect();
            tables.sort();
            for table in tables {
                self.flush_table(&table)?;
            }
            Ok(())
        } else {
            let table = self.current_table.clone();
            self.flush_table(&table)
        }
    }

    fn close(&mut self) -> StoreResult<()> {
        if self.conn.is_none() {
            return Ok(());
        }
        if !self.options.read_only {
            self.flush(true)?;
        }

        let close_result = match self.conn.take() {
            Some(conn) => conn.close().map_err(|(_, err)| err),
            None => Ok(()),
        };
        self.caches.clear();
        self.known_tables.clear();
        if let Some(registration) = self.registration.take() {
            registration.release();
        }
        info!(path = %self.path.display(), "closed relational store");
        Ok(close_result?)
    }
}

impl Drop for RelationalStore {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(path = %self.path.display(), error = %err, "failed to close relational store");
        }
    }
}

impl fmt::Debug for RelationalStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationalStore")
            .field("path", &self.path)
            .field("read_only", &self.options.read_only)
            .field("current_table", &self.current_table)
            .field("closed", &self.conn.is_none())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for RelationalStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<RelationalStore path:{:?}", self.path)?;
        if self.conn.is_none() {
            return f.write_str(", closed>");
        }

        let tables = self.tables().map_err(|_| fmt::Error)?;
        f.write_str(", tables:[")?;
        for (i, table) in tables.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            let rows = self.count_rows(table).map_err(|_| fmt::Error)?;
            let pending = self.caches.get(table).map_or(0, WriteCache::len);
            write!(f, "{table}:{rows}+{pending}")?;
        }
        write!(
            f,
            "], current:{}, read_only:{}>",
            self.current_table, self.options.read_only
        )
    }
}
