//! CLI command implementations.

pub mod get;
pub mod inspect;
pub mod keys;
pub mod tables;

use fuelkv_core::mapped::MAGIC;
use fuelkv_core::{BackendKind, MappedStore, RelationalStore, StoreOptions, Value};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// Result type shared by the commands.
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

const SQLITE_MAGIC: &[u8; 16] = b"SQLite format 3\0";

/// A store opened read-only by the CLI.
pub enum OpenedStore {
    /// Memory-mapped store.
    Mapped(MappedStore),
    /// SQLite store.
    Relational(RelationalStore),
}

/// Determines the backend from the first bytes of the file.
pub fn detect_backend(path: &Path, force_relational: bool) -> CliResult<BackendKind> {
    if force_relational {
        return Ok(BackendKind::Relational);
    }

    let mut head = Vec::with_capacity(SQLITE_MAGIC.len());
    File::open(path)?
        .take(SQLITE_MAGIC.len() as u64)
        .read_to_end(&mut head)?;

    debug!(path = ?path, head_len = head.len(), "sniffing store format");
    if head.starts_with(MAGIC) {
        Ok(BackendKind::Mapped)
    } else if head.starts_with(SQLITE_MAGIC) {
        Ok(BackendKind::Relational)
    } else {
        Err(format!("{} is not a fuelkv store", path.display()).into())
    }
}

/// Opens the store at `path` read-only.
pub fn open_store(path: &Path, force_relational: bool) -> CliResult<OpenedStore> {
    let options = StoreOptions::read_only_mode().background_index_load(false);
    let kind = detect_backend(path, force_relational)?;
    info!("Opening {} store {:?}", kind, path);
    Ok(match kind {
        BackendKind::Mapped => OpenedStore::Mapped(MappedStore::open(path, options)?),
        BackendKind::Relational => OpenedStore::Relational(RelationalStore::open(path, options)?),
    })
}

/// JSON rendering of a stored value. Bytes become lowercase hex strings
/// and non-finite floats become `null`.
pub fn value_to_json(value: &Value) -> serde_json::Value {
    use serde_json::Value as Json;

    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Integer(n) => Json::from(*n),
        Value::Float(f) => serde_json::Number::from_f64(*f).map_or(Json::Null, Json::Number),
        Value::Bytes(bytes) => Json::String(bytes.iter().map(|b| format!("{b:02x}")).collect()),
        Value::Text(text) => Json::String(text.clone()),
        Value::Array(items) => Json::Array(items.iter().map(value_to_json).collect()),
        Value::Map(pairs) => Json::Object(
            pairs
                .iter()
                .map(|(key, value)| {
                    let key = match key {
                        Value::Text(text) => text.clone(),
                        other => value_to_json(other).to_string(),
                    };
                    (key, value_to_json(value))
                })
                .collect(),
        ),
    }
}
