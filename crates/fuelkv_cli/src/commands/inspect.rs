//! Inspect command implementation.

use super::{open_store, CliResult, OpenedStore};
use fuelkv_core::KvStore;
use serde::Serialize;
use std::path::Path;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store path.
    pub path: String,
    /// Backend name.
    pub backend: String,
    /// File size in bytes.
    pub file_size: u64,
    /// Number of keys (default table for relational stores).
    pub key_count: usize,
    /// Mapped header fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<HeaderInfo>,
    /// Relational tables.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tables: Option<Vec<TableInfo>>,
}

/// Mapped store header fields.
#[derive(Debug, Serialize)]
pub struct HeaderInfo {
    /// Offset of the saved index.
    pub data_end: u64,
    /// Length of the saved index.
    pub index_len: u64,
}

/// Statistics for a single table.
#[derive(Debug, Serialize)]
pub struct TableInfo {
    /// Table name.
    pub name: String,
    /// Number of rows.
    pub rows: usize,
}

/// Runs the inspect command.
pub fn run(path: &Path, force_relational: bool, format: &str) -> CliResult<()> {
    let result = inspect(path, force_relational)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

/// Collects inspection data without printing it.
pub fn inspect(path: &Path, force_relational: bool) -> CliResult<InspectResult> {
    let file_size = std::fs::metadata(path)?.len();

    let result = match open_store(path, force_relational)? {
        OpenedStore::Mapped(mut store) => {
            let header = store.header();
            InspectResult {
                path: store.path().display().to_string(),
                backend: store.backend_kind().to_string(),
                file_size,
                key_count: store.len()?,
                header: Some(HeaderInfo {
                    data_end: header.data_end,
                    index_len: header.index_len,
                }),
                tables: None,
            }
        }
        OpenedStore::Relational(mut store) => {
            let mut tables = Vec::new();
            for name in store.tables()? {
                let rows = store.as_table(name.as_str()).len()?;
                tables.push(TableInfo { name, rows });
            }
            InspectResult {
                path: store.path().display().to_string(),
                backend: store.backend_kind().to_string(),
                file_size,
                key_count: store.len()?,
                header: None,
                tables: Some(tables),
            }
        }
    };

    Ok(result)
}

fn print_text_output(result: &InspectResult) {
    println!("fuelkv Store Inspection");
    println!("=======================");
    println!();
    println!("Path:    {}", result.path);
    println!("Backend: {}", result.backend);
    println!("Size:    {}", format_size(result.file_size));
    println!("Keys:    {}", result.key_count);

    if let Some(header) = &result.header {
        println!();
        println!("Header:");
        println!("  Index offset: {}", header.data_end);
        println!("  Index length: {} bytes", header.index_len);
    }

    if let Some(tables) = &result.tables {
        println!();
        println!("Tables:");
        for table in tables {
            println!("  {:<24} {} rows", table.name, table.rows);
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} bytes")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
