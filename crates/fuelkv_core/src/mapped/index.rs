//! The mapped store's key index and its background loader.

use crate::error::{StoreError, StoreResult};
use fuelkv_codec::{decode_record, encode_record, Value};
use std::collections::HashMap;
use std::thread::{self, JoinHandle};
use tracing::debug;

/// Where a record lives in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLocation {
    /// Absolute byte offset.
    pub offset: u64,
    /// Encoded length in bytes.
    pub len: u64,
}

/// Key to record location.
pub type Index = HashMap<String, RecordLocation>;

/// Encodes an index as a record: a map from text keys to
/// `[offset, length]` pairs.
pub(crate) fn encode_index(index: &Index) -> StoreResult<Vec<u8>> {
    let pairs = index
        .iter()
        .map(|(key, location)| {
            Ok((
                Value::Text(key.clone()),
                Value::Array(vec![
                    Value::Integer(to_i64(location.offset)?),
                    Value::Integer(to_i64(location.len)?),
                ]),
            ))
        })
        .collect::<StoreResult<Vec<_>>>()?;
    Ok(encode_record(&Value::map(pairs))?)
}

/// Decodes an index blob. An empty blob is an empty index.
pub(crate) fn decode_index(bytes: &[u8]) -> StoreResult<Index> {
    if bytes.is_empty() {
        return Ok(Index::new());
    }

    let value = decode_record(bytes)?;
    let pairs = value
        .as_map()
        .ok_or_else(|| StoreError::index_load("index is not a map"))?;

    let mut index = Index::with_capacity(pairs.len());
    for (key, location) in pairs {
        let key = key
            .as_text()
            .ok_or_else(|| StoreError::index_load("index key is not text"))?;
        let (offset, len) = match location.as_array() {
            Some([offset, len]) => (to_u64(offset)?, to_u64(len)?),
            _ => {
                return Err(StoreError::index_load(format!(
                    "index entry for {key:?} is not an [offset, length] pair"
                )))
            }
        };
        index.insert(key.to_string(), RecordLocation { offset, len });
    }
    Ok(index)
}

fn to_i64(n: u64) -> StoreResult<i64> {
    i64::try_from(n).map_err(|_| StoreError::index_load(format!("offset {n} out of range")))
}

fn to_u64(value: &Value) -> StoreResult<u64> {
    value
        .as_integer()
        .and_then(|n| u64::try_from(n).ok())
        .ok_or_else(|| StoreError::index_load("index location is not a non-negative integer"))
}

/// Holds the index, which may still be decoding on a worker thread.
///
/// The first caller needing the index joins the worker. A failed load is
/// remembered so later calls keep failing instead of seeing an empty index.
#[derive(Debug)]
pub(crate) struct IndexLoader {
    worker: Option<JoinHandle<StoreResult<Index>>>,
    index: Index,
    failure: Option<String>,
}

impl IndexLoader {
    pub(crate) fn ready(index: Index) -> Self {
        Self {
            worker: None,
            index,
            failure: None,
        }
    }

    /// Decodes `blob` on a named worker thread.
    pub(crate) fn spawn(blob: Vec<u8>) -> StoreResult<Self> {
        let worker = thread::Builder::new()
            .name("fuelkv-index".to_string())
            .spawn(move || {
                let index = decode_index(&blob);
                if let Ok(index) = &index {
                    debug!(entries = index.len(), "index decoded in background");
                }
                index
            })?;
        Ok(Self {
            worker: Some(worker),
            index: Index::new(),
            failure: None,
        })
    }

    /// Non-blocking: whether the index can be used without waiting.
    pub(crate) fn is_loaded(&self) -> bool {
        self.worker.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Entry count if the index is available without waiting.
    pub(crate) fn loaded_len(&self) -> Option<usize> {
        (self.worker.is_none() && self.failure.is_none()).then(|| self.index.len())
    }

    /// The index, joining the worker if necessary.
    pub(crate) fn index_mut(&mut self) -> StoreResult<&mut Index> {
        if let Some(worker) = self.worker.take() {
            match worker.join() {
                Ok(Ok(index)) => self.index = index,
                Ok(Err(err)) => self.failure = Some(err.to_string()),
                Err(_) => self.failure = Some("index loader thread panicked".to_string()),
            }
        }
        match &self.failure {
            Some(message) => Err(StoreError::index_load(message.clone())),
            None => Ok(&mut self.index),
        }
    }
}
