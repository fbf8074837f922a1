//! Property-based test generators using proptest.
//!
//! Provides strategies for generating keys, table names and values that
//! the stores accept.

use fuelkv_codec::Value;
use proptest::prelude::*;

/// Strategy for generating store keys, including non-ASCII ones.
pub fn key_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        prop::string::string_regex("[a-z][a-z0-9_-]{0,15}").expect("Invalid regex"),
        "\\PC{1,12}",
    ]
}

/// Strategy for generating valid relational table names.
pub fn table_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z_][A-Za-z0-9_]{0,23}")
        .expect("Invalid regex")
        .prop_filter("sqlite_ prefix is reserved", |name| {
            !name.to_ascii_lowercase().starts_with("sqlite_")
        })
}

/// Strategy for generating feature vectors, the typical cached payload.
pub fn feature_vector_strategy() -> impl Strategy<Value = Value> {
    prop::collection::vec(-1.0e6f64..1.0e6, 0..64).prop_map(Value::from)
}

/// Strategy for scalar values.
///
/// Floats exclude NaN, which never compares equal to itself.
pub fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        any::<f64>()
            .prop_filter("NaN is not self-equal", |f| !f.is_nan())
            .prop_map(Value::Float),
        prop::collection::vec(any::<u8>(), 0..32).prop_map(Value::Bytes),
        "\\PC{0,24}".prop_map(Value::Text),
    ]
}

/// Strategy for map keys, mixing text and integer keys in one map.
pub fn map_key_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        "[a-z]{1,8}".prop_map(Value::Text),
        any::<i64>().prop_map(Value::Integer),
        (0i64..4).prop_map(Value::Integer),
    ]
}

/// Strategy for arbitrary nested values up to a few levels deep.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    scalar_strategy().prop_recursive(3, 48, 8, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..8).prop_map(Value::Array),
            prop::collection::vec((map_key_strategy(), inner), 0..6).prop_map(Value::map),
        ]
    })
}

/// Strategy for a batch of entries with distinct keys.
pub fn entries_strategy(max: usize) -> impl Strategy<Value = Vec<(String, Value)>> {
    prop::collection::btree_map(key_strategy(), value_strategy(), 0..max)
        .prop_map(|entries| entries.into_iter().collect())
}
