//! Dynamic record value type.

use crate::encoder::encode_record;
use std::cmp::Ordering;

/// A value that can be stored in a fuelkv record.
///
/// Only primitives and nested containers of primitives are representable.
/// Numeric arrays are stored as an [`Value::Array`] of numbers.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent value (`None` on the way in).
    Null,
    /// `true` or `false`.
    Bool(bool),
    /// Signed integer (full i64 range).
    Integer(i64),
    /// Double precision float.
    Float(f64),
    /// Raw bytes, e.g. a serialized tensor.
    Bytes(Vec<u8>),
    /// UTF-8 text.
    Text(String),
    /// Sequence; feature vectors are arrays of floats.
    Array(Vec<Value>),
    /// Map of key-value pairs (keys are sorted when encoded).
    Map(Vec<(Value, Value)>),
}

impl Value {
    /// Builds a map, sorting `pairs` into canonical key order.
    ///
    /// Keys that encode identically are collapsed; the last pair wins.
    pub fn map(pairs: Vec<(Value, Value)>) -> Self {
        let mut keyed: Vec<(Vec<u8>, (Value, Value))> = pairs
            .into_iter()
            .map(|pair| (encode_record(&pair.0).unwrap_or_default(), pair))
            .collect();
        // Stable, so equal keys keep insertion order.
        keyed.sort_by(|a, b| cmp_encoded(&a.0, &b.0));

        let mut out: Vec<(Value, Value)> = Vec::with_capacity(keyed.len());
        let mut previous: Option<Vec<u8>> = None;
        for (key_bytes, pair) in keyed {
            if previous.as_ref() == Some(&key_bytes) {
                out.pop();
            }
            out.push(pair);
            previous = Some(key_bytes);
        }
        Value::Map(out)
    }

    /// Compare two values in the order their encodings sort: encoded
    /// length first, then bytewise. This is the order map keys are
    /// written in.
    ///
    /// Values that cannot be encoded compare equal to everything.
    pub fn cmp_canonical(&self, other: &Self) -> Ordering {
        match (encode_record(self), encode_record(other)) {
            (Ok(a), Ok(b)) => cmp_encoded(&a, &b),
            _ => Ordering::Equal,
        }
    }

    /// `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The boolean, if this is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The integer, if this is one. Floats are not truncated.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// The number as a float. Integers are widened.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// Borrowed bytes of a byte string.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// The text, if this is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Elements of an array value.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Pairs of a map value, in canonical key order.
    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Look up a text key in this map value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(pairs) => pairs
                .iter()
                .find(|(k, _)| k.as_text() == Some(key))
                .map(|(_, v)| v),
            _ => None,
        }
    }
}

/// Canonical order of two encoded map keys.
pub(crate) fn cmp_encoded(a: &[u8], b: &[u8]) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Value::Float(f64::from(f))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Value::Bytes(b.to_vec())
    }
}

macro_rules! impl_from_vec {
    ($($t:ty),*) => {
        $(
            impl From<Vec<$t>> for Value {
                fn from(v: Vec<$t>) -> Self {
                    Value::Array(v.into_iter().map(Into::into).collect())
                }
            }
        )*
    };
}

impl_from_vec!(Value, bool, i32, i64, u32, f32, f64, String, &str);

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Value::Null
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_keys_are_sorted() {
        let map = Value::map(vec![
            (Value::from("z"), Value::Integer(1)),
            (Value::from("a"), Value::Integer(2)),
            (Value::from("m"), Value::Integer(3)),
        ]);

        let pairs = map.as_map().unwrap();
        assert_eq!(pairs[0].0, Value::from("a"));
        assert_eq!(pairs[1].0, Value::from("m"));
        assert_eq!(pairs[2].0, Value::from("z"));
    }

    #[test]
    fn shorter_text_keys_sort_first() {
        let map = Value::map(vec![
            (Value::from("abc"), Value::Integer(1)),
            (Value::from("a"), Value::Integer(2)),
            (Value::from("ab"), Value::Integer(3)),
        ]);

        let keys: Vec<_> = map
            .as_map()
            .unwrap()
            .iter()
            .map(|(k, _)| k.as_text().unwrap().to_string())
            .collect();
        assert_eq!(keys, vec!["a", "ab", "abc"]);
    }

    #[test]
    fn integers_sort_by_encoded_length_then_bytes() {
        let mut values = vec![
            Value::Integer(-1),
            Value::Integer(0),
            Value::Integer(1),
            Value::Integer(-2),
            Value::Integer(300),
        ];
        values.sort_by(Value::cmp_canonical);

        assert_eq!(
            values,
            vec![
                Value::Integer(0),
                Value::Integer(1),
                Value::Integer(-1),
                Value::Integer(-2),
                Value::Integer(300),
            ]
        );
    }

    #[test]
    fn simple_values_order_before_floats() {
        let mut values = vec![
            Value::Float(0.5),
            Value::Null,
            Value::Bool(true),
            Value::Bool(false),
        ];
        values.sort_by(Value::cmp_canonical);
        assert_eq!(
            values,
            vec![
                Value::Bool(false),
                Value::Bool(true),
                Value::Null,
                Value::Float(0.5)
            ]
        );
    }

    #[test]
    fn accessors_match_variants() {
        assert!(Value::Null.is_null());
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Integer(42).as_integer(), Some(42));
        assert_eq!(Value::Integer(2).as_float(), Some(2.0));
        assert_eq!(Value::Float(1.5).as_float(), Some(1.5));
        assert_eq!(Value::from("hello").as_text(), Some("hello"));
        assert_eq!(Value::Bytes(vec![1, 2]).as_bytes(), Some(&[1, 2][..]));
        assert_eq!(Value::Text("x".into()).as_integer(), None);
    }

    #[test]
    fn map_lookup_by_text_key() {
        let map = Value::map(vec![
            (Value::from("speaker"), Value::from("spk-07")),
            (Value::from("frames"), Value::Integer(412)),
        ]);

        assert_eq!(map.get("speaker"), Some(&Value::from("spk-07")));
        assert_eq!(map.get("frames"), Some(&Value::Integer(412)));
        assert_eq!(map.get("missing"), None);
    }

    #[test]
    fn conversions_from_rust_types() {
        assert_eq!(Value::from(42i32), Value::Integer(42));
        assert_eq!(Value::from(1.25f32), Value::Float(1.25));
        assert_eq!(Value::from(vec![1u8, 2, 3]), Value::Bytes(vec![1, 2, 3]));
        assert_eq!(
            Value::from(vec![1.0f64, 2.0]),
            Value::Array(vec![Value::Float(1.0), Value::Float(2.0)])
        );
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(()), Value::Null);
    }

    #[test]
    fn mixed_key_types_sort_like_the_encoder() {
        let map = Value::map(vec![
            (Value::Integer(1000), Value::Integer(1)),
            (Value::from("a"), Value::Integer(2)),
        ]);
        let keys: Vec<_> = map.as_map().unwrap().iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(keys, vec![Value::from("a"), Value::Integer(1000)]);
    }

    #[test]
    fn duplicate_keys_keep_last_value() {
        let map = Value::map(vec![
            (Value::from("a"), Value::Integer(1)),
            (Value::from("b"), Value::Integer(2)),
            (Value::from("a"), Value::Integer(3)),
        ]);
        assert_eq!(
            map,
            Value::Map(vec![
                (Value::from("a"), Value::Integer(3)),
                (Value::from("b"), Value::Integer(2)),
            ])
        );
    }
}
