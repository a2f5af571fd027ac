//! Immutable value trees with structural sharing.
//!
//! `Value` is the snapshot type of the whole crate. Containers (maps and
//! sequences) live behind `Arc`, so cloning a `Value` is a reference bump
//! and two snapshots produced from one another share every subtree the
//! edit between them never touched. There is no runtime freeze step:
//! a published `Value` is immutable because nothing in the API hands out
//! `&mut` access to shared allocations.

use indexmap::IndexMap;
use serde::de::{Deserialize, Deserializer};
use serde::ser::{Error as _, Serialize, SerializeMap, SerializeSeq, Serializer};
use std::fmt;
use std::sync::Arc;

/// Ordered key-unique map used for `Value::Map`.
///
/// `IndexMap` preserves insertion order, so merges and clones keep keys
/// in the order the caller wrote them.
pub type Map = IndexMap<String, Value>;

/// An immutable JSON-like value tree.
///
/// Scalars are stored inline; strings, sequences and maps are behind
/// `Arc` so that `clone()` shares structure instead of copying.
///
/// # Examples
///
/// ```
/// use floe_state::Value;
///
/// let v = Value::from_json(serde_json::json!({"count": 1, "tags": ["a"]}));
/// assert_eq!(v.get("count").and_then(Value::as_i64), Some(1));
///
/// let shared = v.clone();
/// assert!(v.ptr_eq(&shared));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Explicit no-value marker.
    ///
    /// `Absent` only has meaning inside merge override trees, where it
    /// deletes the key it is assigned to (see [`crate::merge`]). It never
    /// appears in a published snapshot and refuses to serialize.
    Absent,
    /// JSON null.
    Null,
    /// Boolean scalar.
    Bool(bool),
    /// Integer scalar.
    Int(i64),
    /// Floating-point scalar.
    Float(f64),
    /// Shared string.
    Str(Arc<str>),
    /// Ordered sequence.
    Seq(Arc<Vec<Value>>),
    /// Ordered key-unique map.
    Map(Arc<Map>),
}

impl Value {
    /// Create an empty map value.
    #[inline]
    pub fn map() -> Self {
        Value::Map(Arc::new(Map::new()))
    }

    /// Create an empty sequence value.
    #[inline]
    pub fn seq() -> Self {
        Value::Seq(Arc::new(Vec::new()))
    }

    /// Build a value from a `serde_json::Value`.
    ///
    /// Numbers that fit `i64` become `Int`; everything else numeric
    /// becomes `Float`.
    pub fn from_json(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Str(s.into()),
            serde_json::Value::Array(items) => {
                Value::Seq(Arc::new(items.into_iter().map(Value::from_json).collect()))
            }
            serde_json::Value::Object(entries) => Value::Map(Arc::new(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            )),
        }
    }

    /// Convert back into a `serde_json::Value`.
    ///
    /// `Absent` entries are dropped from maps; a top-level `Absent`
    /// becomes `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Absent | Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s.to_string()),
            Value::Seq(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .filter(|(_, v)| !v.is_absent())
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    /// Deep-clone this value into a tree sharing no container allocation
    /// with the source.
    ///
    /// Scalars are carried as-is; sequences are rebuilt element-wise and
    /// maps key-by-key in order. Useful to detach a caller-supplied tree
    /// from any aliases the caller may still hold a handle to.
    pub fn deep_clone(&self) -> Value {
        match self {
            Value::Seq(items) => {
                Value::Seq(Arc::new(items.iter().map(Value::deep_clone).collect()))
            }
            Value::Map(entries) => Value::Map(Arc::new(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.deep_clone()))
                    .collect(),
            )),
            // Scalars are immutable; sharing the Arc<str> is fine.
            other => other.clone(),
        }
    }

    /// Allocation-identity comparison.
    ///
    /// For containers and strings: true iff both sides are the same
    /// allocation. For scalars: plain value equality. This is the cheap
    /// "did this subtree change" probe that structural sharing enables;
    /// a subtree untouched by [`crate::produce`] stays `ptr_eq` across
    /// snapshots.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Absent, Value::Absent) => true,
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => Arc::ptr_eq(a, b),
            (Value::Seq(a), Value::Seq(b)) => Arc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Get the value for a key, if this is a map.
    #[inline]
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(entries) => entries.get(key),
            _ => None,
        }
    }

    /// Get the element at an index, if this is a sequence.
    #[inline]
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        match self {
            Value::Seq(items) => items.get(index),
            _ => None,
        }
    }

    /// Number of entries for containers, `None` for scalars.
    #[inline]
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::Seq(items) => Some(items.len()),
            Value::Map(entries) => Some(entries.len()),
            _ => None,
        }
    }

    /// True for an empty container.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// True if this is the `Absent` marker.
    #[inline]
    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }

    /// True if this is null.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// True if this is a map.
    #[inline]
    pub fn is_map(&self) -> bool {
        matches!(self, Value::Map(_))
    }

    /// True if this is a sequence.
    #[inline]
    pub fn is_seq(&self) -> bool {
        matches!(self, Value::Seq(_))
    }

    /// Get the boolean, if this is a boolean.
    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get the integer, if this is an integer.
    #[inline]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get a float, widening integers.
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Get the string slice, if this is a string.
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Get the sequence contents, if this is a sequence.
    #[inline]
    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Value::Seq(items) => Some(items),
            _ => None,
        }
    }

    /// Get the map contents, if this is a map.
    #[inline]
    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Human-readable type name, used in error messages.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Absent => "absent",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) | Value::Float(_) => "number",
            Value::Str(_) => "string",
            Value::Seq(_) => "sequence",
            Value::Map(_) => "map",
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::map()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s.into())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Seq(Arc::new(items))
    }
}

impl From<Map> for Value {
    fn from(entries: Map) -> Self {
        Value::Map(Arc::new(entries))
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::from_json(v)
    }
}

impl FromIterator<Value> for Value {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Value::Seq(Arc::new(iter.into_iter().collect()))
    }
}

impl FromIterator<(String, Value)> for Value {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Value::Map(Arc::new(iter.into_iter().collect()))
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Absent => Err(S::Error::custom("absent value cannot be serialized")),
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Seq(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items.iter() {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries.iter() {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = serde_json::Value::deserialize(deserializer)?;
        Ok(Value::from_json(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_roundtrip() {
        let original = json!({"name": "Alice", "age": 30, "tags": ["a", "b"], "meta": null});
        let v = Value::from_json(original.clone());
        assert_eq!(v.to_json(), original);
    }

    #[test]
    fn test_clone_shares_structure() {
        let v = Value::from_json(json!({"data": [1, 2, 3]}));
        let shared = v.clone();
        assert!(v.ptr_eq(&shared));
        assert!(v.get("data").unwrap().ptr_eq(shared.get("data").unwrap()));
    }

    #[test]
    fn test_deep_clone_shares_nothing() {
        let v = Value::from_json(json!({"data": [1, 2], "nested": {"x": 1}}));
        let copy = v.deep_clone();

        assert_eq!(v, copy);
        assert!(!v.ptr_eq(&copy));
        assert!(!v.get("data").unwrap().ptr_eq(copy.get("data").unwrap()));
        assert!(!v.get("nested").unwrap().ptr_eq(copy.get("nested").unwrap()));
    }

    #[test]
    fn test_deep_clone_preserves_key_order() {
        let v = Value::from_json(json!({"z": 1, "a": 2, "m": 3}));
        let copy = v.deep_clone();
        let keys: Vec<&String> = copy.as_map().unwrap().keys().collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_ptr_eq_scalars_by_value() {
        assert!(Value::Int(5).ptr_eq(&Value::Int(5)));
        assert!(!Value::Int(5).ptr_eq(&Value::Int(6)));
        assert!(Value::Null.ptr_eq(&Value::Null));
        assert!(!Value::Null.ptr_eq(&Value::Bool(false)));
    }

    #[test]
    fn test_ptr_eq_distinct_allocations() {
        let a = Value::from_json(json!([1, 2]));
        let b = Value::from_json(json!([1, 2]));
        assert_eq!(a, b);
        assert!(!a.ptr_eq(&b));
    }

    #[test]
    fn test_accessors() {
        let v = Value::from_json(json!({"n": 1.5, "s": "hi", "b": true, "list": [10]}));
        assert_eq!(v.get("n").unwrap().as_f64(), Some(1.5));
        assert_eq!(v.get("s").unwrap().as_str(), Some("hi"));
        assert_eq!(v.get("b").unwrap().as_bool(), Some(true));
        assert_eq!(v.get("list").unwrap().get_index(0).unwrap().as_i64(), Some(10));
        assert_eq!(v.get("missing"), None);
    }

    #[test]
    fn test_serialize_absent_is_error() {
        let mut entries = Map::new();
        entries.insert("x".to_string(), Value::Absent);
        let v = Value::from(entries);
        assert!(serde_json::to_string(&v).is_err());
    }

    #[test]
    fn test_serde_roundtrip() {
        let v = Value::from_json(json!({"a": [1, {"b": null}], "c": "text"}));
        let encoded = serde_json::to_string(&v).unwrap();
        let decoded: Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(v, decoded);
    }

    #[test]
    fn test_type_names() {
        assert_eq!(Value::Null.type_name(), "null");
        assert_eq!(Value::from(1i64).type_name(), "number");
        assert_eq!(Value::from("x").type_name(), "string");
        assert_eq!(Value::seq().type_name(), "sequence");
        assert_eq!(Value::map().type_name(), "map");
    }
}
