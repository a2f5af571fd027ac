//! Deep, override-replacing merge of value trees.
//!
//! Used to combine a base initial state with caller-supplied overrides
//! before a container publishes its first snapshot (per-test deviations,
//! scoped configuration). Merge is total: no input shape is an error.
//!
//! # Semantics
//!
//! Sources apply left to right. For each key in a source map:
//!
//! - [`Value::Absent`] deletes the key from the target; absence wins
//!   over structure;
//! - if the target slot is not a map, it is replaced with a materialized
//!   copy of the source value (materialization strips `Absent` keys from
//!   nested maps, however deeply buried);
//! - if the source value is not a map, a materialized copy replaces the
//!   target slot outright;
//! - two maps merge recursively.
//!
//! Sequences are never element-wise merged: an override sequence
//! replaces the target sequence wholesale, which keeps override
//! semantics predictable for list-typed fields.

use crate::Value;
use std::sync::Arc;

/// Merge `source` onto `target` in place.
///
/// # Examples
///
/// ```
/// use floe_state::{merge, Value};
/// use serde_json::json;
///
/// let mut target = Value::from_json(json!({"a": 1, "b": {"c": 2}}));
/// merge(&mut target, &Value::from_json(json!({"b": {"c": 3, "d": 4}})));
/// assert_eq!(target, Value::from_json(json!({"a": 1, "b": {"c": 3, "d": 4}})));
/// ```
pub fn merge(target: &mut Value, source: &Value) {
    match (&mut *target, source) {
        (Value::Map(target_entries), Value::Map(source_entries)) => {
            let entries = Arc::make_mut(target_entries);
            for (key, source_val) in source_entries.iter() {
                match source_val {
                    Value::Absent => {
                        // shift_remove keeps the order of remaining keys
                        entries.shift_remove(key);
                    }
                    Value::Map(_) => match entries.get_mut(key) {
                        Some(slot @ Value::Map(_)) => merge(slot, source_val),
                        _ => {
                            entries.insert(key.clone(), materialize(source_val));
                        }
                    },
                    other => {
                        entries.insert(key.clone(), materialize(other));
                    }
                }
            }
        }
        // A non-map on either side means no key-wise merge is possible;
        // the source replaces the target wholesale.
        _ => *target = materialize(source),
    }
}

/// Merge several sources onto `target`, left to right.
pub fn merge_all<'a>(target: &mut Value, sources: impl IntoIterator<Item = &'a Value>) {
    for source in sources {
        merge(target, source);
    }
}

/// Realize an override value into a publishable one.
///
/// Maps are rebuilt with `Absent` entries dropped and sequences are
/// rebuilt element-wise, so no `Absent` survives at any depth. A bare
/// `Absent` element of a sequence becomes null (removal has no meaning
/// at a sequence position). Subtrees holding no `Absent` are shared
/// as-is.
fn materialize(value: &Value) -> Value {
    if !contains_absent(value) {
        return value.clone();
    }
    match value {
        Value::Absent => Value::Null,
        Value::Seq(items) => items.iter().map(materialize).collect(),
        Value::Map(entries) => entries
            .iter()
            .filter(|(_, v)| !v.is_absent())
            .map(|(k, v)| (k.clone(), materialize(v)))
            .collect(),
        other => other.clone(),
    }
}

fn contains_absent(value: &Value) -> bool {
    match value {
        Value::Absent => true,
        Value::Seq(items) => items.iter().any(contains_absent),
        Value::Map(entries) => entries.values().any(contains_absent),
        _ => false,
    }
}
