//! Copy-on-write drafts and the `produce` entry point.
//!
//! A [`Draft`] is a mutable working view over a snapshot, valid for one
//! recipe invocation. It starts as a cheap clone of the snapshot (every
//! subtree still shared), and each write reallocates exactly the path
//! from the root to the edited node via `Arc::make_mut`. Subtrees the
//! recipe never writes keep their allocation, so the committed snapshot
//! shares them with the previous one and `Value::ptr_eq` reports them
//! unchanged.

use crate::error::{FloeError, FloeResult};
use crate::{Path, Seg, Value};
use std::sync::Arc;

/// A mutable, ephemeral view over a snapshot.
///
/// Obtained inside a recipe passed to [`produce`]. Writes never affect
/// the source snapshot; they are realized into the next snapshot when
/// the recipe returns.
#[derive(Debug)]
pub struct Draft {
    root: Value,
}

impl Draft {
    pub(crate) fn new(snapshot: &Value) -> Self {
        Self {
            root: snapshot.clone(),
        }
    }

    /// The current draft tree.
    #[inline]
    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Read the value at a path.
    pub fn get(&self, path: &Path) -> Option<&Value> {
        let mut current = &self.root;
        for seg in path.iter() {
            current = match seg {
                Seg::Key(key) => current.get(key)?,
                Seg::Index(idx) => current.get_index(*idx)?,
            };
        }
        Some(current)
    }

    /// Set the value at a path, creating intermediate maps as needed.
    ///
    /// Index segments must address an existing in-bounds slot.
    pub fn set(&mut self, path: impl Into<Path>, value: impl Into<Value>) -> FloeResult<()> {
        let path = path.into();
        set_at(&mut self.root, path.segments(), value.into(), &path)
    }

    /// Delete the value at a path. No-op when the path does not exist.
    ///
    /// Deleting the root replaces the whole tree with null.
    pub fn delete(&mut self, path: impl Into<Path>) -> FloeResult<()> {
        let path = path.into();
        if path.is_empty() {
            self.root = Value::Null;
            return Ok(());
        }
        delete_at(&mut self.root, path.segments());
        Ok(())
    }

    /// Append a value to the sequence at a path, creating the sequence
    /// when the slot is missing or null.
    pub fn push(&mut self, path: impl Into<Path>, value: impl Into<Value>) -> FloeResult<()> {
        let path = path.into();
        let target = get_or_create(&mut self.root, &path, 0, &Value::seq)?;
        match target {
            Value::Seq(items) => {
                Arc::make_mut(items).push(value.into());
                Ok(())
            }
            other => Err(FloeError::type_mismatch(
                path,
                "sequence",
                other.type_name(),
            )),
        }
    }

    /// Insert a value at an index in the sequence at a path, shifting
    /// later elements right. `index == len` appends.
    pub fn insert(
        &mut self,
        path: impl Into<Path>,
        index: usize,
        value: impl Into<Value>,
    ) -> FloeResult<()> {
        let path = path.into();
        let target = node_at_mut(&mut self.root, path.segments(), &path)?;
        match target {
            Value::Seq(items) => {
                let items = Arc::make_mut(items);
                if index > items.len() {
                    return Err(FloeError::index_out_of_bounds(path, index, items.len()));
                }
                items.insert(index, value.into());
                Ok(())
            }
            other => Err(FloeError::type_mismatch(
                path,
                "sequence",
                other.type_name(),
            )),
        }
    }

    /// Shallow-merge the entries of a map into the map at a path,
    /// creating the map when the slot is missing or null.
    ///
    /// Last write wins per key; nested maps are replaced, not merged
    /// (deep override merge is [`crate::merge`]'s job).
    pub fn merge_map(&mut self, path: impl Into<Path>, value: Value) -> FloeResult<()> {
        let path = path.into();
        let source = match value.as_map() {
            Some(entries) => entries.clone(),
            None => {
                return Err(FloeError::type_mismatch(path, "map", value.type_name()));
            }
        };

        let target = get_or_create(&mut self.root, &path, 0, &Value::map)?;
        match target {
            Value::Map(entries) => {
                let entries = Arc::make_mut(entries);
                for (k, v) in source {
                    entries.insert(k, v);
                }
                Ok(())
            }
            other => Err(FloeError::type_mismatch(path, "map", other.type_name())),
        }
    }

    /// Replace the entire draft tree with a new value.
    pub fn replace(&mut self, value: impl Into<Value>) {
        self.root = value.into();
    }

    pub(crate) fn into_root(self) -> Value {
        self.root
    }
}

/// Apply a recipe to a snapshot, returning the next snapshot.
///
/// The recipe receives a [`Draft`] and either mutates it in place
/// (returning `()`) or returns a [`Value`] that replaces the draft
/// wholesale. Either form may be wrapped in a [`FloeResult`] so recipes
/// can use `?` on draft writes.
///
/// Structural sharing: every subtree the recipe never wrote is carried
/// into the result by reference. A true no-op recipe returns a value
/// `ptr_eq` to the input.
///
/// # Examples
///
/// ```
/// use floe_state::{path, produce, Value};
/// use serde_json::json;
///
/// let snap = Value::from_json(json!({"data": [1, 2], "selected": null}));
/// let next = produce(&snap, |draft| draft.set("selected", 0)).unwrap();
///
/// assert_eq!(next.get("selected").unwrap().as_i64(), Some(0));
/// // The untouched subtree is the same allocation.
/// assert!(next.get("data").unwrap().ptr_eq(snap.get("data").unwrap()));
/// ```
pub fn produce<F, R>(snapshot: &Value, recipe: F) -> FloeResult<Value>
where
    F: FnOnce(&mut Draft) -> R,
    R: RecipeOutcome,
{
    let mut draft = Draft::new(snapshot);
    let outcome = recipe(&mut draft);
    outcome.into_next(draft)
}

/// What a recipe may hand back to [`produce`].
///
/// `()` commits the mutated draft; a [`Value`] replaces the draft
/// wholesale; a [`FloeResult`] of either propagates errors.
pub trait RecipeOutcome {
    /// Turn the recipe's return value and the final draft into the next
    /// snapshot.
    fn into_next(self, draft: Draft) -> FloeResult<Value>;
}

impl RecipeOutcome for () {
    fn into_next(self, draft: Draft) -> FloeResult<Value> {
        Ok(draft.into_root())
    }
}

impl RecipeOutcome for Value {
    fn into_next(self, _draft: Draft) -> FloeResult<Value> {
        Ok(self)
    }
}

impl<R: RecipeOutcome> RecipeOutcome for FloeResult<R> {
    fn into_next(self, draft: Draft) -> FloeResult<Value> {
        self?.into_next(draft)
    }
}

/// Recursively set a value, reallocating only the written path.
fn set_at(current: &mut Value, segments: &[Seg], value: Value, full_path: &Path) -> FloeResult<()> {
    match segments {
        [] => {
            *current = value;
            Ok(())
        }
        [Seg::Key(key), rest @ ..] => {
            // A non-map slot on the way down is overwritten with a map.
            if !current.is_map() {
                *current = Value::map();
            }
            let Value::Map(entries) = current else {
                unreachable!()
            };
            let entries = Arc::make_mut(entries);
            let slot = entries.entry(key.clone()).or_insert(Value::Null);
            set_at(slot, rest, value, full_path)
        }
        [Seg::Index(idx), rest @ ..] => {
            let Value::Seq(items) = current else {
                return Err(FloeError::type_mismatch(
                    full_path.clone(),
                    "sequence",
                    current.type_name(),
                ));
            };
            let len = items.len();
            if *idx >= len {
                return Err(FloeError::index_out_of_bounds(full_path.clone(), *idx, len));
            }
            let items = Arc::make_mut(items);
            set_at(&mut items[*idx], rest, value, full_path)
        }
    }
}

/// Try to delete at a path. Returns whether anything was removed.
///
/// Misses are detected before any `make_mut`, so a no-op delete does not
/// reallocate the path it walked.
fn delete_at(current: &mut Value, segments: &[Seg]) -> bool {
    match segments {
        [] => false,
        [Seg::Key(key)] => match current {
            Value::Map(entries) => {
                if !entries.contains_key(key.as_str()) {
                    return false;
                }
                Arc::make_mut(entries).shift_remove(key.as_str()).is_some()
            }
            _ => false,
        },
        [Seg::Index(idx)] => match current {
            Value::Seq(items) => {
                if *idx >= items.len() {
                    return false;
                }
                Arc::make_mut(items).remove(*idx);
                true
            }
            _ => false,
        },
        [Seg::Key(key), rest @ ..] => match current {
            Value::Map(entries) => {
                if !entries.contains_key(key.as_str()) {
                    return false;
                }
                let entries = Arc::make_mut(entries);
                match entries.get_mut(key.as_str()) {
                    Some(child) => delete_at(child, rest),
                    None => false,
                }
            }
            _ => false,
        },
        [Seg::Index(idx), rest @ ..] => match current {
            Value::Seq(items) => {
                if *idx >= items.len() {
                    return false;
                }
                delete_at(&mut Arc::make_mut(items)[*idx], rest)
            }
            _ => false,
        },
    }
}

/// Navigate to an existing node, reallocating the walked path.
fn node_at_mut<'a>(
    current: &'a mut Value,
    segments: &[Seg],
    full_path: &Path,
) -> FloeResult<&'a mut Value> {
    match segments {
        [] => Ok(current),
        [Seg::Key(key), rest @ ..] => match current {
            Value::Map(entries) => {
                if !entries.contains_key(key.as_str()) {
                    return Err(FloeError::path_not_found(full_path.clone()));
                }
                let entries = Arc::make_mut(entries);
                let child = entries
                    .get_mut(key.as_str())
                    .expect("key checked just above");
                node_at_mut(child, rest, full_path)
            }
            other => Err(FloeError::type_mismatch(
                full_path.clone(),
                "map",
                other.type_name(),
            )),
        },
        [Seg::Index(idx), rest @ ..] => match current {
            Value::Seq(items) => {
                let len = items.len();
                if *idx >= len {
                    return Err(FloeError::index_out_of_bounds(full_path.clone(), *idx, len));
                }
                node_at_mut(&mut Arc::make_mut(items)[*idx], rest, full_path)
            }
            other => Err(FloeError::type_mismatch(
                full_path.clone(),
                "sequence",
                other.type_name(),
            )),
        },
    }
}

/// Navigate to a node, creating it with `default` when missing or null.
///
/// Key segments create intermediate maps (overwriting scalars on the
/// way, like [`Draft::set`]); index segments must already exist.
fn get_or_create<'a>(
    current: &'a mut Value,
    full_path: &Path,
    consumed: usize,
    default: &dyn Fn() -> Value,
) -> FloeResult<&'a mut Value> {
    let segments = &full_path.segments()[consumed..];
    match segments {
        [] => {
            if current.is_null() {
                *current = default();
            }
            Ok(current)
        }
        [Seg::Key(key), ..] => {
            if !current.is_map() {
                *current = Value::map();
            }
            let Value::Map(entries) = current else {
                unreachable!()
            };
            let entries = Arc::make_mut(entries);
            let slot = entries.entry(key.clone()).or_insert(Value::Null);
            get_or_create(slot, full_path, consumed + 1, default)
        }
        [Seg::Index(idx), ..] => {
            let error_path = Path::from_segments(full_path.segments()[..=consumed].to_vec());
            let Value::Seq(items) = current else {
                return Err(FloeError::type_mismatch(
                    error_path,
                    "sequence",
                    current.type_name(),
                ));
            };
            let len = items.len();
            if *idx >= len {
                return Err(FloeError::index_out_of_bounds(error_path, *idx, len));
            }
            get_or_create(&mut Arc::make_mut(items)[*idx], full_path, consumed + 1, default)
        }
    }
}
