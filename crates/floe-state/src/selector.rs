//! Equality-memoized selector views over a store.
//!
//! A [`Selection`] decouples "the state changed" from "this particular
//! read changed": the selector re-runs only when the store's version
//! moved, and the cached derived value is replaced only when the
//! equality function says it actually differs. A consumer selecting an
//! untouched field keeps getting the previously cached value (the same
//! allocation, when the derived type is [`Value`]) no matter how many
//! unrelated fields mutate underneath.
//!
//! This is the payoff of structural sharing: with `Value::ptr_eq` as the
//! equality function, "unchanged" is a pointer comparison, free for any
//! subtree the producing recipe never touched.

use crate::store::{Store, Subscription};
use crate::Value;
use std::sync::{Arc, Mutex};

/// A pure projection from a snapshot to a derived value.
type SelectorOf<T> = Arc<dyn Fn(&Value) -> T + Send + Sync>;

/// Comparator deciding whether a derived value counts as changed.
type EqualityOf<T> = Arc<dyn Fn(&T, &T) -> bool + Send + Sync>;

struct Cache<T> {
    seen_version: u64,
    value: T,
}

/// A memoizing read layer on top of a [`Store`].
///
/// The selector must be pure: side effects or non-deterministic output
/// violate the re-evaluation contract and give unspecified results.
///
/// # Examples
///
/// ```
/// use floe_state::{Selection, Store, Value};
/// use serde_json::json;
///
/// let store = Store::new(Value::from_json(json!({"data": [], "selected": null})));
/// let selected = Selection::new(store.clone(), |s: &Value| s.get("selected").cloned());
///
/// store.set_state(|d| d.push("data", 1)).unwrap();
/// // Unrelated write: the derived value is unchanged.
/// assert_eq!(selected.get(), Some(Value::Null));
/// ```
pub struct Selection<T> {
    store: Store,
    selector: SelectorOf<T>,
    equal: EqualityOf<T>,
    cache: Mutex<Cache<T>>,
}

impl<T: Clone + PartialEq + Send + 'static> Selection<T> {
    /// Create a selection with structural equality as the comparator.
    pub fn new(store: Store, selector: impl Fn(&Value) -> T + Send + Sync + 'static) -> Self {
        Self::with_equality(store, selector, |prev, next| prev == next)
    }
}

impl<T: Clone + Send + 'static> Selection<T> {
    /// Create a selection with a caller-supplied equality function.
    ///
    /// Useful to treat two list copies with the same elements as equal,
    /// or to compare by `Value::ptr_eq` when the derived type is a
    /// subtree of the snapshot.
    pub fn with_equality(
        store: Store,
        selector: impl Fn(&Value) -> T + Send + Sync + 'static,
        equal: impl Fn(&T, &T) -> bool + Send + Sync + 'static,
    ) -> Self {
        let initial = selector(&store.get_state());
        let cache = Mutex::new(Cache {
            seen_version: store.version(),
            value: initial,
        });
        Self {
            store,
            selector: Arc::new(selector),
            equal: Arc::new(equal),
            cache,
        }
    }

    /// The current derived value.
    ///
    /// Recomputes the selector only when the store changed since the
    /// last read; republishes only when the result is not equal to the
    /// cached one; otherwise the cached value (same allocation) keeps
    /// being returned.
    pub fn get(&self) -> T {
        let version = self.store.version();
        let mut cache = self.cache.lock().unwrap();
        if cache.seen_version != version {
            let next = (self.selector)(&self.store.get_state());
            cache.seen_version = version;
            if !(self.equal)(&cache.value, &next) {
                cache.value = next;
            }
        }
        cache.value.clone()
    }

    /// Register a change listener. Forwards directly to the store's
    /// subscribe: the listener fires on every dispatch and should call
    /// [`get`](Selection::get) to learn whether its read changed.
    pub fn subscribe(&self, on_change: impl Fn() + Send + Sync + 'static) -> Subscription {
        self.store.subscribe(on_change)
    }

    /// The store this selection reads from.
    pub fn store(&self) -> &Store {
        &self.store
    }
}
