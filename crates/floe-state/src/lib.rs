//! Immutable-snapshot state container with copy-on-write recipes.
//!
//! `floe-state` keeps application state as an immutable value tree
//! behind a single-writer [`Store`]. Reads hand out cheap snapshots;
//! writes run a recipe against a [`Draft`] that path-copies only the
//! branch it touches, so successive snapshots share every untouched
//! subtree.
//!
//! # Core Concepts
//!
//! - **Value**: Shared immutable JSON-like tree (`Arc`-backed maps and
//!   sequences, insertion order preserved)
//! - **Draft / produce**: Copy-on-write editing; `produce(base, recipe)`
//!   returns the next snapshot without mutating the base
//! - **Store**: Single-writer action dispatch with synchronous,
//!   exactly-once listener notification
//! - **Selection**: Version-gated memoized projection over a store
//! - **Container**: A store bundled with named mutations and selectors
//! - **Registry**: Process-wide named containers for cross-module access
//!
//! # Snapshot Semantics
//!
//! ```text
//! next = produce(current, recipe)
//! ```
//!
//! - `current` is never mutated; handles taken before a dispatch keep
//!   reading the old tree
//! - Untouched subtrees are shared by pointer between `current` and
//!   `next`, so `ptr_eq` detects unchanged branches in O(1)
//!
//! # Quick Start
//!
//! ```
//! use floe_state::{Store, Value};
//! use serde_json::json;
//!
//! let store = Store::new(Value::from_json(json!({
//!     "todos": [],
//!     "filter": "all",
//! })));
//!
//! let seen = store.subscribe(|| println!("state changed"));
//!
//! store.set_state(|d| d.push("todos", Value::from("write docs"))).unwrap();
//!
//! let state = store.get_state();
//! assert_eq!(state.get("todos").unwrap().len(), Some(1));
//! assert_eq!(state.get("filter").unwrap().as_str(), Some("all"));
//! seen.unsubscribe();
//! ```
//!
//! # Named Mutations
//!
//! A [`Container`] binds named mutations to a store so dispatches are
//! labeled with the mutation that produced them:
//!
//! ```
//! use floe_state::{mutations, Container, ContainerConfig, Value};
//! use serde_json::json;
//!
//! let todos = Container::new(
//!     Value::from_json(json!({"items": []})),
//!     ContainerConfig::new().with_mutations(|b| {
//!         mutations! {
//!             "add" => |set = b, args| {
//!                 let item = args.first().cloned().unwrap_or(Value::Null);
//!                 set.apply(|d| d.push("items", item))
//!             },
//!         }
//!     }),
//! );
//!
//! todos.mutate("add", &[Value::from("ship it")]).unwrap();
//! assert_eq!(todos.get_state().get("items").unwrap().len(), Some(1));
//! ```

mod container;
mod draft;
mod error;
mod merge;
mod path;
mod registry;
mod selector;
mod store;
mod value;

// Core value model
pub use value::{Map, Value};

// Paths
pub use path::{parse_path, Path, Seg};

// Errors
pub use error::{FloeError, FloeResult};

// Copy-on-write editing
pub use draft::{produce, Draft, RecipeOutcome};
pub use merge::{merge, merge_all};

// Store and subscriptions
pub use selector::Selection;
pub use store::{Action, ActionKind, Store, Subscription};

// Containers and the global registry
pub use container::{
    Container, ContainerConfig, LabeledSetState, MutationBindings, MutationFactory, MutationFn,
    SelectorFn,
};
pub use registry::{
    clear_containers, get_container, get_or_init_container, init_container, remove_container,
};
