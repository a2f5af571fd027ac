//! High-level container: a store plus named mutations and selectors.
//!
//! A `Container` owns one [`Store`] and binds a set of named,
//! recipe-producing mutations and named read selectors to it. Each
//! mutation dispatches with its own name as the action's diagnostic
//! label, so tracing output names the originating mutation instead of a
//! generic "set".

use crate::draft::{Draft, RecipeOutcome};
use crate::error::{FloeError, FloeResult};
use crate::merge::merge;
use crate::selector::Selection;
use crate::store::{Store, Subscription};
use crate::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// A named, registered state edit: takes the caller's arguments and
/// dispatches one (or more) labeled set actions.
pub type MutationFn = Arc<dyn Fn(&[Value]) -> FloeResult<()> + Send + Sync>;

/// A named pure projection from a snapshot.
pub type SelectorFn = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Factory producing the mutation map for one set of bindings.
///
/// Invoked once at construction to discover the mutation names, and
/// then once per mutation call with `set_state` rebound to that
/// mutation's label, so the closures it returns always see the binding
/// that names them.
pub type MutationFactory =
    Arc<dyn Fn(&MutationBindings) -> HashMap<String, MutationFn> + Send + Sync>;

/// The dispatch primitive handed to a [`MutationFactory`].
#[derive(Clone)]
pub struct MutationBindings {
    set_state: LabeledSetState,
}

impl MutationBindings {
    /// The labeled `set_state` primitive for the mutation being built.
    pub fn set_state(&self) -> &LabeledSetState {
        &self.set_state
    }
}

/// `set_state` bound to a store and a diagnostic label.
#[derive(Clone)]
pub struct LabeledSetState {
    store: Store,
    label: Arc<str>,
}

impl LabeledSetState {
    /// Produce the next snapshot from `recipe` and dispatch it under
    /// this binding's label.
    pub fn apply<F, R>(&self, recipe: F) -> FloeResult<()>
    where
        F: FnOnce(&mut Draft) -> R,
        R: RecipeOutcome,
    {
        self.store.set_state_labeled(Arc::clone(&self.label), recipe)
    }

    /// The label this binding dispatches under.
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Construction-time configuration for a [`Container`].
#[derive(Default)]
pub struct ContainerConfig {
    name: Option<String>,
    selectors: HashMap<String, SelectorFn>,
    mutations: Option<MutationFactory>,
    overrides: Option<Value>,
}

impl ContainerConfig {
    /// An empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Name the container for diagnostics.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Register a named selector.
    pub fn with_selector(
        mut self,
        name: impl Into<String>,
        selector: impl Fn(&Value) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.selectors.insert(name.into(), Arc::new(selector));
        self
    }

    /// Supply the mutation factory.
    pub fn with_mutations(
        mut self,
        factory: impl Fn(&MutationBindings) -> HashMap<String, MutationFn> + Send + Sync + 'static,
    ) -> Self {
        self.mutations = Some(Arc::new(factory));
        self
    }

    /// Supply a partial override tree, merged onto the initial value
    /// before the first snapshot is published (see [`crate::merge`]).
    ///
    /// This lets one base configuration be reused with scoped
    /// deviations, e.g. per-test-case state.
    pub fn with_overrides(mut self, overrides: Value) -> Self {
        self.overrides = Some(overrides);
        self
    }
}

/// A store with named mutations and selectors bound to it.
///
/// # Examples
///
/// ```
/// use floe_state::{mutations, Container, ContainerConfig, Value};
/// use serde_json::json;
///
/// let container = Container::new(
///     Value::from_json(json!({"count": 0})),
///     ContainerConfig::new().with_mutations(|b| {
///         mutations! {
///             "increment" => |set = b, _args| set.apply(|d| {
///                 let n = d.get(&floe_state::path!("count")).and_then(Value::as_i64).unwrap_or(0);
///                 d.set("count", n + 1)
///             }),
///         }
///     }),
/// );
///
/// container.mutate("increment", &[]).unwrap();
/// assert_eq!(container.get_state().get("count").unwrap().as_i64(), Some(1));
/// ```
pub struct Container {
    name: Option<String>,
    store: Store,
    mutations: HashMap<String, MutationFn>,
    selectors: HashMap<String, SelectorFn>,
}

impl Container {
    /// Build a container from an initial value tree and a configuration.
    ///
    /// The initial value is deep-cloned so the container never aliases
    /// caller-held trees; overrides are merged onto the copy before the
    /// first snapshot is published.
    pub fn new(initial: impl Into<Value>, config: ContainerConfig) -> Self {
        let mut base = initial.into().deep_clone();
        if let Some(overrides) = &config.overrides {
            merge(&mut base, overrides);
        }

        let store = Store::new(base);
        let mutations = match &config.mutations {
            Some(factory) => build_mutations(&store, factory),
            None => HashMap::new(),
        };

        debug!(
            name = config.name.as_deref().unwrap_or("<unnamed>"),
            mutations = mutations.len(),
            selectors = config.selectors.len(),
            "container created"
        );

        Self {
            name: config.name,
            store,
            mutations,
            selectors: config.selectors,
        }
    }

    /// The diagnostic name, if configured.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The underlying store.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// The current snapshot.
    pub fn get_state(&self) -> Value {
        self.store.get_state()
    }

    /// Produce the next snapshot from a recipe and publish it.
    pub fn set_state<F, R>(&self, recipe: F) -> FloeResult<()>
    where
        F: FnOnce(&mut Draft) -> R,
        R: RecipeOutcome,
    {
        self.store.set_state(recipe)
    }

    /// Restore the construction snapshot.
    pub fn reset(&self) {
        self.store.reset();
    }

    /// Register a change listener (see [`Store::subscribe`]).
    pub fn subscribe(&self, listener: impl Fn() + Send + Sync + 'static) -> Subscription {
        self.store.subscribe(listener)
    }

    /// Invoke the named mutation with the given arguments.
    pub fn mutate(&self, name: &str, args: &[Value]) -> FloeResult<()> {
        let mutation = self
            .mutations
            .get(name)
            .ok_or_else(|| FloeError::unknown_mutation(name))?;
        mutation(args)
    }

    /// Look up a named mutation callable.
    pub fn mutation(&self, name: &str) -> Option<MutationFn> {
        self.mutations.get(name).cloned()
    }

    /// Registered mutation names.
    pub fn mutation_names(&self) -> impl Iterator<Item = &str> {
        self.mutations.keys().map(String::as_str)
    }

    /// Evaluate the named selector against the current snapshot.
    pub fn select(&self, name: &str) -> FloeResult<Value> {
        let selector = self
            .selectors
            .get(name)
            .ok_or_else(|| FloeError::unknown_selector(name))?;
        Ok(selector(&self.store.get_state()))
    }

    /// Look up a named selector.
    pub fn selector(&self, name: &str) -> Option<SelectorFn> {
        self.selectors.get(name).cloned()
    }

    /// Build a memoized [`Selection`] over this container's store.
    pub fn watch<T: Clone + PartialEq + Send + 'static>(
        &self,
        selector: impl Fn(&Value) -> T + Send + Sync + 'static,
    ) -> Selection<T> {
        Selection::new(self.store.clone(), selector)
    }

    /// Reserved for a future history implementation. Currently inert.
    pub fn undo(&self) {}

    /// Reserved for a future history implementation. Currently inert.
    pub fn redo(&self) {}
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("name", &self.name)
            .field("mutations", &self.mutations.len())
            .field("selectors", &self.selectors.len())
            .finish()
    }
}

/// Discover mutation names, then wrap each so a call rebuilds the map
/// with `set_state` bound to that mutation's label.
///
/// Rebuilding per call costs an allocation but guarantees the recipe
/// closure sees the binding carrying its own name; the factory never
/// has to know the names in advance.
fn build_mutations(store: &Store, factory: &MutationFactory) -> HashMap<String, MutationFn> {
    let probe = MutationBindings {
        set_state: LabeledSetState {
            store: store.clone(),
            label: "set".into(),
        },
    };

    let mut wrapped: HashMap<String, MutationFn> = HashMap::new();
    for name in factory(&probe).into_keys() {
        let factory = Arc::clone(factory);
        let store = store.clone();
        let label: Arc<str> = name.as_str().into();
        let lookup = name.clone();

        wrapped.insert(
            name,
            Arc::new(move |args: &[Value]| {
                let bindings = MutationBindings {
                    set_state: LabeledSetState {
                        store: store.clone(),
                        label: Arc::clone(&label),
                    },
                };
                let map = factory(&bindings);
                let mutation = map
                    .get(&lookup)
                    .ok_or_else(|| FloeError::unknown_mutation(lookup.as_str()))?;
                mutation(args)
            }),
        );
    }
    wrapped
}

/// Build the `HashMap<String, MutationFn>` a mutation factory returns.
///
/// Each entry binds the factory's [`MutationBindings`] under a local
/// name and captures it in the mutation closure:
///
/// ```
/// use floe_state::{mutations, Container, ContainerConfig, Value};
/// use serde_json::json;
///
/// let container = Container::new(
///     Value::from_json(json!({"items": []})),
///     ContainerConfig::new().with_mutations(|b| {
///         mutations! {
///             "add" => |set = b, args| {
///                 let item = args.first().cloned().unwrap_or(Value::Null);
///                 set.apply(|d| d.push("items", item))
///             },
///             "clear" => |set = b, _args| set.apply(|d| d.set("items", Value::seq())),
///         }
///     }),
/// );
///
/// container.mutate("add", &[Value::from(7)]).unwrap();
/// assert_eq!(container.get_state().get("items").unwrap().len(), Some(1));
/// ```
#[macro_export]
macro_rules! mutations {
    ($($name:literal => |$set:ident = $bindings:expr, $args:pat_param| $body:expr),+ $(,)?) => {{
        let mut map: ::std::collections::HashMap<::std::string::String, $crate::MutationFn> =
            ::std::collections::HashMap::new();
        $(
            {
                let $set = $bindings.set_state().clone();
                map.insert(
                    $name.into(),
                    ::std::sync::Arc::new(move |$args: &[$crate::Value]| $body),
                );
            }
        )+
        map
    }};
}
