//! End-to-end tests for containers, subscriptions, and the registry.

use floe_state::{
    clear_containers, init_container, mutations, path, Container, ContainerConfig, FloeError,
    Selection, Value,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn v(j: serde_json::Value) -> Value {
    Value::from_json(j)
}

fn list_container() -> Container {
    Container::new(
        v(json!({"data": [], "selected": null})),
        ContainerConfig::new()
            .with_name("list")
            .with_selector("selected", |s| {
                s.get("selected").cloned().unwrap_or(Value::Null)
            })
            .with_mutations(|b| {
                mutations! {
                    "add" => |set = b, args| {
                        let count = args.first().and_then(Value::as_i64).unwrap_or(0);
                        set.apply(|d| -> floe_state::FloeResult<()> {
                            for i in 0..count {
                                d.push("data", v(json!({"id": i, "label": format!("row {i}")})))?;
                            }
                            Ok(())
                        })
                    },
                    "select" => |set = b, args| {
                        let id = args.first().cloned().unwrap_or(Value::Null);
                        set.apply(|d| d.set("selected", id))
                    },
                    "clear" => |set = b, _args| set.apply(|d| {
                        d.set("data", Value::seq())?;
                        d.set("selected", Value::Null)
                    }),
                }
            }),
    )
}

// ============================================================================
// Container end to end
// ============================================================================

#[test]
fn test_bulk_add_notifies_once_and_preserves_old_snapshot() {
    let container = list_container();
    let before = container.get_state();

    let fired = Arc::new(AtomicUsize::new(0));
    let fired_in = Arc::clone(&fired);
    let sub = container.subscribe(move || {
        fired_in.fetch_add(1, Ordering::SeqCst);
    });

    container.mutate("add", &[Value::from(1000)]).unwrap();

    // One mutation, one dispatch, one notification.
    assert_eq!(fired.load(Ordering::SeqCst), 1);

    let after = container.get_state();
    assert_eq!(after.get("data").unwrap().len(), Some(1000));
    assert_eq!(
        after
            .get("data")
            .unwrap()
            .get_index(999)
            .unwrap()
            .get("label")
            .unwrap()
            .as_str(),
        Some("row 999")
    );

    // The pre-dispatch snapshot is untouched.
    assert_eq!(before.get("data").unwrap().len(), Some(0));
    assert!(before.get("selected").unwrap().is_null());

    sub.unsubscribe();
}

#[test]
fn test_untouched_branch_shared_across_mutations() {
    let container = list_container();
    container.mutate("add", &[Value::from(100)]).unwrap();

    let before = container.get_state();
    container.mutate("select", &[Value::from(42)]).unwrap();
    let after = container.get_state();

    // Selecting rewrites the root and "selected" but shares "data".
    assert!(before.get("data").unwrap().ptr_eq(after.get("data").unwrap()));
    assert_eq!(after.get("selected").unwrap().as_i64(), Some(42));
    assert!(before.get("selected").unwrap().is_null());
}

#[test]
fn test_reset_restores_initial_snapshot() {
    let container = list_container();
    container.mutate("add", &[Value::from(10)]).unwrap();
    container.mutate("select", &[Value::from(3)]).unwrap();

    container.reset();

    let state = container.get_state();
    assert_eq!(state.get("data").unwrap().len(), Some(0));
    assert!(state.get("selected").unwrap().is_null());
}

#[test]
fn test_named_selector_reads_current_snapshot() {
    let container = list_container();
    assert!(container.select("selected").unwrap().is_null());

    container.mutate("select", &[Value::from(7)]).unwrap();
    assert_eq!(container.select("selected").unwrap().as_i64(), Some(7));

    assert!(matches!(
        container.select("missing"),
        Err(FloeError::UnknownSelector { .. })
    ));
}

#[test]
fn test_listener_ordering_and_exactly_once() {
    let container = list_container();
    let order = Arc::new(Mutex::new(Vec::new()));

    let o = Arc::clone(&order);
    let first = container.subscribe(move || o.lock().unwrap().push("first"));
    let o = Arc::clone(&order);
    let second = container.subscribe(move || o.lock().unwrap().push("second"));

    container.mutate("add", &[Value::from(1)]).unwrap();
    container.mutate("clear", &[]).unwrap();

    assert_eq!(
        *order.lock().unwrap(),
        vec!["first", "second", "first", "second"]
    );

    first.unsubscribe();
    second.unsubscribe();
}

#[test]
fn test_selection_over_container_store() {
    let container = list_container();
    let runs = Arc::new(AtomicUsize::new(0));

    let runs_in = Arc::clone(&runs);
    let selected: Selection<Value> = container.watch(move |s| {
        runs_in.fetch_add(1, Ordering::SeqCst);
        s.get("selected").cloned().unwrap_or(Value::Null)
    });
    let after_construction = runs.load(Ordering::SeqCst);

    // Mutating an unrelated branch re-runs the selector but the
    // projected value is unchanged.
    container.mutate("add", &[Value::from(5)]).unwrap();
    assert!(selected.get().is_null());

    // Repeat reads at the same version hit the cache.
    let after_read = runs.load(Ordering::SeqCst);
    assert!(selected.get().is_null());
    assert_eq!(runs.load(Ordering::SeqCst), after_read);
    assert!(after_read > after_construction);

    container.mutate("select", &[Value::from(2)]).unwrap();
    assert_eq!(selected.get().as_i64(), Some(2));
}

#[test]
fn test_mutation_error_leaves_state_unchanged() {
    let container = list_container();
    container.mutate("add", &[Value::from(3)]).unwrap();
    let before = container.get_state();

    // Indexing past the end of "data" fails inside the recipe.
    let err = container
        .store()
        .set_state(|d| d.set(path!("data", 99, "id"), 0))
        .unwrap_err();
    assert!(matches!(err, FloeError::IndexOutOfBounds { .. }));

    assert!(container.get_state().ptr_eq(&before));
}

// ============================================================================
// Registry
// ============================================================================

// The registry is process-global, so a single test drives the whole
// lifecycle rather than racing parallel test threads against clear.
#[test]
fn test_registry_lifecycle() {
    let container = init_container(
        "integration-settings",
        v(json!({"theme": "dark"})),
        ContainerConfig::new(),
    )
    .unwrap();

    let fetched = floe_state::get_container("integration-settings").unwrap();
    assert!(Arc::ptr_eq(&container, &fetched));

    fetched.set_state(|d| d.set("theme", "light")).unwrap();
    assert_eq!(
        container.get_state().get("theme").unwrap().as_str(),
        Some("light")
    );

    floe_state::remove_container("integration-settings");
    assert!(floe_state::get_container("integration-settings").is_none());

    init_container("integration-clear-a", v(json!({})), ContainerConfig::new()).unwrap();
    init_container("integration-clear-b", v(json!({})), ContainerConfig::new()).unwrap();
    clear_containers();
    assert!(floe_state::get_container("integration-clear-a").is_none());
    assert!(floe_state::get_container("integration-clear-b").is_none());
}
