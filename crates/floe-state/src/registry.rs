//! Process-wide registry of named containers.
//!
//! Lets widely separated parts of a program share one container by
//! name instead of threading handles through every call chain. The
//! registry is lazy and lock-guarded; containers are held behind `Arc`
//! so handles stay valid after removal.

use crate::container::{Container, ContainerConfig};
use crate::error::{FloeError, FloeResult};
use crate::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use tracing::debug;

static REGISTRY: OnceLock<Mutex<HashMap<String, Arc<Container>>>> = OnceLock::new();

fn registry() -> &'static Mutex<HashMap<String, Arc<Container>>> {
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Register a new named container.
///
/// Fails with [`FloeError::ContainerExists`] when the name is taken;
/// re-registering is almost always a wiring bug, so it is refused
/// rather than silently replacing live state.
///
/// Construction runs outside the registry lock, so a mutation factory
/// may itself look up other registered containers.
pub fn init_container(
    name: impl Into<String>,
    initial: impl Into<Value>,
    config: ContainerConfig,
) -> FloeResult<Arc<Container>> {
    let name = name.into();
    if registry().lock().unwrap().contains_key(&name) {
        return Err(FloeError::container_exists(&name));
    }

    let container = Arc::new(Container::new(initial, config.with_name(name.clone())));

    let mut map = registry().lock().unwrap();
    // Re-check: another thread may have registered the name while the
    // container was being built.
    if map.contains_key(&name) {
        return Err(FloeError::container_exists(&name));
    }
    map.insert(name.clone(), Arc::clone(&container));
    debug!(name = %name, "container registered");
    Ok(container)
}

/// Look up a registered container by name.
pub fn get_container(name: &str) -> Option<Arc<Container>> {
    registry().lock().unwrap().get(name).cloned()
}

/// Look up a container, registering it from `init` on first use.
///
/// `init` runs outside the registry lock and may therefore use the
/// registry itself. When two callers race on the same unregistered
/// name, both run `init` but only one container is kept; the loser's
/// is discarded and the winner's returned to both.
pub fn get_or_init_container(
    name: &str,
    init: impl FnOnce() -> (Value, ContainerConfig),
) -> Arc<Container> {
    if let Some(container) = registry().lock().unwrap().get(name) {
        return Arc::clone(container);
    }

    let (initial, config) = init();
    let container = Arc::new(Container::new(initial, config.with_name(name)));

    let mut map = registry().lock().unwrap();
    match map.get(name) {
        Some(existing) => Arc::clone(existing),
        None => {
            map.insert(name.to_string(), Arc::clone(&container));
            debug!(name = %name, "container registered");
            container
        }
    }
}

/// Remove a container from the registry.
///
/// Existing `Arc` handles keep working; the name simply becomes
/// available again.
pub fn remove_container(name: &str) -> Option<Arc<Container>> {
    let removed = registry().lock().unwrap().remove(name);
    if removed.is_some() {
        debug!(name = %name, "container removed");
    }
    removed
}

/// Drop every registered container. Intended for test teardown.
pub fn clear_containers() {
    registry().lock().unwrap().clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // Registry state is process-global, so each test uses unique names
    // and cleans up after itself.

    fn v(j: serde_json::Value) -> Value {
        Value::from_json(j)
    }

    #[test]
    fn test_init_and_get() {
        let name = "registry-init-and-get";
        let container = init_container(name, v(json!({"x": 1})), ContainerConfig::new()).unwrap();
        assert_eq!(container.name(), Some(name));

        let fetched = get_container(name).unwrap();
        assert!(Arc::ptr_eq(&container, &fetched));
        remove_container(name);
    }

    #[test]
    fn test_duplicate_name_refused() {
        let name = "registry-duplicate";
        init_container(name, v(json!({})), ContainerConfig::new()).unwrap();
        let err = init_container(name, v(json!({})), ContainerConfig::new()).unwrap_err();
        assert!(matches!(err, FloeError::ContainerExists { .. }));
        remove_container(name);
    }

    #[test]
    fn test_get_or_init_runs_init_once() {
        let name = "registry-get-or-init";
        let first = get_or_init_container(name, || (v(json!({"n": 1})), ContainerConfig::new()));
        let second = get_or_init_container(name, || {
            panic!("init must not run for a registered name")
        });
        assert!(Arc::ptr_eq(&first, &second));
        remove_container(name);
    }

    #[test]
    fn test_get_or_init_init_may_use_registry() {
        let base = "registry-nested-base";
        let derived = "registry-nested-derived";
        init_container(base, v(json!({"x": 1})), ContainerConfig::new()).unwrap();

        // init reads another container through the registry; this must
        // not contend with the lock get_or_init_container takes.
        let container = get_or_init_container(derived, || {
            let dep = get_container(base).unwrap();
            (dep.get_state(), ContainerConfig::new())
        });
        assert_eq!(container.get_state().get("x").unwrap().as_i64(), Some(1));

        remove_container(derived);
        remove_container(base);
    }

    #[test]
    fn test_remove_frees_name_but_not_handles() {
        let name = "registry-remove";
        let container = init_container(name, v(json!({"x": 1})), ContainerConfig::new()).unwrap();
        let removed = remove_container(name).unwrap();
        assert!(Arc::ptr_eq(&container, &removed));
        assert!(get_container(name).is_none());

        // The old handle still serves state.
        assert_eq!(container.get_state().get("x").unwrap().as_i64(), Some(1));

        // The name is reusable.
        init_container(name, v(json!({"x": 2})), ContainerConfig::new()).unwrap();
        remove_container(name);
    }
}
