//! The state container: one current snapshot, a subscriber list, and a
//! serialized dispatch path.
//!
//! `Store` is the single point of mutation. `dispatch` applies an action
//! and synchronously notifies every listener before it returns; two
//! dispatches are always totally ordered, and no reader ever observes a
//! half-applied recipe.
//!
//! Two edge behaviors are pinned down here:
//!
//! - **Reentrant dispatch is deferred.** A dispatch issued from inside a
//!   listener is queued and runs after the current notification pass
//!   completes, in arrival order.
//! - **Unsubscribing mid-notification does not affect the current
//!   pass.** The listener list is snapshotted before a pass; removal
//!   takes effect from the next dispatch on.

use crate::draft::{produce, Draft, RecipeOutcome};
use crate::error::FloeResult;
use crate::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tracing::debug;

/// What an action does to the current snapshot.
#[derive(Clone, Debug)]
pub enum ActionKind {
    /// Restore the snapshot the store was constructed with.
    Reset,
    /// Publish a fully-computed next snapshot.
    Set(Value),
}

/// A dispatched state transition.
///
/// The `label` names the originating mutation for diagnostics (it is
/// what shows up in tracing output); it has no effect on semantics.
#[derive(Clone, Debug)]
pub struct Action {
    label: Arc<str>,
    kind: ActionKind,
}

impl Action {
    /// A reset action.
    pub fn reset() -> Self {
        Self {
            label: "reset".into(),
            kind: ActionKind::Reset,
        }
    }

    /// A set action publishing `next` as the new snapshot.
    pub fn set(next: Value) -> Self {
        Self {
            label: "set".into(),
            kind: ActionKind::Set(next),
        }
    }

    /// Attach a diagnostic label naming the originating mutation.
    pub fn with_label(mut self, label: impl Into<Arc<str>>) -> Self {
        self.label = label.into();
        self
    }

    /// The diagnostic label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The action kind.
    pub fn kind(&self) -> &ActionKind {
        &self.kind
    }
}

type Listener = Arc<dyn Fn() + Send + Sync>;

struct StoreInner {
    initial: Value,
    state: Mutex<Value>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_listener_id: AtomicU64,
    version: AtomicU64,
    /// Guards the notification pass; set while some dispatch is draining
    /// the pending queue.
    notifying: AtomicBool,
    pending: Mutex<VecDeque<Action>>,
}

/// The single-writer state container.
///
/// Cloning a `Store` clones a handle to the same instance; the snapshot
/// itself is immutable and cheap to read.
///
/// # Examples
///
/// ```
/// use floe_state::{Store, Value};
/// use serde_json::json;
///
/// let store = Store::new(Value::from_json(json!({"count": 0})));
/// store.set_state(|d| d.set("count", 1)).unwrap();
/// assert_eq!(store.get_state().get("count").unwrap().as_i64(), Some(1));
///
/// store.reset();
/// assert_eq!(store.get_state().get("count").unwrap().as_i64(), Some(0));
/// ```
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Create a store holding `initial` as its first snapshot.
    ///
    /// `initial` is also retained for [`reset`](Store::reset).
    pub fn new(initial: Value) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                state: Mutex::new(initial.clone()),
                initial,
                listeners: Mutex::new(Vec::new()),
                next_listener_id: AtomicU64::new(0),
                version: AtomicU64::new(0),
                notifying: AtomicBool::new(false),
                pending: Mutex::new(VecDeque::new()),
            }),
        }
    }

    /// The current snapshot. O(1): a reference-counted clone under a
    /// short lock.
    pub fn get_state(&self) -> Value {
        self.inner.state.lock().unwrap().clone()
    }

    /// Monotonic counter bumped once per applied action.
    ///
    /// The selector layer uses this to decide whether a derived value
    /// could possibly have changed since it last looked.
    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::Acquire)
    }

    /// Apply an action and synchronously notify every listener.
    ///
    /// Reducer evaluation and all notifications complete before
    /// `dispatch` returns, except for reentrant dispatches, which are
    /// queued behind the pass that is already running and drained by it.
    pub fn dispatch(&self, action: Action) {
        self.inner.pending.lock().unwrap().push_back(action);

        // A pass is already draining the queue (either a listener of
        // this store dispatching reentrantly, or another handle); it
        // will pick the action up.
        if self.inner.notifying.swap(true, Ordering::AcqRel) {
            return;
        }

        // The guard clears the flag if a listener panics out of the
        // drain; otherwise every later dispatch would enqueue and
        // return without ever applying.
        let mut guard = DrainGuard {
            flag: &self.inner.notifying,
            armed: true,
        };
        loop {
            while let Some(action) = self.next_pending() {
                self.apply(action);
                self.notify();
            }
            guard.release();

            // An action enqueued between the last pop and the release
            // above would otherwise be stranded.
            if self.inner.pending.lock().unwrap().is_empty() {
                break;
            }
            if self.inner.notifying.swap(true, Ordering::AcqRel) {
                break;
            }
            guard.armed = true;
        }
    }

    fn next_pending(&self) -> Option<Action> {
        self.inner.pending.lock().unwrap().pop_front()
    }

    fn apply(&self, action: Action) {
        let next = match action.kind {
            ActionKind::Reset => self.inner.initial.clone(),
            ActionKind::Set(next) => next,
        };
        *self.inner.state.lock().unwrap() = next;
        let version = self.inner.version.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(label = %action.label, version, "dispatch");
    }

    fn notify(&self) {
        // Snapshot the list so subscribe/unsubscribe from inside a
        // listener cannot disturb this pass.
        let snapshot: Vec<Listener> = self
            .inner
            .listeners
            .lock()
            .unwrap()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in snapshot {
            listener();
        }
    }

    /// Register a listener, called (with no arguments) after every
    /// applied action, in subscription order.
    ///
    /// Listeners read through [`get_state`](Store::get_state). The
    /// returned [`Subscription`] removes the listener when
    /// [`unsubscribe`](Subscription::unsubscribe)d; dropping it without
    /// unsubscribing leaves the listener registered.
    pub fn subscribe(&self, listener: impl Fn() + Send + Sync + 'static) -> Subscription {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .listeners
            .lock()
            .unwrap()
            .push((id, Arc::new(listener)));
        Subscription {
            store: Arc::downgrade(&self.inner),
            id,
        }
    }

    /// Restore the construction snapshot. Sugar for dispatching
    /// [`Action::reset`].
    pub fn reset(&self) {
        self.dispatch(Action::reset());
    }

    /// Produce the next snapshot from a recipe and dispatch it.
    pub fn set_state<F, R>(&self, recipe: F) -> FloeResult<()>
    where
        F: FnOnce(&mut Draft) -> R,
        R: RecipeOutcome,
    {
        self.set_state_labeled("set", recipe)
    }

    /// Like [`set_state`](Store::set_state) with a diagnostic label
    /// naming the originating mutation.
    pub fn set_state_labeled<F, R>(&self, label: impl Into<Arc<str>>, recipe: F) -> FloeResult<()>
    where
        F: FnOnce(&mut Draft) -> R,
        R: RecipeOutcome,
    {
        let next = produce(&self.get_state(), recipe)?;
        self.dispatch(Action::set(next).with_label(label));
        Ok(())
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().unwrap().len()
    }

    /// The snapshot the store was constructed with.
    pub fn initial(&self) -> &Value {
        &self.inner.initial
    }
}

/// Clears the notifying flag when the drain loop unwinds.
///
/// Disarmed (`armed = false`) whenever the loop has already released
/// ownership, so it never clears a flag another pass now owns.
struct DrainGuard<'a> {
    flag: &'a AtomicBool,
    armed: bool,
}

impl DrainGuard<'_> {
    fn release(&mut self) {
        self.flag.store(false, Ordering::Release);
        self.armed = false;
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.flag.store(false, Ordering::Release);
        }
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("version", &self.version())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Handle removing a registered listener.
///
/// Calling [`unsubscribe`](Subscription::unsubscribe) during a
/// notification pass affects the next pass, not the current one.
#[derive(Debug)]
pub struct Subscription {
    store: Weak<StoreInner>,
    id: u64,
}

impl Subscription {
    /// Remove the listener this subscription registered.
    pub fn unsubscribe(self) {
        if let Some(inner) = self.store.upgrade() {
            inner
                .listeners
                .lock()
                .unwrap()
                .retain(|(id, _)| *id != self.id);
        }
    }
}
