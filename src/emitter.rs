// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event emitters and listener binding.
//!
//! An [`EventEmitter`] keeps named lists of listeners and calls them on
//! [`emit`](EventEmitter::emit). Listeners usually run long after they were
//! attached, from wherever the emit happens, so by default they see whatever
//! context is active at the emit site.
//!
//! [`Namespace::bind_emitter`] changes that for one namespace: every listener
//! attached *afterwards* remembers the context active at attach time, and runs
//! inside it. Binding several namespaces composes; each one re-establishes its
//! own context around the listener.
//!
//! ```
//! use contextwise::{EventEmitter, Registry, value};
//! use std::sync::{Arc, Mutex};
//!
//! let registry = Registry::new();
//! let ns = registry.create_namespace("emitter-docs").unwrap();
//! let emitter = EventEmitter::new();
//! ns.bind_emitter(&emitter);
//!
//! let seen = Arc::new(Mutex::new(None));
//! ns.run(|ctx| {
//!     ctx.set("user", "ada");
//!     let (seen, ns2) = (seen.clone(), ns.clone());
//!     emitter.on("data", move |_| *seen.lock().unwrap() = ns2.get::<&str>("user"));
//! });
//!
//! emitter.emit("data", &[value(1u8)]);
//! assert_eq!(*seen.lock().unwrap(), Some("ada"));
//! ```
//!
//! Bindings hold the namespace and the context weakly (see
//! [`Config::weak_references`](crate::Config::weak_references)). Once either is
//! gone, the binding is dropped the next time the event is emitted.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::context::{Context, ContextInner, Value, value};
use crate::namespace::{Namespace, NamespaceInner};
use crate::weak::WeakRef;

/// Event name announced before any listener is added.
pub const NEW_LISTENER: &str = "newListener";

/// A listener callback.
pub type Listener = Arc<dyn Fn(&[Value]) + Send + Sync>;

/// Identifies one attached listener, for [`EventEmitter::remove_listener`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// A context captured for one listener by one bound namespace.
#[derive(Debug, Clone)]
struct Binding {
    namespace: WeakRef<NamespaceInner>,
    context: WeakRef<ContextInner>,
}

impl Binding {
    fn is_live(&self) -> bool {
        self.namespace.is_live() && self.context.is_live()
    }
}

struct Entry {
    id: ListenerId,
    listener: Listener,
    once: bool,
    /// Keyed by namespace id, so composition order is stable.
    marks: BTreeMap<u64, Binding>,
}

struct Event {
    name: String,
    entries: Vec<Entry>,
}

#[derive(Default)]
struct EmitterState {
    events: Vec<Event>,
    bound: Vec<(u64, WeakRef<NamespaceInner>)>,
}

impl EmitterState {
    fn event_mut(&mut self, name: &str) -> Option<&mut Event> {
        self.events.iter_mut().find(|event| event.name == name)
    }

    fn remove_empty(&mut self) {
        self.events.retain(|event| !event.entries.is_empty());
    }
}

#[derive(Default)]
struct EmitterInner {
    next_listener_id: AtomicU64,
    state: Mutex<EmitterState>,
}

/// A cheap, cloneable handle to a set of named listener lists.
#[derive(Clone, Default)]
pub struct EventEmitter {
    inner: Arc<EmitterInner>,
}

impl Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("events", &self.event_names())
            .finish()
    }
}

impl PartialEq for EventEmitter {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for EventEmitter {}

impl EventEmitter {
    pub fn new() -> EventEmitter {
        EventEmitter::default()
    }

    fn state(&self) -> MutexGuard<'_, EmitterState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds `listener` to the end of `event`'s list.
    pub fn on(&self, event: &str, listener: impl Fn(&[Value]) + Send + Sync + 'static) -> ListenerId {
        self.attach(event, Arc::new(listener), false)
    }

    /// Same as [`on`](Self::on).
    pub fn add_listener(&self, event: &str, listener: Listener) -> ListenerId {
        self.attach(event, listener, false)
    }

    /// Adds a listener that is removed the first time `event` is emitted, just
    /// before it runs.
    pub fn once(&self, event: &str, listener: impl Fn(&[Value]) + Send + Sync + 'static) -> ListenerId {
        self.attach(event, Arc::new(listener), true)
    }

    fn attach(&self, event: &str, listener: Listener, once: bool) -> ListenerId {
        self.emit(NEW_LISTENER, &[value(event.to_string())]);

        let bound: Vec<WeakRef<NamespaceInner>> = {
            let mut state = self.state();
            state.bound.retain(|(_, namespace)| namespace.is_live());
            state.bound.iter().map(|(_, namespace)| namespace.clone()).collect()
        };
        let mut marks = BTreeMap::new();
        for weak in bound {
            let Some(namespace) = weak.get().map(Namespace::from_inner) else {
                continue;
            };
            if let Some(active) = namespace.active() {
                let weak_references = namespace.config().weak_references;
                marks.insert(
                    namespace.inner.id,
                    Binding {
                        namespace: weak,
                        context: WeakRef::new(&active.inner, weak_references),
                    },
                );
            }
        }

        let id = ListenerId(self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed));
        let entry = Entry {
            id,
            listener,
            once,
            marks,
        };
        let mut state = self.state();
        match state.event_mut(event) {
            Some(existing) => existing.entries.push(entry),
            None => state.events.push(Event {
                name: event.to_string(),
                entries: vec![entry],
            }),
        }
        id
    }

    /// Removes one listener. Returns whether it was attached.
    pub fn remove_listener(&self, event: &str, id: ListenerId) -> bool {
        let removed = {
            let mut state = self.state();
            let removed = state.event_mut(event).and_then(|event| {
                event
                    .entries
                    .iter()
                    .position(|entry| entry.id == id)
                    .map(|index| event.entries.remove(index))
            });
            state.remove_empty();
            removed
        };
        removed.is_some()
    }

    /// Removes every listener for `event`.
    pub fn remove_all_listeners(&self, event: &str) {
        let removed: Vec<Event> = {
            let mut state = self.state();
            let (removed, kept): (Vec<Event>, Vec<Event>) = std::mem::take(&mut state.events)
                .into_iter()
                .partition(|e| e.name == event);
            state.events = kept;
            removed
        };
        drop(removed);
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.state()
            .events
            .iter()
            .find(|e| e.name == event)
            .map_or(0, |e| e.entries.len())
    }

    /// Events with at least one listener, in the order they were first added.
    pub fn event_names(&self) -> Vec<String> {
        self.state()
            .events
            .iter()
            .map(|event| event.name.clone())
            .collect()
    }

    /// Calls every listener of `event` with `args`, in the order they were added.
    ///
    /// Listeners attached or removed while the event is being emitted do not
    /// affect this emission. Returns whether there was any listener.
    pub fn emit(&self, event: &str, args: &[Value]) -> bool {
        let snapshot: Vec<(Listener, Vec<Binding>)> = {
            let mut state = self.state();
            let Some(listeners) = state.event_mut(event) else {
                return false;
            };
            let snapshot: Vec<(Listener, Vec<Binding>)> = listeners
                .entries
                .iter_mut()
                .map(|entry| {
                    entry.marks.retain(|_, binding| binding.is_live());
                    (entry.listener.clone(), entry.marks.values().cloned().collect())
                })
                .collect();
            listeners.entries.retain(|entry| !entry.once);
            state.remove_empty();
            snapshot
        };
        if snapshot.is_empty() {
            return false;
        }
        for (listener, marks) in snapshot {
            compose(listener, marks)(args);
        }
        true
    }

    /// Starts capturing contexts of `namespace` for listeners attached from now on.
    fn bind_namespace(&self, namespace: &Namespace) {
        let mut state = self.state();
        let id = namespace.inner.id;
        if state.bound.iter().any(|(bound, _)| *bound == id) {
            return;
        }
        let weak_references = namespace.config().weak_references;
        state
            .bound
            .push((id, WeakRef::new(&namespace.inner, weak_references)));
    }
}

/// Wraps `listener` once per still-live binding, so each namespace enters its
/// captured context around the call.
fn compose(listener: Listener, marks: Vec<Binding>) -> Listener {
    let mut call = listener;
    for binding in marks {
        let (Some(namespace), Some(context)) = (binding.namespace.get(), binding.context.get()) else {
            continue;
        };
        let namespace = Namespace::from_inner(namespace);
        let inner = call.clone();
        let bound = namespace.bind_with(move |args: &[Value]| inner(args), Context::from_inner(context));
        let wrapped: Listener = Arc::new(move |args: &[Value]| bound.call(args));
        call = wrapped;
    }
    call
}

impl Namespace {
    /// Makes listeners attached to `emitter` from now on run inside the context
    /// that was active in this namespace when they were attached.
    ///
    /// Listeners attached while nothing is active are left alone. Binding the
    /// same emitter twice has no further effect.
    pub fn bind_emitter(&self, emitter: &EventEmitter) {
        emitter.bind_namespace(self);
        let depth = self.depth();
        self.debug("[bind_emitter]", depth, |_| {});
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[cfg(target_arch = "wasm32")]
    use wasm_bindgen_test::*;

    fn counter() -> (Arc<AtomicUsize>, impl Fn(&[Value]) + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        (count, move |_: &[Value]| {
            c.fetch_add(1, Ordering::Relaxed);
        })
    }

    #[cfg_attr(not(target_arch = "wasm32"), test)]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
    fn on_emit_remove() {
        let emitter = EventEmitter::new();
        let (count, listener) = counter();
        let id = emitter.on("tick", listener);
        assert_eq!(emitter.listener_count("tick"), 1);

        assert!(emitter.emit("tick", &[]));
        assert!(emitter.emit("tick", &[]));
        assert_eq!(count.load(Ordering::Relaxed), 2);

        assert!(emitter.remove_listener("tick", id));
        assert!(!emitter.remove_listener("tick", id));
        assert!(!emitter.emit("tick", &[]));
        assert!(emitter.event_names().is_empty());
    }

    #[cfg_attr(not(target_arch = "wasm32"), test)]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
    fn once_runs_once() {
        let emitter = EventEmitter::new();
        let (count, listener) = counter();
        emitter.once("tick", listener);
        emitter.emit("tick", &[]);
        emitter.emit("tick", &[]);
        assert_eq!(count.load(Ordering::Relaxed), 1);
        assert_eq!(emitter.listener_count("tick"), 0);
    }

    #[cfg_attr(not(target_arch = "wasm32"), test)]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
    fn new_listener_announced_first() {
        let emitter = EventEmitter::new();
        let names = Arc::new(Mutex::new(Vec::new()));
        let n = names.clone();
        let e = emitter.clone();
        emitter.on(NEW_LISTENER, move |args| {
            let name = args[0].downcast_ref::<String>().unwrap().clone();
            // the announced listener is not attached yet
            n.lock().unwrap().push((name.clone(), e.listener_count(&name)));
        });
        emitter.on("data", |_| {});
        emitter.on("data", |_| {});
        assert_eq!(
            *names.lock().unwrap(),
            vec![("data".to_string(), 0), ("data".to_string(), 1)]
        );
    }

    #[cfg_attr(not(target_arch = "wasm32"), test)]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
    fn remove_all_and_names() {
        let emitter = EventEmitter::new();
        emitter.on("a", |_| {});
        emitter.on("b", |_| {});
        emitter.on("a", |_| {});
        assert_eq!(emitter.event_names(), vec!["a".to_string(), "b".to_string()]);
        emitter.remove_all_listeners("a");
        assert_eq!(emitter.listener_count("a"), 0);
        assert_eq!(emitter.event_names(), vec!["b".to_string()]);
    }

    #[cfg_attr(not(target_arch = "wasm32"), test)]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
    fn listener_can_remove_itself() {
        let emitter = EventEmitter::new();
        let (count, listener) = counter();
        let id = Arc::new(Mutex::new(None));
        let (e, slot) = (emitter.clone(), id.clone());
        let own = emitter.on("tick", move |args| {
            listener(args);
            if let Some(own) = *slot.lock().unwrap() {
                e.remove_listener("tick", own);
            }
        });
        *id.lock().unwrap() = Some(own);
        let (late_count, late) = counter();
        emitter.on("tick", late);

        emitter.emit("tick", &[]);
        emitter.emit("tick", &[]);
        assert_eq!(count.load(Ordering::Relaxed), 1);
        assert_eq!(late_count.load(Ordering::Relaxed), 2);
    }
}
