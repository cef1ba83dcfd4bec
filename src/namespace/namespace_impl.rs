// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core Namespace implementation.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::Config;
use crate::context::{Context, ContextInner, Value};
use crate::debug::{Snapshot, print_debug};
use crate::error::Error;
use crate::hooks::{AsyncHooks, AsyncId};
use crate::weak::WeakRef;

static NAMESPACE_ID: AtomicU64 = AtomicU64::new(0);

/// Unit bookkeeping, shared by every thread.
#[derive(Default)]
pub(crate) struct Units {
    /// Units created while a context was active.
    pub(crate) contexts: HashMap<AsyncId, Context>,
    /// Future units that settled but have not reported `after` yet.
    pub(crate) resolved: HashMap<AsyncId, WeakRef<ContextInner>>,
}

/// What one thread sees of one namespace.
#[derive(Default)]
pub(crate) struct Flow {
    pub(crate) active: Option<Context>,
    /// Previously active contexts, one per unmatched `enter`.
    pub(crate) stack: Vec<Option<Context>>,
    pub(crate) indent: usize,
    /// The namespace's reset count when this flow was started.
    epoch: u64,
}

impl Flow {
    pub(crate) fn depth(&self) -> Depth {
        Depth {
            stack: self.stack.len(),
            indent: self.indent,
        }
    }

    fn is_idle(&self) -> bool {
        self.active.is_none() && self.stack.is_empty() && self.indent == 0
    }
}

thread_local! {
    /// This thread's flows, keyed by namespace id.
    static FLOWS: RefCell<HashMap<u64, Flow>> = RefCell::new(HashMap::new());
}

/// Stack length and indent, captured for diagnostics.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Depth {
    pub(crate) stack: usize,
    pub(crate) indent: usize,
}

pub(crate) struct NamespaceInner {
    pub(crate) name: String,
    /// Process-unique; keys this namespace's flows and emitter bindings.
    pub(crate) id: u64,
    pub(crate) hooks: AsyncHooks,
    pub(crate) config: Config,
    /// Bumped by `reset`; flows started under an older value are discarded.
    epoch: AtomicU64,
    units: Mutex<Units>,
}

/// A named, independent family of contexts.
///
/// `Namespace` is a cheap handle; clones share the same state. Namespaces are
/// created through a [`Registry`](crate::Registry), which also wires them to its
/// async lifecycle host.
///
/// The active context and the enter/exit stack belong to the calling thread, the
/// same way only one flow runs on a thread at a time. Two threads running the
/// same namespace never see each other's contexts. The mapping from async units
/// to contexts is shared, so a unit created on one thread can run on another.
///
/// ```
/// use contextwise::{Error, Registry};
///
/// let registry = Registry::new();
/// let ns = registry.create_namespace("session").unwrap();
///
/// assert_eq!(ns.set("user", 1u64), Err(Error::NoActiveContext));
/// ns.run(|_| {
///     ns.set("user", 1u64).unwrap();
///     assert_eq!(ns.get::<u64>("user"), Some(1));
/// });
/// assert!(ns.active().is_none());
/// ```
#[derive(Clone)]
pub struct Namespace {
    pub(crate) inner: Arc<NamespaceInner>,
}

impl PartialEq for Namespace {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Namespace {}

impl Debug for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (active, stack) = self.flow(|flow| (flow.active.as_ref().map(Context::context_id), flow.stack.len()));
        f.debug_struct("Namespace")
            .field("name", &self.inner.name)
            .field("active", &active)
            .field("stack", &stack)
            .field("tracked_units", &self.tracked_units())
            .finish()
    }
}

impl Namespace {
    pub(crate) fn new(name: &str, hooks: AsyncHooks, config: Config) -> Namespace {
        Namespace {
            inner: Arc::new(NamespaceInner {
                name: name.to_string(),
                id: NAMESPACE_ID.fetch_add(1, Ordering::Relaxed),
                hooks,
                config,
                epoch: AtomicU64::new(0),
                units: Mutex::new(Units::default()),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<NamespaceInner>) -> Namespace {
        Namespace { inner }
    }

    pub(crate) fn units(&self) -> MutexGuard<'_, Units> {
        self.inner
            .units
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` on this thread's flow.
    ///
    /// `f` must not log, run user code, or drop contexts; hand displaced values
    /// back out instead.
    pub(crate) fn flow<R>(&self, f: impl FnOnce(&mut Flow) -> R) -> R {
        let epoch = self.inner.epoch.load(Ordering::Acquire);
        let (result, stale) = FLOWS.with(|flows| {
            let mut flows = flows.borrow_mut();
            let flow = flows.entry(self.inner.id).or_default();
            let stale = (flow.epoch != epoch).then(|| {
                std::mem::replace(
                    flow,
                    Flow {
                        epoch,
                        ..Flow::default()
                    },
                )
            });
            let result = f(&mut *flow);
            if flow.is_idle() {
                flows.remove(&self.inner.id);
            }
            (result, stale)
        });
        drop(stale);
        result
    }

    pub(crate) fn depth(&self) -> Depth {
        self.flow(|flow| flow.depth())
    }

    /// Reports one operation when debug output is on.
    pub(crate) fn debug(&self, message: &str, depth: Depth, extra: impl FnOnce(&mut Snapshot)) {
        print_debug(self.inner.config.debug, message, depth.indent, |s| {
            s.field("name", &self.inner.name)
                .field("executionId", self.inner.hooks.execution_async_id())
                .field("triggerId", self.inner.hooks.trigger_async_id())
                .field("stack", depth.stack)
                .field("indent", depth.indent);
            extra(s);
        });
    }

    /// The name this namespace was created with.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The lifecycle host this namespace listens to.
    pub fn hooks(&self) -> &AsyncHooks {
        &self.inner.hooks
    }

    /// The settings inherited from the registry.
    pub fn config(&self) -> Config {
        self.inner.config
    }

    /// The context code running right now reads and writes, if any.
    pub fn active(&self) -> Option<Context> {
        self.flow(|flow| flow.active.clone())
    }

    /// Writes `value` under `key` on the active context.
    ///
    /// # Errors
    ///
    /// [`Error::NoActiveContext`] when nothing is active.
    pub fn set<T: Any + Send + Sync + Clone>(&self, key: impl Into<String>, value: T) -> Result<T, Error> {
        let active = self.active().ok_or(Error::NoActiveContext)?;
        let key = key.into();
        let depth = self.depth();
        self.debug("[set]", depth, |s| {
            s.field("key", &key).field("context", active.context_id());
        });
        Ok(active.set(key, value))
    }

    /// Reads `key` from the active context and its ancestors.
    ///
    /// Returns `None` when nothing is active, the key is missing, or the value
    /// is not a `T`.
    pub fn get<T: Any + Clone>(&self, key: &str) -> Option<T> {
        self.get_value(key)
            .and_then(|value| value.downcast_ref::<T>().cloned())
    }

    /// Like [`get`](Self::get), returning the type-erased value.
    ///
    /// ```
    /// use contextwise::Registry;
    ///
    /// let registry = Registry::new();
    /// let ns = registry.create_namespace("get-value").unwrap();
    /// ns.run(|ctx| {
    ///     ctx.set("retries", 2u8);
    ///     let value = ns.get_value("retries").unwrap();
    ///     assert_eq!(value.downcast_ref::<u8>(), Some(&2));
    /// });
    /// assert!(ns.get_value("retries").is_none());
    /// ```
    pub fn get_value(&self, key: &str) -> Option<Value> {
        let (active, depth) = self.flow(|flow| (flow.active.clone(), flow.depth()));
        let Some(active) = active else {
            self.debug("[get] no active context", depth, |s| {
                s.field("key", key);
            });
            return None;
        };
        let value = active.get_value(key);
        self.debug("[get]", depth, |s| {
            s.field("key", key)
                .field("context", active.context_id())
                .field("found", value.is_some());
        });
        value
    }

    /// Creates a context whose parent is the active one.
    ///
    /// The context is stamped with this namespace's name and the unit executing
    /// now. It is not entered.
    pub fn create_context(&self) -> Context {
        let (parent, depth) = self.flow(|flow| (flow.active.clone(), flow.depth()));
        let context = Context::new(parent, &self.inner.name, self.inner.hooks.execution_async_id());
        self.debug("[create_context]", depth, |s| {
            s.field("context", &context);
        });
        context
    }

    /// Makes `context` active, saving the previous one on the stack.
    pub fn enter(&self, context: &Context) {
        let depth = self.flow(|flow| {
            let previous = flow.active.replace(context.clone());
            flow.stack.push(previous);
            flow.depth()
        });
        self.debug("[enter]", depth, |s| {
            s.field("context", context.context_id());
        });
    }

    /// Undoes the matching [`enter`](Self::enter).
    ///
    /// If `context` is active, the previous context is restored. Otherwise its
    /// most recent entry is removed from the stack and the active context is left
    /// alone. A context that was never entered is ignored.
    ///
    /// # Errors
    ///
    /// - [`Error::StackUnderflow`] if `context` is active but the stack is empty.
    /// - [`Error::BottomContext`] if `context` is only found at the bottom of the stack.
    pub fn exit(&self, context: &Context) -> Result<(), Error> {
        let (outcome, displaced, depth) = self.flow(|flow| {
            if flow.active.as_ref() == Some(context) {
                let Some(previous) = flow.stack.pop() else {
                    return (Err(Error::StackUnderflow), None, flow.depth());
                };
                let replaced = std::mem::replace(&mut flow.active, previous);
                return (Ok(("[exit]", None)), replaced, flow.depth());
            }
            let index = flow
                .stack
                .iter()
                .rposition(|entry| entry.as_ref() == Some(context));
            match index {
                None => (Ok(("[exit] context wasn't entered", None)), None, flow.depth()),
                Some(0) => (Err(Error::BottomContext), None, flow.depth()),
                Some(index) => {
                    let removed = flow.stack.remove(index);
                    (Ok(("[exit] out of order", Some(index))), removed, flow.depth())
                }
            }
        });
        drop(displaced);
        let (message, index) = outcome?;
        self.debug(message, depth, |s| {
            s.field("context", context.context_id());
            if let Some(index) = index {
                s.field("index", index);
            }
        });
        Ok(())
    }

    /// Exits a context entered by one of the scoped helpers.
    ///
    /// # Panics
    ///
    /// If the exit is rejected, unless the thread is already unwinding.
    pub(crate) fn exit_scoped(&self, context: &Context) {
        if let Err(error) = self.exit(context) {
            if !std::thread::panicking() {
                panic!("{} failed to exit context {}: {error}", self.inner.name, context.context_id());
            }
        }
    }

    /// Forgets every context, tracked unit and stack entry, on every thread.
    ///
    /// Other threads discard their active context and stack the next time they
    /// use this namespace; exiting a context entered before the reset is then a
    /// no-op.
    pub fn reset(&self) {
        self.inner.epoch.fetch_add(1, Ordering::AcqRel);
        let cleared = std::mem::take(&mut *self.units());
        drop(cleared);
        let depth = self.depth();
        self.debug("[reset]", depth, |_| {});
    }

    /// Reports tracked units, the resolved side table and this thread's stack
    /// when debug output is on. Changes nothing.
    pub fn dump_contexts(&self) {
        if !self.inner.config.debug {
            return;
        }
        let (mut contexts, mut resolved) = {
            let units = self.units();
            let contexts: Vec<(AsyncId, String)> = units
                .contexts
                .iter()
                .map(|(id, context)| (*id, context.to_string()))
                .collect();
            let resolved: Vec<(AsyncId, bool)> = units
                .resolved
                .iter()
                .map(|(id, context)| (*id, context.is_live()))
                .collect();
            (contexts, resolved)
        };
        let (depth, active, stack) = self.flow(|flow| {
            let stack: Vec<String> = flow
                .stack
                .iter()
                .map(|entry| match entry {
                    Some(context) => context.context_id().to_string(),
                    None => "none".to_string(),
                })
                .collect();
            (flow.depth(), flow.active.as_ref().map(Context::context_id), stack)
        });
        contexts.sort();
        resolved.sort();
        self.debug("[dump_contexts]", depth, |s| {
            s.debug_field("active", active)
                .debug_field("stack", stack)
                .debug_field("contexts", contexts)
                .debug_field("resolved", resolved);
        });
    }

    /// Number of unmatched `enter` calls on this thread.
    pub fn stack_depth(&self) -> usize {
        self.flow(|flow| flow.stack.len())
    }

    /// Number of async units currently mapped to a context.
    pub fn tracked_units(&self) -> usize {
        self.units().contexts.len()
    }

    /// Current diagnostic indent: how many unit callbacks are running on this thread.
    pub fn indent(&self) -> usize {
        self.flow(|flow| flow.indent)
    }

    /// The context mapped to `async_id`, if any.
    pub fn unit_context(&self, async_id: AsyncId) -> Option<Context> {
        self.units().contexts.get(&async_id).cloned()
    }
}
