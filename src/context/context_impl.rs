// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core Context implementation.

use std::any::Any;
use std::collections::HashMap;
use std::fmt::Display;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::hooks::AsyncId;

pub(crate) static CONTEXT_ID: AtomicU64 = AtomicU64::new(0);

/// A type-erased context value.
pub type Value = Arc<dyn Any + Send + Sync>;

/// Wraps `v` as a [`Value`].
pub fn value<T: Any + Send + Sync>(v: T) -> Value {
    Arc::new(v)
}

/// Unique identifier for a context.
///
/// Used in diagnostics only; contexts compare by identity.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ContextID(pub(crate) u64);

impl Display for ContextID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug)]
pub(crate) struct ContextInner {
    pub(crate) parent: Option<Context>,
    pub(crate) context_id: u64,
    pub(crate) namespace: String,
    pub(crate) async_id: AsyncId,
    values: Mutex<HashMap<String, Value>>,
}

/// State for one logical flow.
///
/// A `Context` is a cheap, shared handle: clones refer to the same bag, and two
/// contexts are equal only if they are the same bag. Each context remembers the
/// namespace that created it, the async unit that was executing at the time, and
/// its parent (the context that was active when it was created).
///
/// ```
/// use contextwise::Registry;
///
/// let registry = Registry::new();
/// let ns = registry.create_namespace("docs").unwrap();
/// let root = ns.create_context();
/// root.set("answer", 42);
///
/// ns.enter(&root);
/// let child = ns.create_context();
/// assert_eq!(child.parent(), Some(&root));
/// assert_eq!(child.get::<i32>("answer"), Some(42));
/// assert_eq!(child.nesting_level(), 1);
/// ns.exit(&root).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct Context {
    pub(crate) inner: Arc<ContextInner>,
}

impl PartialEq for Context {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Context {}

impl Hash for Context {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.inner).hash(state);
    }
}

impl Display for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let nesting = self.nesting_level();
        write!(
            f,
            "{}{} ({}@{})",
            "  ".repeat(nesting),
            self.context_id(),
            self.inner.namespace,
            self.inner.async_id
        )
    }
}

impl Context {
    pub(crate) fn new(parent: Option<Context>, namespace: &str, async_id: AsyncId) -> Context {
        Context {
            inner: Arc::new(ContextInner {
                parent,
                context_id: CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
                namespace: namespace.to_string(),
                async_id,
                values: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<ContextInner>) -> Context {
        Context { inner }
    }

    fn values(&self) -> MutexGuard<'_, HashMap<String, Value>> {
        self.inner
            .values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the value for `key`, searching this context and then its ancestors.
    ///
    /// Returns `None` if no context in the chain has `key`, or if the nearest
    /// value for `key` is not a `T`.
    pub fn get<T: Any + Clone>(&self, key: &str) -> Option<T> {
        self.get_value(key)
            .and_then(|value| value.downcast_ref::<T>().cloned())
    }

    /// Returns the raw value for `key`, searching this context and then its ancestors.
    pub fn get_value(&self, key: &str) -> Option<Value> {
        let mut current = self;
        loop {
            if let Some(value) = current.values().get(key) {
                return Some(value.clone());
            }
            match &current.inner.parent {
                Some(parent) => current = parent,
                None => return None,
            }
        }
    }

    /// Writes `value` under `key` on this context only, returning it.
    ///
    /// Ancestors are never modified; a key set here shadows the same key further
    /// up the chain for this context and its descendants.
    pub fn set<T: Any + Send + Sync + Clone>(&self, key: impl Into<String>, value: T) -> T {
        self.set_value(key, Arc::new(value.clone()));
        value
    }

    /// Writes a raw value under `key` on this context only.
    pub fn set_value(&self, key: impl Into<String>, value: Value) {
        self.values().insert(key.into(), value);
    }

    /// Whether `key` resolves anywhere in the chain.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get_value(key).is_some()
    }

    /// Keys set directly on this context, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.values().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// The context that was active when this one was created.
    pub fn parent(&self) -> Option<&Context> {
        self.inner.parent.as_ref()
    }

    /// Name of the namespace that created this context.
    pub fn namespace_name(&self) -> &str {
        &self.inner.namespace
    }

    /// The async unit that was executing when this context was created.
    pub fn async_id(&self) -> AsyncId {
        self.inner.async_id
    }

    #[inline]
    pub fn context_id(&self) -> ContextID {
        ContextID(self.inner.context_id)
    }

    /// Number of ancestors. A context created with nothing active has level 0.
    pub fn nesting_level(&self) -> usize {
        let mut level = 0;
        let mut current = self;
        while let Some(parent) = &current.inner.parent {
            level += 1;
            current = parent;
        }
        level
    }
}
