// SPDX-License-Identifier: MIT OR Apache-2.0

//! Unit numbering, execution tracking and notification dispatch.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::{Debug, Display};
use std::future::IntoFuture;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use super::traced::Traced;

/// Identifier of one asynchronous unit.
///
/// Ids are unique within an [`AsyncHooks`] instance and never reused.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AsyncId(pub(crate) u64);

impl AsyncId {
    /// No unit: work started by the host itself rather than by a callback.
    pub const NONE: AsyncId = AsyncId(0);
    /// The top-level execution, outside of every unit's callback.
    pub const ROOT: AsyncId = AsyncId(1);

    /// The raw id.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl Display for AsyncId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Receives lifecycle notifications for every unit of an [`AsyncHooks`].
///
/// Every method defaults to doing nothing.
pub trait HookCallbacks: Send + Sync {
    /// A unit was created while `trigger_async_id` was executing.
    fn init(&self, async_id: AsyncId, kind: &str, trigger_async_id: AsyncId, resource: &dyn Debug) {
        let _ = (async_id, kind, trigger_async_id, resource);
    }

    /// The unit's callback is about to run.
    fn before(&self, async_id: AsyncId) {
        let _ = async_id;
    }

    /// The unit's callback has finished, normally or by unwinding.
    fn after(&self, async_id: AsyncId) {
        let _ = async_id;
    }

    /// The unit is gone; no further notifications will mention it.
    fn destroy(&self, async_id: AsyncId) {
        let _ = async_id;
    }

    /// A future-like unit produced its value.
    fn promise_resolve(&self, async_id: AsyncId) {
        let _ = async_id;
    }
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    async_id: AsyncId,
    trigger_async_id: AsyncId,
}

thread_local! {
    /// Callbacks running on this thread, innermost last, keyed by host id.
    static FRAMES: RefCell<HashMap<u64, Vec<Frame>>> = RefCell::new(HashMap::new());
}

static HOST_ID: AtomicU64 = AtomicU64::new(0);

struct HooksInner {
    id: u64,
    next_async_id: AtomicU64,
    next_hook_id: AtomicU64,
    enabled: Mutex<Vec<(u64, Arc<dyn HookCallbacks>)>>,
}

/// The lifecycle host: numbers units and dispatches their notifications.
///
/// `AsyncHooks` is a cheap handle; clones share the same host. Most programs use
/// [`AsyncHooks::global`]; tests and embedders that want isolation create their
/// own with [`AsyncHooks::new`].
///
/// Unit ids and enabled hooks are shared by every thread. Which unit is
/// executing is tracked per thread, since a callback runs on exactly one.
#[derive(Clone)]
pub struct AsyncHooks {
    inner: Arc<HooksInner>,
}

impl Debug for AsyncHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncHooks")
            .field("enabled_hooks", &self.enabled_hooks())
            .field("execution_async_id", &self.execution_async_id())
            .finish()
    }
}

impl Default for AsyncHooks {
    fn default() -> Self {
        AsyncHooks::new()
    }
}

impl PartialEq for AsyncHooks {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for AsyncHooks {}

static GLOBAL_HOOKS: OnceLock<AsyncHooks> = OnceLock::new();

impl AsyncHooks {
    /// Creates an isolated host with no hooks and its own id sequence.
    ///
    /// ```
    /// use contextwise::hooks::{AsyncHooks, AsyncId};
    ///
    /// let hooks = AsyncHooks::new();
    /// assert_eq!(hooks.execution_async_id(), AsyncId::ROOT);
    /// assert_eq!(hooks.enabled_hooks(), 0);
    /// ```
    pub fn new() -> AsyncHooks {
        AsyncHooks {
            inner: Arc::new(HooksInner {
                id: HOST_ID.fetch_add(1, Ordering::Relaxed),
                next_async_id: AtomicU64::new(AsyncId::ROOT.0 + 1),
                next_hook_id: AtomicU64::new(0),
                enabled: Mutex::new(Vec::new()),
            }),
        }
    }

    /// The process-wide host used by [`Registry::global`](crate::Registry::global).
    pub fn global() -> &'static AsyncHooks {
        GLOBAL_HOOKS.get_or_init(AsyncHooks::new)
    }

    /// Creates a disabled hook delivering notifications to `callbacks`.
    pub fn create_hook(&self, callbacks: Arc<dyn HookCallbacks>) -> AsyncHook {
        AsyncHook {
            hooks: self.clone(),
            id: self.inner.next_hook_id.fetch_add(1, Ordering::Relaxed),
            callbacks,
        }
    }

    /// Number of currently enabled hooks.
    pub fn enabled_hooks(&self) -> usize {
        self.enabled().len()
    }

    /// The unit whose callback is running on this thread, or [`AsyncId::ROOT`]
    /// outside of all callbacks.
    pub fn execution_async_id(&self) -> AsyncId {
        self.frames(|frames| frames.last().map(|frame| frame.async_id))
            .unwrap_or(AsyncId::ROOT)
    }

    /// The unit that created the running one, or [`AsyncId::NONE`] outside of all callbacks.
    pub fn trigger_async_id(&self) -> AsyncId {
        self.frames(|frames| frames.last().map(|frame| frame.trigger_async_id))
            .unwrap_or(AsyncId::NONE)
    }

    /// Runs `f` as work started by the host itself.
    ///
    /// Inside `f`, [`execution_async_id`](Self::execution_async_id) is
    /// [`AsyncId::NONE`]. Units created there have no executing parent to
    /// inherit from, only the trigger they name explicitly.
    pub fn detached<R>(&self, f: impl FnOnce() -> R) -> R {
        let trigger_async_id = self.execution_async_id();
        self.frames(|frames| {
            frames.push(Frame {
                async_id: AsyncId::NONE,
                trigger_async_id,
            })
        });
        let _pop = PopFrame(self);
        f()
    }

    /// Wraps `future` as a traced unit of kind `"PROMISE"`.
    pub fn trace<F: IntoFuture>(&self, future: F) -> Traced<F::IntoFuture> {
        Traced::new(self, future.into_future())
    }

    fn enabled(&self) -> MutexGuard<'_, Vec<(u64, Arc<dyn HookCallbacks>)>> {
        self.inner
            .enabled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` on this thread's execution frames for this host.
    fn frames<R>(&self, f: impl FnOnce(&mut Vec<Frame>) -> R) -> R {
        FRAMES.with(|frames| {
            let mut frames = frames.borrow_mut();
            let ours = frames.entry(self.inner.id).or_default();
            let result = f(&mut *ours);
            if ours.is_empty() {
                frames.remove(&self.inner.id);
            }
            result
        })
    }

    /// Snapshot of the enabled callbacks, so none of our locks are held during dispatch.
    fn listeners(&self) -> Vec<Arc<dyn HookCallbacks>> {
        self.enabled()
            .iter()
            .map(|(_, callbacks)| callbacks.clone())
            .collect()
    }

    pub(crate) fn emit_init(&self, kind: &str, trigger_async_id: AsyncId, resource: &dyn Debug) -> AsyncId {
        let async_id = AsyncId(self.inner.next_async_id.fetch_add(1, Ordering::Relaxed));
        for listener in self.listeners() {
            listener.init(async_id, kind, trigger_async_id, resource);
        }
        async_id
    }

    pub(crate) fn emit_before(&self, async_id: AsyncId, trigger_async_id: AsyncId) {
        self.frames(|frames| {
            frames.push(Frame {
                async_id,
                trigger_async_id,
            })
        });
        for listener in self.listeners() {
            listener.before(async_id);
        }
    }

    pub(crate) fn emit_after(&self, async_id: AsyncId) {
        for listener in self.listeners() {
            listener.after(async_id);
        }
        self.frames(|frames| {
            if let Some(index) = frames.iter().rposition(|frame| frame.async_id == async_id) {
                frames.remove(index);
            }
        });
    }

    pub(crate) fn emit_destroy(&self, async_id: AsyncId) {
        for listener in self.listeners() {
            listener.destroy(async_id);
        }
    }

    pub(crate) fn emit_promise_resolve(&self, async_id: AsyncId) {
        for listener in self.listeners() {
            listener.promise_resolve(async_id);
        }
    }
}

struct PopFrame<'a>(&'a AsyncHooks);

impl Drop for PopFrame<'_> {
    fn drop(&mut self) {
        self.0.frames(|frames| {
            frames.pop();
        });
    }
}

/// A registered listener. Created disabled by [`AsyncHooks::create_hook`].
///
/// Dropping the handle does not disable the hook.
pub struct AsyncHook {
    hooks: AsyncHooks,
    id: u64,
    callbacks: Arc<dyn HookCallbacks>,
}

impl Debug for AsyncHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncHook")
            .field("id", &self.id)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl AsyncHook {
    /// Starts delivering notifications. Enabling twice has no further effect.
    pub fn enable(&self) -> &Self {
        let mut enabled = self.hooks.enabled();
        if !enabled.iter().any(|(id, _)| *id == self.id) {
            enabled.push((self.id, self.callbacks.clone()));
        }
        self
    }

    /// Stops delivering notifications.
    pub fn disable(&self) -> &Self {
        let removed = {
            let mut enabled = self.hooks.enabled();
            enabled
                .iter()
                .position(|(id, _)| *id == self.id)
                .map(|index| enabled.remove(index))
        };
        // the callbacks may own arbitrary state; release it outside the lock
        drop(removed);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.hooks.enabled().iter().any(|(id, _)| *id == self.id)
    }
}
