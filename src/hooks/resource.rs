// SPDX-License-Identifier: MIT OR Apache-2.0

//! Callback-style units.

use std::sync::atomic::{AtomicBool, Ordering};

use super::host::{AsyncHooks, AsyncId};

/// One callback-style unit of asynchronous work.
///
/// Create it where the work is scheduled (a timer armed, a task queued), and wrap
/// the callback in [`run_in_scope`](Self::run_in_scope) wherever the work finally
/// runs. Listeners hear `init` on creation, `before`/`after` around each
/// `run_in_scope`, and `destroy` when the resource is dropped.
///
/// ```
/// use contextwise::hooks::{AsyncHooks, AsyncResource};
///
/// let hooks = AsyncHooks::new();
/// let queued: Vec<AsyncResource> = (0..3).map(|_| AsyncResource::new(&hooks, "Task")).collect();
/// for task in &queued {
///     task.run_in_scope(|| assert_eq!(hooks.execution_async_id(), task.async_id()));
/// }
/// ```
#[derive(Debug)]
pub struct AsyncResource {
    hooks: AsyncHooks,
    async_id: AsyncId,
    trigger_async_id: AsyncId,
    kind: String,
    resolved: AtomicBool,
}

impl AsyncResource {
    /// Creates a unit triggered by whatever is executing now.
    pub fn new(hooks: &AsyncHooks, kind: impl Into<String>) -> AsyncResource {
        let trigger_async_id = hooks.execution_async_id();
        AsyncResource::with_trigger(hooks, kind, trigger_async_id)
    }

    /// Creates a unit attributed to `trigger_async_id`.
    pub fn with_trigger(hooks: &AsyncHooks, kind: impl Into<String>, trigger_async_id: AsyncId) -> AsyncResource {
        let kind = kind.into();
        let async_id = hooks.emit_init(&kind, trigger_async_id, &kind);
        AsyncResource {
            hooks: hooks.clone(),
            async_id,
            trigger_async_id,
            kind,
            resolved: AtomicBool::new(false),
        }
    }

    pub fn async_id(&self) -> AsyncId {
        self.async_id
    }

    pub fn trigger_async_id(&self) -> AsyncId {
        self.trigger_async_id
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Runs `f` as this unit's callback.
    ///
    /// `after` is delivered even if `f` unwinds.
    pub fn run_in_scope<R>(&self, f: impl FnOnce() -> R) -> R {
        self.hooks.emit_before(self.async_id, self.trigger_async_id);
        let _after = After(self);
        f()
    }

    /// Reports that this unit produced its value. Only the first call notifies.
    pub fn resolve(&self) {
        if !self.resolved.swap(true, Ordering::Relaxed) {
            self.hooks.emit_promise_resolve(self.async_id);
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.load(Ordering::Relaxed)
    }
}

struct After<'a>(&'a AsyncResource);

impl Drop for After<'_> {
    fn drop(&mut self) {
        self.0.hooks.emit_after(self.0.async_id);
    }
}

impl Drop for AsyncResource {
    fn drop(&mut self) {
        self.hooks.emit_destroy(self.async_id);
    }
}
