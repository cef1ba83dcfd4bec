// SPDX-License-Identifier: MIT OR Apache-2.0

//! Async unit notifications.

use std::fmt::Debug;

use crate::context::Context;
use crate::hooks::{AsyncId, HookCallbacks};
use crate::weak::WeakRef;

use super::namespace_impl::Namespace;

impl HookCallbacks for Namespace {
    fn init(&self, async_id: AsyncId, kind: &str, trigger_async_id: AsyncId, _resource: &dyn Debug) {
        let execution_async_id = self.inner.hooks.execution_async_id();
        let (active, depth) = self.flow(|flow| (flow.active.clone(), flow.depth()));
        let (message, mapped) = {
            let mut units = self.units();
            if let Some(active) = active {
                units.contexts.insert(async_id, active.clone());
                ("[init] with active", Some(active))
            } else if execution_async_id == AsyncId::NONE {
                // host-started work inherits from whatever it names as trigger
                match units.contexts.get(&trigger_async_id).cloned() {
                    Some(trigger) => {
                        units.contexts.insert(async_id, trigger.clone());
                        ("[init] from trigger", Some(trigger))
                    }
                    None => ("[init] missing trigger context", None),
                }
            } else {
                ("[init] no context", None)
            }
        };
        self.debug(message, depth, |s| {
            s.field("asyncId", async_id)
                .field("kind", kind)
                .field("trigger", trigger_async_id)
                .debug_field("context", mapped.as_ref().map(|c| c.context_id()));
        });
    }

    fn before(&self, async_id: AsyncId) {
        let context = self.units().contexts.get(&async_id).cloned();
        let depth = self.flow(|flow| {
            flow.indent += 1;
            flow.depth()
        });
        match context {
            Some(context) => {
                self.debug("[before]", depth, |s| {
                    s.field("asyncId", async_id)
                        .field("context", context.context_id());
                });
                self.enter(&context);
            }
            None => self.debug("[before] missing context", depth, |s| {
                s.field("asyncId", async_id);
            }),
        }
    }

    fn after(&self, async_id: AsyncId) {
        let depth = self.flow(|flow| {
            flow.indent = flow.indent.saturating_sub(1);
            flow.depth()
        });
        let (context, resolved) = {
            let mut units = self.units();
            let resolved = units.resolved.remove(&async_id);
            let context = units
                .contexts
                .get(&async_id)
                .cloned()
                .or_else(|| resolved.as_ref().and_then(WeakRef::get).map(Context::from_inner));
            (context, resolved)
        };
        drop(resolved);
        match context {
            Some(context) => {
                self.debug("[after]", depth, |s| {
                    s.field("asyncId", async_id)
                        .field("context", context.context_id());
                });
                self.exit_scoped(&context);
            }
            None => self.debug("[after] missing context", depth, |s| {
                s.field("asyncId", async_id);
            }),
        }
    }

    fn destroy(&self, async_id: AsyncId) {
        let (removed, resolved) = {
            let mut units = self.units();
            (units.contexts.remove(&async_id), units.resolved.remove(&async_id))
        };
        let tracked = removed.is_some() || resolved.is_some();
        drop((removed, resolved));
        let depth = self.depth();
        self.debug("[destroy]", depth, |s| {
            s.field("asyncId", async_id).field("tracked", tracked);
        });
    }

    fn promise_resolve(&self, async_id: AsyncId) {
        let weak_references = self.inner.config.weak_references;
        let settled = {
            let mut units = self.units();
            let settled = units.contexts.remove(&async_id);
            if let Some(context) = &settled {
                units
                    .resolved
                    .insert(async_id, WeakRef::new(&context.inner, weak_references));
            }
            settled
        };
        drop(settled);
        let depth = self.depth();
        self.debug("[promise_resolve]", depth, |s| {
            s.field("asyncId", async_id);
        });
    }
}
