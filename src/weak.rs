// SPDX-License-Identifier: MIT OR Apache-2.0

//! Best-effort non-owning references.
//!
//! Emitter bindings and the resolved-unit side table must not keep a namespace
//! or context alive on their own. [`WeakRef`] normally wraps a [`Weak`]; when
//! [`Config::weak_references`](crate::Config::weak_references) is off it degrades
//! to a strong [`Arc`], so resolution always succeeds and the referent is retained
//! for as long as the reference exists.

use std::fmt::Debug;
use std::sync::{Arc, Weak};

pub(crate) enum WeakRef<T> {
    Weak(Weak<T>),
    Strong(Arc<T>),
}

impl<T> WeakRef<T> {
    /// Makes a reference to `value`, non-owning unless `weak_references` is false.
    pub(crate) fn new(value: &Arc<T>, weak_references: bool) -> Self {
        if weak_references {
            WeakRef::Weak(Arc::downgrade(value))
        } else {
            WeakRef::Strong(value.clone())
        }
    }

    /// Returns the referent if it is still reachable.
    pub(crate) fn get(&self) -> Option<Arc<T>> {
        match self {
            WeakRef::Weak(weak) => weak.upgrade(),
            WeakRef::Strong(strong) => Some(strong.clone()),
        }
    }

    pub(crate) fn is_live(&self) -> bool {
        match self {
            WeakRef::Weak(weak) => weak.strong_count() > 0,
            WeakRef::Strong(_) => true,
        }
    }
}

impl<T> Clone for WeakRef<T> {
    fn clone(&self) -> Self {
        match self {
            WeakRef::Weak(weak) => WeakRef::Weak(weak.clone()),
            WeakRef::Strong(strong) => WeakRef::Strong(strong.clone()),
        }
    }
}

impl<T> Debug for WeakRef<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WeakRef::Weak(weak) => write!(f, "WeakRef::Weak(live: {})", weak.strong_count() > 0),
            WeakRef::Strong(_) => write!(f, "WeakRef::Strong"),
        }
    }
}
