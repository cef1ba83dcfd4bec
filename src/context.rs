// SPDX-License-Identifier: MIT OR Apache-2.0

//! Context values shared across a logical flow.
//!
//! A [`Context`] is the key/value bag one logical flow reads and writes. Contexts
//! are created by a [`Namespace`](crate::Namespace) and form a parent-child
//! hierarchy: a context created while another is active inherits from it.
//!
//! # Inheritance
//!
//! Reads walk from the context to its root and return the first match, so a
//! nested flow sees everything its enclosing flow set. Writes always land on the
//! context itself, so a nested flow can shadow a key without disturbing the
//! enclosing flow:
//!
//! ```
//! use contextwise::Registry;
//!
//! let registry = Registry::new();
//! let ns = registry.create_namespace("request").unwrap();
//!
//! ns.run(|outer| {
//!     outer.set("user", "alice".to_string());
//!     outer.set("attempt", 1u32);
//!     ns.run(|inner| {
//!         inner.set("attempt", 2u32);
//!         assert_eq!(inner.get::<String>("user").as_deref(), Some("alice"));
//!         assert_eq!(inner.get::<u32>("attempt"), Some(2));
//!     });
//!     assert_eq!(outer.get::<u32>("attempt"), Some(1));
//! });
//! ```
//!
//! # Values
//!
//! Values are stored type-erased as [`Value`]. Typed reads ([`Context::get`])
//! return `None` both when the key is missing and when it holds another type;
//! [`Context::get_value`] returns the raw value.

mod context_impl;

#[cfg(test)]
mod tests;

pub use context_impl::{Context, ContextID, Value, value};

pub(crate) use context_impl::ContextInner;
