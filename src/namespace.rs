// SPDX-License-Identifier: MIT OR Apache-2.0

//! Namespaces: the propagation engine.
//!
//! A [`Namespace`] tracks which [`Context`](crate::Context) is *active* for one
//! independent family of values. Code reads and writes the active context with
//! [`Namespace::get`] and [`Namespace::set`]; the namespace moves the active
//! context around as logical flows start, nest, suspend and resume.
//!
//! # Entering and exiting
//!
//! The primitive operations are [`Namespace::enter`] and [`Namespace::exit`].
//! Entering pushes the previously active context onto a stack; exiting pops it
//! back. Flows interleave, so a context is allowed to exit out of order: if it is
//! not the active one, its entry is removed from the middle of the stack and the
//! active context is left alone.
//!
//! Almost nobody calls those directly. The scoped helpers pair them for you and
//! exit even when the closure panics:
//!
//! - [`Namespace::run`] and friends: run a closure in a fresh child context
//! - [`Namespace::bind`]: capture a context now, enter it whenever the closure is called
//! - [`Namespace::run_promise`]: keep a fresh context entered until a future settles
//! - [`Namespace::bind_future`]: enter a context around every poll of a future
//! - [`Namespace::bind_emitter`]: re-establish contexts around emitter listeners
//!
//! # Async units
//!
//! A namespace created by a [`Registry`](crate::Registry) also listens to the
//! registry's [`AsyncHooks`](crate::hooks::AsyncHooks). Any unit created while a
//! context is active is remembered, and the namespace enters that context before
//! the unit's callback runs and exits it afterwards:
//!
//! ```
//! use contextwise::Registry;
//! use contextwise::hooks::AsyncResource;
//!
//! let registry = Registry::new();
//! let ns = registry.create_namespace("jobs").unwrap();
//!
//! let job = ns.run_and_return(|ctx| {
//!     ctx.set("job", 7u32);
//!     AsyncResource::new(registry.hooks(), "Job")
//! });
//! assert_eq!(ns.get::<u32>("job"), None);
//!
//! job.run_in_scope(|| assert_eq!(ns.get::<u32>("job"), Some(7)));
//! ```

mod apply_context;
mod lifecycle;
mod namespace_impl;
mod run;


pub use apply_context::{ApplyContext, RunPromise};
pub use namespace_impl::Namespace;
pub use run::Bound;

pub(crate) use namespace_impl::NamespaceInner;
