// SPDX-License-Identifier: MIT OR Apache-2.0

//! Asynchronous unit lifecycle tracking.
//!
//! Continuation-local storage needs to hear about every unit of asynchronous work:
//! when it is created, when its callback is about to run, when the callback has
//! finished, when a future-like unit settles, and when the unit is gone. This
//! module is the host side of that contract.
//!
//! # Overview
//!
//! - [`AsyncId`]: the number assigned to each unit
//! - [`HookCallbacks`]: the five notifications a listener can receive
//! - [`AsyncHooks`]: numbers units, tracks which unit is executing, and delivers
//!   notifications to every enabled [`AsyncHook`]
//! - [`AsyncResource`]: wraps a callback-style unit (a timer, a queued task)
//! - [`Traced`]: wraps a [`Future`] as a unit that also reports settlement
//!
//! The host does not schedule anything. Whatever executor or queue runs the work
//! keeps doing so; the wrappers only report what happens.
//!
//! # Notification order
//!
//! For one unit the host delivers `init`, then any number of `before`/`after`
//! pairs, then `destroy`. A [`Traced`] future additionally delivers
//! `promise_resolve` once, from inside the poll that completed it, which means it
//! arrives *before* that poll's `after`.
//!
//! ```
//! use contextwise::hooks::{AsyncHooks, AsyncResource};
//!
//! let hooks = AsyncHooks::new();
//! let timer = AsyncResource::new(&hooks, "Timeout");
//! // ...later, when the timer fires:
//! timer.run_in_scope(|| {
//!     assert_eq!(hooks.execution_async_id(), timer.async_id());
//! });
//! ```

mod host;
mod resource;
mod traced;


pub use host::{AsyncHook, AsyncHooks, AsyncId, HookCallbacks};
pub use resource::AsyncResource;
pub use traced::Traced;
