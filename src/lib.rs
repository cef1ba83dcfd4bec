//SPDX-License-Identifier: MIT OR Apache-2.0
/*!
# contextwise

contextwise is continuation-local storage for Rust.

# The problem

A request handler sets a user id. Three callbacks, a timer and a future later,
some logging code wants that user id back. Thread-locals don't work, because the
callbacks run whenever and wherever the executor gets to them. Passing the value
down by hand works until it crosses a library boundary that doesn't know about it.

contextwise keeps a key/value bag (a [`Context`]) attached to a *logical flow*
instead of a thread. Code anywhere in the flow reads the bag through a
[`Namespace`]; the namespace makes sure the right bag is active each time the
flow resumes.

# The API

```rust
use contextwise::Registry;

let registry = Registry::new();
let ns = registry.create_namespace("request").unwrap();

ns.run(|ctx| {
    ctx.set("user", 42u64);
    // anywhere inside the flow:
    assert_eq!(ns.get::<u64>("user"), Some(42));
});
// and nowhere outside it:
assert_eq!(ns.get::<u64>("user"), None);
```

Flows resume in a few ways, each with its own adapter:

| Resumption point          | Adapter                                                   |
|---------------------------|-----------------------------------------------------------|
| a closure called later    | [`Namespace::bind`]                                       |
| a future polled later     | [`Namespace::run_promise`], [`Namespace::bind_future`]    |
| an event listener         | [`Namespace::bind_emitter`] with an [`EventEmitter`]      |
| a callback-style unit     | [`hooks::AsyncResource`] reported to the registry's hooks |

# Async units

Namespaces follow work through the [`hooks`] module: an [`AsyncHooks`](hooks::AsyncHooks)
host numbers units of asynchronous work and tells every namespace when a unit is
created, about to run, finished running, settled and gone. A unit created while a
context is active runs inside that context, however much later it runs.

# Errors

An error escaping a scope is tagged with the context it escaped from, so a
handler far away can still see what the flow had recorded. See [`Tagged`] and
[`from_exception`].

# Diagnostics

Set `DEBUG_CONTEXTWISE=true` (or build a [`Config`] with
[`with_debug`](Config::with_debug)) to have every namespace report each internal
operation through `logwise`. Reports are logged at info level in debug builds
and as warnings in release builds, where logwise compiles info logging out.

# Threads

The active context and the enter/exit stack of a namespace are per thread: two
threads running the same namespace never see each other's contexts. Async units
are shared, so a unit created on one thread re-enters its context wherever it
runs.
*/

logwise::declare_logging_domain!();

mod config;
pub mod context;
mod debug;
mod emitter;
mod error;
pub mod hooks;
mod namespace;
mod registry;
mod weak;

pub use config::{Config, DEBUG_ENV, STRONG_REFS_ENV};
pub use context::{Context, ContextID, Value, value};
pub use emitter::{EventEmitter, Listener, ListenerId, NEW_LISTENER};
pub use error::{BoxError, Error, Exception, Tagged, from_exception};
pub use namespace::{ApplyContext, Bound, Namespace, RunPromise};
pub use registry::{Registry, create_namespace, destroy_namespace, get_namespace, reset};
