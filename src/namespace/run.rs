// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scoped helpers: `run` and `bind`.

use crate::context::Context;
use crate::error::Tagged;

use super::namespace_impl::Namespace;

/// Exits its context when dropped, including during unwinding.
pub(crate) struct Entered<'a> {
    namespace: &'a Namespace,
    context: &'a Context,
}

impl<'a> Entered<'a> {
    pub(crate) fn new(namespace: &'a Namespace, context: &'a Context) -> Self {
        namespace.enter(context);
        Entered { namespace, context }
    }

    /// Leaves the context entered past the end of the guard.
    pub(crate) fn keep(self) {
        std::mem::forget(self);
    }
}

impl Drop for Entered<'_> {
    fn drop(&mut self) {
        self.namespace.exit_scoped(self.context);
    }
}

impl Namespace {
    /// Runs `f` in a fresh child of the active context and returns that context.
    ///
    /// The context is exited when `f` returns or unwinds.
    pub fn run(&self, f: impl FnOnce(&Context)) -> Context {
        let context = self.create_context();
        self.run_in(&context, f);
        context
    }

    /// Like [`run`](Self::run), but returns what `f` returns.
    pub fn run_and_return<T>(&self, f: impl FnOnce(&Context) -> T) -> T {
        let context = self.create_context();
        self.run_in(&context, f)
    }

    /// Like [`run`](Self::run), for fallible work.
    ///
    /// An `Err` from `f` is tagged with the context before it is returned;
    /// read the tag back with [`from_exception`](crate::from_exception).
    pub fn try_run<T, E>(&self, f: impl FnOnce(&Context) -> Result<T, E>) -> Result<Context, Tagged<E>> {
        let context = self.create_context();
        self.try_run_in(&context, f).map(|_| context)
    }

    /// Like [`run_and_return`](Self::run_and_return), for fallible work.
    pub fn try_run_and_return<T, E>(&self, f: impl FnOnce(&Context) -> Result<T, E>) -> Result<T, Tagged<E>> {
        let context = self.create_context();
        self.try_run_in(&context, f)
    }

    fn run_in<T>(&self, context: &Context, f: impl FnOnce(&Context) -> T) -> T {
        let depth = self.depth();
        self.debug("[run] begin", depth, |s| {
            s.field("context", context.context_id());
        });
        let result = {
            let _entered = Entered::new(self, context);
            f(context)
        };
        let depth = self.depth();
        self.debug("[run] end", depth, |s| {
            s.field("context", context.context_id());
        });
        result
    }

    fn try_run_in<T, E>(&self, context: &Context, f: impl FnOnce(&Context) -> Result<T, E>) -> Result<T, Tagged<E>> {
        self.run_in(context, |context| {
            f(context).map_err(|error| {
                let depth = self.depth();
                self.debug("[run] error", depth, |s| {
                    s.field("context", context.context_id());
                });
                Tagged::new(error, context.clone())
            })
        })
    }

    /// Captures a context for `f`: the active one, or a fresh one if nothing is active.
    ///
    /// The returned [`Bound`] enters that context every time it is called, no
    /// matter what is active at the call site.
    ///
    /// ```
    /// use contextwise::Registry;
    ///
    /// let registry = Registry::new();
    /// let ns = registry.create_namespace("bind").unwrap();
    ///
    /// let report = ns.run_and_return(|ctx| {
    ///     ctx.set("request", 17u32);
    ///     ns.bind(|suffix: &str| format!("{}{suffix}", ns.get::<u32>("request").unwrap()))
    /// });
    /// assert_eq!(report.call("!"), "17!");
    /// ```
    pub fn bind<F>(&self, f: F) -> Bound<F> {
        let context = match self.active() {
            Some(active) => active,
            None => self.create_context(),
        };
        self.bind_with(f, context)
    }

    /// Binds `f` to `context` explicitly.
    pub fn bind_with<F>(&self, f: F, context: Context) -> Bound<F> {
        let depth = self.depth();
        self.debug("[bind]", depth, |s| {
            s.field("context", context.context_id());
        });
        Bound {
            namespace: self.clone(),
            context,
            f,
        }
    }
}

/// A function bound to a context. Created by [`Namespace::bind`].
///
/// Bound functions take their arguments as one value; use a tuple for several,
/// or `()` for none.
pub struct Bound<F> {
    namespace: Namespace,
    context: Context,
    f: F,
}

impl<F> std::fmt::Debug for Bound<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bound")
            .field("namespace", &self.namespace.name())
            .field("context", &self.context.context_id())
            .finish()
    }
}

impl<F: Clone> Clone for Bound<F> {
    fn clone(&self) -> Self {
        Bound {
            namespace: self.namespace.clone(),
            context: self.context.clone(),
            f: self.f.clone(),
        }
    }
}

impl<F> Bound<F> {
    /// The captured context.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// The namespace the context is entered in.
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Calls the function with the captured context entered.
    ///
    /// The context is exited again even if the function panics. Pass `()` for no
    /// argument and a tuple for several.
    ///
    /// ```
    /// use contextwise::Registry;
    ///
    /// let registry = Registry::new();
    /// let ns = registry.create_namespace("bound-call").unwrap();
    /// let sum = ns.run_and_return(|ctx| {
    ///     ctx.set("base", 10i64);
    ///     ns.bind(|(a, b): (i64, i64)| ns.get::<i64>("base").unwrap() + a + b)
    /// });
    /// assert_eq!(sum.call((1, 2)), 13);
    /// assert!(ns.active().is_none());
    /// ```
    pub fn call<A, R>(&self, arg: A) -> R
    where
        F: Fn(A) -> R,
    {
        let _entered = Entered::new(&self.namespace, &self.context);
        (self.f)(arg)
    }

    /// Like [`call`](Self::call), for functions that mutate their captures.
    pub fn call_mut<A, R>(&mut self, arg: A) -> R
    where
        F: FnMut(A) -> R,
    {
        let Bound { namespace, context, f } = self;
        let _entered = Entered::new(namespace, context);
        f(arg)
    }

    /// Like [`call`](Self::call), consuming the binding.
    pub fn call_once<A, R>(self, arg: A) -> R
    where
        F: FnOnce(A) -> R,
    {
        let Bound { namespace, context, f } = self;
        let _entered = Entered::new(&namespace, &context);
        f(arg)
    }

    /// Calls a fallible function, tagging an `Err` with the bound context.
    pub fn try_call<A, T, E>(&self, arg: A) -> Result<T, Tagged<E>>
    where
        F: Fn(A) -> Result<T, E>,
    {
        let _entered = Entered::new(&self.namespace, &self.context);
        (self.f)(arg).map_err(|error| Tagged::new(error, self.context.clone()))
    }
}
