// SPDX-License-Identifier: MIT OR Apache-2.0

//! Async context preservation.

use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::task::Poll;

use crate::context::Context;
use crate::error::Tagged;

use super::namespace_impl::Namespace;
use super::run::Entered;

/// A [`Future`] wrapper that enters a context around each poll.
///
/// Executors resume futures from wherever they happen to be, so whatever was
/// active when the future was created is usually not active when it is polled.
/// `ApplyContext` enters its context for the duration of every poll and exits it
/// before returning to the executor.
///
/// ```
/// use contextwise::Registry;
///
/// # async fn example() {
/// let registry = Registry::new();
/// let ns = registry.create_namespace("apply").unwrap();
///
/// let ctx = ns.create_context();
/// ctx.set("tenant", "acme");
/// let ns2 = ns.clone();
/// let tenant = ns.bind_future_with(async move { ns2.get::<&str>("tenant") }, ctx);
/// assert_eq!(tenant.await, Some("acme"));
/// # }
/// ```
pub struct ApplyContext<F> {
    namespace: Namespace,
    context: Context,
    future: F,
}

impl<F> ApplyContext<F> {
    /// The context entered around each poll.
    pub fn context(&self) -> &Context {
        &self.context
    }
}

impl<F> Future for ApplyContext<F>
where
    F: Future,
{
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> Poll<Self::Output> {
        //safety: `future` is never moved out of the pinned wrapper
        let (namespace, context, fut) = unsafe {
            let d = self.get_unchecked_mut();
            (&d.namespace, &d.context, Pin::new_unchecked(&mut d.future))
        };
        let _entered = Entered::new(namespace, context);
        fut.poll(cx)
    }
}

/// The future returned by [`Namespace::run_promise`].
///
/// Its context was entered when `run_promise` was called and stays entered until
/// the future settles (or the wrapper is dropped). Each poll also enters the
/// context for its own duration. An `Err` output is tagged with the context.
pub struct RunPromise<F> {
    namespace: Namespace,
    context: Context,
    future: F,
    settled: bool,
}

impl<F> RunPromise<F> {
    /// The fresh context created for this future.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Whether the future has produced its output and exited its context.
    pub fn is_settled(&self) -> bool {
        self.settled
    }
}

impl<F, T, E> Future for RunPromise<F>
where
    F: Future<Output = Result<T, E>>,
{
    type Output = Result<T, Tagged<E>>;

    fn poll(self: Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> Poll<Self::Output> {
        //safety: `future` is never moved out of the pinned wrapper
        let (namespace, context, fut, settled) = unsafe {
            let d = self.get_unchecked_mut();
            (&d.namespace, &d.context, Pin::new_unchecked(&mut d.future), &mut d.settled)
        };
        assert!(!*settled, "RunPromise polled after completion");
        let poll = {
            let _entered = Entered::new(namespace, context);
            fut.poll(cx)
        };
        let Poll::Ready(result) = poll else {
            return Poll::Pending;
        };
        *settled = true;
        let depth = namespace.depth();
        namespace.debug("[run_promise] settled", depth, |s| {
            s.field("context", context.context_id())
                .field("ok", result.is_ok());
        });
        namespace.exit_scoped(context);
        Poll::Ready(result.map_err(|error| Tagged::new(error, context.clone())))
    }
}

impl<F> Drop for RunPromise<F> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if let Err(error) = self.namespace.exit(&self.context) {
            let error = error.to_string();
            logwise::warn_sync!(
                "dropped an unsettled run_promise future but could not exit its context: {error}",
                error = error
            );
        }
    }
}

impl Namespace {
    /// Runs `f` in a fresh child context that stays entered until the returned
    /// future settles.
    ///
    /// `f` is called immediately, with the context already entered. If it
    /// panics, the context is exited. The future it returns is wrapped so that
    /// the context is entered around every poll, an `Err` output is tagged, and
    /// the context is exited once the future settles.
    ///
    /// The entry made here belongs to the calling thread. Poll the future to
    /// completion, or drop it, on that thread; if it settles elsewhere, the
    /// calling thread keeps the entry until it exits the context itself.
    ///
    /// ```
    /// use contextwise::{Registry, from_exception};
    ///
    /// # async fn example() {
    /// let registry = Registry::new();
    /// let ns = registry.create_namespace("promise").unwrap();
    ///
    /// let ns2 = ns.clone();
    /// let pending = ns.run_promise(|ctx| {
    ///     ctx.set("attempt", 3u8);
    ///     async move { Err::<(), _>(format!("attempt {} failed", ns2.get::<u8>("attempt").unwrap())) }
    /// });
    /// let err = pending.await.unwrap_err();
    /// assert_eq!(err.error(), "attempt 3 failed");
    /// assert_eq!(from_exception(&err).unwrap().get::<u8>("attempt"), Some(3));
    /// # }
    /// ```
    pub fn run_promise<T, E, Fut>(&self, f: impl FnOnce(&Context) -> Fut) -> RunPromise<Fut::IntoFuture>
    where
        Fut: IntoFuture<Output = Result<T, E>>,
    {
        let context = self.create_context();
        let depth = self.depth();
        self.debug("[run_promise] begin", depth, |s| {
            s.field("context", context.context_id());
        });
        let entered = Entered::new(self, &context);
        let future = f(&context).into_future();
        entered.keep();
        RunPromise {
            namespace: self.clone(),
            context,
            future,
            settled: false,
        }
    }

    /// Wraps `future` so the active context (or a fresh one) is entered around
    /// each of its polls.
    pub fn bind_future<F: IntoFuture>(&self, future: F) -> ApplyContext<F::IntoFuture> {
        let context = match self.active() {
            Some(active) => active,
            None => self.create_context(),
        };
        self.bind_future_with(future, context)
    }

    /// Wraps `future` so `context` is entered around each of its polls.
    pub fn bind_future_with<F: IntoFuture>(&self, future: F, context: Context) -> ApplyContext<F::IntoFuture> {
        ApplyContext {
            namespace: self.clone(),
            context,
            future: future.into_future(),
        }
    }
}
