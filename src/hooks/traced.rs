// SPDX-License-Identifier: MIT OR Apache-2.0

//! Future-like units.

use std::future::Future;
use std::pin::Pin;
use std::task::Poll;

use super::host::AsyncHooks;
use super::resource::AsyncResource;

/// A [`Future`] reported to an [`AsyncHooks`] as one unit.
///
/// Created by [`AsyncHooks::trace`]. The unit is initialized when the wrapper is
/// created, so it is attributed to whatever was executing (and whatever context
/// was active) at that moment. Every poll is a `before`/`after` pair; the poll
/// that completes the future reports `promise_resolve` before its `after`.
/// Dropping the wrapper reports `destroy`.
///
/// ```
/// use contextwise::hooks::AsyncHooks;
///
/// # async fn example() {
/// let hooks = AsyncHooks::new();
/// let traced = hooks.trace(async { 21 * 2 });
/// assert_eq!(traced.await, 42);
/// # }
/// ```
pub struct Traced<F> {
    resource: AsyncResource,
    future: F,
}

impl<F> Traced<F> {
    pub(crate) fn new(hooks: &AsyncHooks, future: F) -> Self {
        Traced {
            resource: AsyncResource::new(hooks, "PROMISE"),
            future,
        }
    }

    /// The unit reported for this future.
    pub fn resource(&self) -> &AsyncResource {
        &self.resource
    }
}

impl<F> Future for Traced<F>
where
    F: Future,
{
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> Poll<Self::Output> {
        //safety: `future` is never moved out of the pinned wrapper
        let (resource, fut) = unsafe {
            let d = self.get_unchecked_mut();
            (&d.resource, Pin::new_unchecked(&mut d.future))
        };
        resource.run_in_scope(|| {
            let r = fut.poll(cx);
            if r.is_ready() {
                resource.resolve();
            }
            r
        })
    }
}
