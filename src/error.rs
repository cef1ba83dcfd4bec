// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types.
//!
//! Two kinds of failure live here:
//!
//! - [`Error`]: misuse of the API, returned to the immediate caller.
//! - [`Tagged`]: a *user* error that escaped a [`Namespace`](crate::Namespace)
//!   scope, carrying the context that was active when it escaped. Read the tag back
//!   with [`from_exception`].

use std::fmt::{Debug, Display};

use crate::context::Context;

/// Misuse of the contextwise API.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("namespace must be given a name")]
    MissingName,

    #[error("a namespace named `{0}` already exists")]
    DuplicateNamespace(String),

    #[error("no context available; run() or bind() must be called first")]
    NoActiveContext,

    #[error("can't exit the active context: the context stack is empty")]
    StackUnderflow,

    #[error("can't remove the bottom context from the stack")]
    BottomContext,
}

/// A user error annotated with the context active when it escaped.
///
/// Produced by [`Namespace::try_run`](crate::Namespace::try_run),
/// [`Bound::try_call`](crate::Bound::try_call) and
/// [`Namespace::run_promise`](crate::Namespace::run_promise). Displays as the
/// wrapped error.
///
/// ```
/// use contextwise::{Registry, from_exception};
///
/// let registry = Registry::new();
/// let ns = registry.create_namespace("errors").unwrap();
/// let err = ns
///     .try_run(|ctx| {
///         ctx.set("step", "parse");
///         Err::<(), _>("bad input")
///     })
///     .unwrap_err();
/// assert_eq!(err.to_string(), "bad input");
/// let context = from_exception(&err).unwrap();
/// assert_eq!(context.get::<&str>("step"), Some("parse"));
/// ```
pub struct Tagged<E> {
    error: E,
    context: Context,
}

impl<E> Tagged<E> {
    /// Tags `error` with `context`.
    pub fn new(error: E, context: Context) -> Self {
        Tagged { error, context }
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// The wrapped error.
    pub fn error(&self) -> &E {
        &self.error
    }

    /// Unwraps the error, dropping the tag.
    pub fn into_inner(self) -> E {
        self.error
    }

    pub fn into_parts(self) -> (E, Context) {
        (self.error, self.context)
    }

    /// Transforms the wrapped error, keeping the tag.
    pub fn map<U>(self, f: impl FnOnce(E) -> U) -> Tagged<U> {
        Tagged {
            error: f(self.error),
            context: self.context,
        }
    }
}

impl<E> Tagged<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Erases the error type, so the tag can be found anywhere in a source chain.
    pub fn boxed(self) -> Tagged<BoxError> {
        self.map(|error| Box::new(error) as BoxError)
    }
}

/// The erased error type used by [`Tagged::boxed`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

impl<E: Debug> Debug for Tagged<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tagged")
            .field("error", &self.error)
            .field("context", &self.context.context_id())
            .finish()
    }
}

impl<E: Display> Display for Tagged<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.error, f)
    }
}

impl<E: Debug + Display> std::error::Error for Tagged<E> {}

/// A value that may carry a context tag.
pub trait Exception {
    /// The tagged context, if there is one.
    fn tagged_context(&self) -> Option<Context>;
}

impl<E> Exception for Tagged<E> {
    fn tagged_context(&self) -> Option<Context> {
        Some(self.context.clone())
    }
}

impl Exception for dyn std::error::Error + 'static {
    fn tagged_context(&self) -> Option<Context> {
        let mut current: Option<&(dyn std::error::Error + 'static)> = Some(self);
        while let Some(error) = current {
            if let Some(tagged) = error.downcast_ref::<Tagged<BoxError>>() {
                return Some(tagged.context.clone());
            }
            current = error.source();
        }
        None
    }
}

impl Exception for dyn std::error::Error + Send + Sync + 'static {
    fn tagged_context(&self) -> Option<Context> {
        (self as &(dyn std::error::Error + 'static)).tagged_context()
    }
}

impl Exception for BoxError {
    fn tagged_context(&self) -> Option<Context> {
        self.as_ref().tagged_context()
    }
}

/// Retrieves the context attached to `exception`, if any.
///
/// Works on [`Tagged`] values directly, and on erased errors by walking their
/// [`source`](std::error::Error::source) chain for a [`Tagged::boxed`] link.
/// Anything else was never tagged and yields `None`.
pub fn from_exception<X: Exception + ?Sized>(exception: &X) -> Option<Context> {
    exception.tagged_context()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::AsyncId;

    #[cfg(target_arch = "wasm32")]
    use wasm_bindgen_test::*;

    #[derive(Debug, thiserror::Error)]
    #[error("outer failure")]
    struct Outer(#[source] BoxError);

    #[cfg_attr(not(target_arch = "wasm32"), test)]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
    fn tagged_is_transparent() {
        let context = Context::new(None, "errors", AsyncId::ROOT);
        let tagged = Tagged::new(std::fmt::Error, context.clone());
        assert_eq!(tagged.to_string(), std::fmt::Error.to_string());
        assert_eq!(from_exception(&tagged), Some(context));
        let (_, back) = tagged.into_parts();
        assert_eq!(back.namespace_name(), "errors");
    }

    #[cfg_attr(not(target_arch = "wasm32"), test)]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
    fn boxed_tag_found_in_source_chain() {
        let context = Context::new(None, "errors", AsyncId::ROOT);
        context.set("v", 3u8);
        let inner: BoxError = Box::new(Tagged::new(std::fmt::Error, context.clone()).boxed());
        let outer: BoxError = Box::new(Outer(inner));
        let found = from_exception(&outer).unwrap();
        assert_eq!(found, context);
        assert_eq!(found.get::<u8>("v"), Some(3));
    }

    #[cfg_attr(not(target_arch = "wasm32"), test)]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
    fn untagged_error_has_no_context() {
        let plain: BoxError = Box::new(std::fmt::Error);
        assert!(from_exception(&plain).is_none());
    }

    #[cfg_attr(not(target_arch = "wasm32"), test)]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
    fn usage_error_messages() {
        assert_eq!(
            Error::NoActiveContext.to_string(),
            "no context available; run() or bind() must be called first"
        );
        assert_eq!(
            Error::DuplicateNamespace("a".into()).to_string(),
            "a namespace named `a` already exists"
        );
    }
}
