use std::future::Future;

/// Context passed to each interceptor, including a reference to shared state.
pub struct InterceptorContext<'a, S> {
    /// Logical operation name, used as the stable part of derived keys.
    pub operation: &'static str,
    /// Request path the operation was invoked for, if known.
    pub path: Option<&'a str>,
    /// Resolved caller subject, if any.
    pub caller: Option<&'a str>,
    pub state: &'a S,
}

impl<'a> InterceptorContext<'a, ()> {
    /// Context with no shared state.
    pub fn stateless(operation: &'static str, path: Option<&'a str>, caller: Option<&'a str>) -> Self {
        InterceptorContext {
            operation,
            path,
            caller,
            state: &(),
        }
    }
}

/// Generic interceptor trait with an `around` pattern.
///
/// Each interceptor wraps the next computation. Interceptors are composed
/// by nesting: the outermost interceptor calls `next()` which runs the
/// next interceptor, and so on. An interceptor may also decide not to call
/// `next` at all and produce a result of its own.
///
/// Type parameter `R` is the return type of the wrapped computation.
/// Type parameter `S` is the shared state type, available via
/// [`InterceptorContext::state`].
#[diagnostic::on_unimplemented(
    message = "`{Self}` does not implement `Interceptor<{R}, {S}>`",
    label = "this type cannot be used as an interceptor",
    note = "implement `Interceptor<R, S>` for your type"
)]
pub trait Interceptor<R, S> {
    fn around<F, Fut>(
        &self,
        ctx: InterceptorContext<'_, S>,
        next: F,
    ) -> impl Future<Output = R> + Send
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = R> + Send;
}
