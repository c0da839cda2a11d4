use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tollgate_core::interceptors::{Interceptor, InterceptorContext};

/// Counts invocations and passes through.
struct Counting(Arc<AtomicUsize>);

impl<R: Send, S: Sync> Interceptor<R, S> for Counting {
    fn around<F, Fut>(&self, _ctx: InterceptorContext<'_, S>, next: F) -> impl Future<Output = R> + Send
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = R> + Send,
    {
        let counter = self.0.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            next().await
        }
    }
}

/// Short-circuits without running the wrapped computation.
struct Refuse;

impl<S: Sync> Interceptor<Result<u32, String>, S> for Refuse {
    fn around<F, Fut>(
        &self,
        ctx: InterceptorContext<'_, S>,
        _next: F,
    ) -> impl Future<Output = Result<u32, String>> + Send
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<u32, String>> + Send,
    {
        let operation = ctx.operation;
        async move { Err(format!("refused {operation}")) }
    }
}

#[test]
fn interceptor_context_accessors() {
    let state = 42u32;
    let ctx = InterceptorContext {
        operation: "role.update",
        path: Some("/role/update"),
        caller: Some("alice"),
        state: &state,
    };
    assert_eq!(ctx.operation, "role.update");
    assert_eq!(ctx.path, Some("/role/update"));
    assert_eq!(ctx.caller, Some("alice"));
    assert_eq!(*ctx.state, 42u32);
}

#[tokio::test]
async fn passthrough_interceptor_runs_next() {
    let counter = Arc::new(AtomicUsize::new(0));
    let interceptor = Counting(counter.clone());
    let ctx = InterceptorContext::stateless("op", None, None);
    let result: u32 = interceptor.around(ctx, || async { 7 }).await;
    assert_eq!(result, 7);
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn short_circuit_interceptor_skips_next() {
    let ran = Arc::new(AtomicUsize::new(0));
    let ran_inner = ran.clone();
    let ctx = InterceptorContext::stateless("login", None, None);
    let result = Refuse
        .around(ctx, move || async move {
            ran_inner.fetch_add(1, Ordering::SeqCst);
            Ok(1)
        })
        .await;
    assert_eq!(result, Err("refused login".to_string()));
    assert_eq!(ran.load(Ordering::SeqCst), 0);
}
