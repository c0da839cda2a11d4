use std::future::Future;

use tollgate_core::{Interceptor, InterceptorContext};

use crate::{DedupLock, DedupRejection, KeyStrategy, LockOutcome};

/// Conversion from a lock rejection into the wrapped operation's own result type.
pub trait FromRejection {
    fn from_rejection(rejection: DedupRejection) -> Self;
}

impl<T, E: From<DedupRejection>> FromRejection for Result<T, E> {
    fn from_rejection(rejection: DedupRejection) -> Self {
        Err(E::from(rejection))
    }
}

/// Interceptor running the wrapped operation under a [`DedupLock`].
///
/// The fingerprint is derived from the context's operation name plus the
/// caller and/or path, as selected by the [`KeyStrategy`].
#[derive(Clone)]
pub struct RepeatLock {
    lock: DedupLock,
    strategy: KeyStrategy,
}

impl RepeatLock {
    pub fn new(lock: DedupLock, strategy: KeyStrategy) -> Self {
        Self { lock, strategy }
    }

    pub fn per_caller(lock: DedupLock) -> Self {
        Self::new(lock, KeyStrategy::PerCaller)
    }
}

impl<R, S> Interceptor<R, S> for RepeatLock
where
    R: FromRejection + Send,
    S: Sync,
{
    fn around<F, Fut>(&self, ctx: InterceptorContext<'_, S>, next: F) -> impl Future<Output = R> + Send
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = R> + Send,
    {
        let key = self.strategy.derive(ctx.operation, ctx.caller, ctx.path);
        let lock = self.lock.clone();
        async move {
            match lock.wrap(key, next).await {
                LockOutcome::Completed(result) => result,
                LockOutcome::Duplicate(fingerprint) => {
                    R::from_rejection(DedupRejection::Duplicate(fingerprint))
                }
                LockOutcome::Unkeyed(err) => R::from_rejection(DedupRejection::Unkeyed(err)),
            }
        }
    }
}
