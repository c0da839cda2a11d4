use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::oneshot;
use tollgate_core::{Interceptor, InterceptorContext};
use tollgate_dedup::{DedupLock, DedupRejection, DedupSettings, FingerprintError, KeyStrategy, RepeatLock};

#[derive(Debug, PartialEq)]
enum ApiError {
    RepeatRequest(String),
    Unkeyed,
    Failed,
}

impl From<DedupRejection> for ApiError {
    fn from(rejection: DedupRejection) -> Self {
        match rejection {
            DedupRejection::Duplicate(fingerprint) => ApiError::RepeatRequest(fingerprint.to_string()),
            DedupRejection::Unkeyed(_) => ApiError::Unkeyed,
        }
    }
}

fn repeat_lock(strategy: KeyStrategy) -> RepeatLock {
    RepeatLock::new(DedupLock::in_memory(&DedupSettings::default()), strategy)
}

#[tokio::test]
async fn test_passes_result_through() {
    let interceptor = RepeatLock::per_caller(DedupLock::in_memory(&DedupSettings::default()));
    let ctx = InterceptorContext::stateless("login", Some("/login"), Some("alice"));
    let result: Result<u32, ApiError> = interceptor.around(ctx, || async { Ok(1) }).await;
    assert_eq!(result, Ok(1));

    let ctx = InterceptorContext::stateless("login", Some("/login"), Some("alice"));
    let failed: Result<u32, ApiError> = interceptor
        .around(ctx, || async { Err(ApiError::Failed) })
        .await;
    assert_eq!(failed, Err(ApiError::Failed));
}

#[tokio::test]
async fn test_duplicate_maps_into_error_type() {
    let interceptor = repeat_lock(KeyStrategy::PerCallerAndPath);
    let (started_tx, started_rx) = oneshot::channel::<()>();
    let (finish_tx, finish_rx) = oneshot::channel::<()>();

    let first = {
        let interceptor = interceptor.clone();
        tokio::spawn(async move {
            let ctx = InterceptorContext::stateless("role.update", Some("/role/1"), Some("bob"));
            let result: Result<&'static str, ApiError> = interceptor
                .around(ctx, move || async move {
                    let _ = started_tx.send(());
                    let _ = finish_rx.await;
                    Ok("updated")
                })
                .await;
            result
        })
    };

    started_rx.await.unwrap();
    let ran = Arc::new(AtomicUsize::new(0));
    let ran_inner = ran.clone();
    let ctx = InterceptorContext::stateless("role.update", Some("/role/1"), Some("bob"));
    let second: Result<&'static str, ApiError> = interceptor
        .around(ctx, move || async move {
            ran_inner.fetch_add(1, Ordering::SeqCst);
            Ok("again")
        })
        .await;
    assert_eq!(
        second,
        Err(ApiError::RepeatRequest("role.update:bob:/role/1".into()))
    );
    assert_eq!(ran.load(Ordering::SeqCst), 0);

    // A different path is a different request.
    let ctx = InterceptorContext::stateless("role.update", Some("/role/2"), Some("bob"));
    let other: Result<&'static str, ApiError> = interceptor.around(ctx, || async { Ok("other") }).await;
    assert_eq!(other, Ok("other"));

    finish_tx.send(()).unwrap();
    assert_eq!(first.await.unwrap(), Ok("updated"));
}

#[tokio::test]
async fn test_missing_caller_is_rejected_without_running() {
    let interceptor = repeat_lock(KeyStrategy::PerCaller);
    let ran = Arc::new(AtomicUsize::new(0));
    let ran_inner = ran.clone();
    let ctx = InterceptorContext::stateless("login", Some("/login"), None);
    let result: Result<(), ApiError> = interceptor
        .around(ctx, move || async move {
            ran_inner.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await;
    assert_eq!(result, Err(ApiError::Unkeyed));
    assert_eq!(ran.load(Ordering::SeqCst), 0);
    assert_eq!(
        DedupRejection::Unkeyed(FingerprintError::MissingCaller).to_string(),
        "Request key unavailable: no resolved caller to derive a request key from"
    );
}
