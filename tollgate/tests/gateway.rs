use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::oneshot;
use tollgate::tollgate_dedup::{Fingerprint, FingerprintError, KeyStrategy};
use tollgate::tollgate_security::{
    ConfigPolicySource, DenyReason, Endpoint, PermissionStore, PolicyLoadError, SecurityPolicy,
    StaticPolicySource, UserProfile,
};
use tollgate::{Gateway, GatewayError, GatewayOutcome, RequestContext, TollgateConfig};
use tollgate_test::{policy_config, sample_store, ProfileBuilder};

fn endpoints() -> Vec<Endpoint> {
    vec![
        Endpoint::get("/user/{id}"),
        Endpoint::put("/user/{id}"),
        Endpoint::post("/role/permission"),
        Endpoint::get("/report"),
    ]
}

async fn gateway() -> Gateway {
    let gateway = Gateway::from_config(&policy_config(), endpoints()).unwrap();
    gateway.load_permissions(sample_store().permissions().await.unwrap());
    gateway
}

fn reader() -> UserProfile {
    ProfileBuilder::new(2, "bob").authorities(&["user:read"]).build()
}

fn admin() -> UserProfile {
    ProfileBuilder::new(1, "alice")
        .authorities(&["user:read", "user:write", "role:grant", "user:admin"])
        .build()
}

#[tokio::test]
async fn test_permit_path_runs_without_identity() {
    let gateway = gateway().await;
    let request = RequestContext::new("login", "POST", "/api/login/password");
    let outcome = gateway
        .handle::<UserProfile, _, _, _>(&request, None, || async { "token" })
        .await;
    assert_eq!(outcome, GatewayOutcome::Completed("token"));
}

#[tokio::test]
async fn test_authorization_outcomes() {
    let gateway = gateway().await;
    let calls = AtomicUsize::new(0);
    let calls = &calls;
    let run = move || async move {
        calls.fetch_add(1, Ordering::SeqCst);
    };

    let read = RequestContext::new("user.get", "GET", "/api/user/2");
    let anonymous = gateway.handle::<UserProfile, _, _, _>(&read, None, run).await;
    assert_eq!(anonymous, GatewayOutcome::Denied(DenyReason::NoGrantedAuthorities));

    let bob = reader();
    assert_eq!(
        gateway.handle(&read, Some(&bob), run).await,
        GatewayOutcome::Completed(())
    );

    let write = RequestContext::new("user.update", "PUT", "/api/user/2");
    assert_eq!(
        gateway.handle(&write, Some(&bob), run).await,
        GatewayOutcome::Denied(DenyReason::MissingPermission)
    );
    assert_eq!(
        gateway.handle(&write, Some(&admin()), run).await,
        GatewayOutcome::Completed(())
    );

    // No permission guards the report, so it falls back to the denied baseline.
    let report = RequestContext::new("report", "GET", "/api/report");
    assert_eq!(
        gateway.handle(&report, Some(&admin()), run).await,
        GatewayOutcome::Denied(DenyReason::DeniedByPolicy)
    );

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_idempotent_request_rejects_concurrent_duplicate() {
    let gateway = gateway().await;
    let (started_tx, started_rx) = oneshot::channel::<()>();
    let (finish_tx, finish_rx) = oneshot::channel::<()>();

    let first = {
        let gateway = gateway.clone();
        tokio::spawn(async move {
            let request = RequestContext::new("role.grant", "POST", "/api/role/permission")
                .dedup(KeyStrategy::PerCaller);
            gateway
                .handle(&request, Some(&admin()), move || async move {
                    let _ = started_tx.send(());
                    let _ = finish_rx.await;
                    "granted"
                })
                .await
        })
    };

    started_rx.await.unwrap();
    let request = RequestContext::new("role.grant", "POST", "/api/role/permission")
        .dedup(KeyStrategy::PerCaller);
    let duplicate = gateway
        .handle(&request, Some(&admin()), || async { "again" })
        .await;
    assert_eq!(
        duplicate,
        GatewayOutcome::Duplicate(Fingerprint::new("role.grant:alice"))
    );

    // Authorization runs before the lock: an unauthorized duplicate is denied.
    let denied = gateway
        .handle(&request, Some(&reader()), || async { "again" })
        .await;
    assert_eq!(denied, GatewayOutcome::Denied(DenyReason::MissingPermission));

    finish_tx.send(()).unwrap();
    assert_eq!(first.await.unwrap(), GatewayOutcome::Completed("granted"));
    assert_eq!(gateway.lock().held(), 0);
    assert_eq!(
        gateway.handle(&request, Some(&admin()), || async { "later" }).await,
        GatewayOutcome::Completed("later")
    );
}

#[tokio::test]
async fn test_anonymous_per_caller_dedup_is_unkeyed() {
    let gateway = gateway().await;
    let request =
        RequestContext::new("login", "POST", "/api/login/password").dedup(KeyStrategy::PerCaller);
    let outcome = gateway
        .handle::<UserProfile, _, _, _>(&request, None, || async { "token" })
        .await;
    assert_eq!(outcome, GatewayOutcome::Unkeyed(FingerprintError::MissingCaller));

    let per_path =
        RequestContext::new("login", "POST", "/api/login/password").dedup(KeyStrategy::PerPath);
    let outcome = gateway
        .handle::<UserProfile, _, _, _>(&per_path, None, || async { "token" })
        .await;
    assert_eq!(outcome.completed(), Some("token"));
}

#[tokio::test]
async fn test_session_token_resolves_identity() {
    let gateway = gateway().await;
    gateway.users().bind_session("tok-1", Arc::new(reader()));

    let read = RequestContext::new("user.get", "GET", "/api/user/2");
    assert_eq!(
        gateway.handle_session(&read, Some("tok-1"), || async { 1 }).await,
        GatewayOutcome::Completed(1)
    );
    assert_eq!(
        gateway.handle_session(&read, Some("unknown"), || async { 1 }).await,
        GatewayOutcome::Denied(DenyReason::NoGrantedAuthorities)
    );

    gateway.users().end_session("tok-1");
    assert_eq!(
        gateway.handle_session(&read, Some("tok-1"), || async { 1 }).await,
        GatewayOutcome::Denied(DenyReason::NoGrantedAuthorities)
    );
}

#[tokio::test]
async fn test_refresh_applies_new_policy() {
    let config = policy_config();
    let policy: SecurityPolicy = config.section().unwrap();
    let source = Arc::new(StaticPolicySource::new(policy.clone()));
    let gateway = Gateway::with_source(&config, source.clone(), endpoints()).unwrap();
    gateway.load_permissions(sample_store().permissions().await.unwrap());

    let report = RequestContext::new("report", "GET", "/api/report");
    assert_eq!(
        gateway.handle(&report, Some(&admin()), || async {}).await,
        GatewayOutcome::Denied(DenyReason::DeniedByPolicy)
    );

    let mut opened = policy.clone();
    opened.permit_all.push("/report".into());
    opened.denied_permission = "ROLE_NOBODY".into();
    source.set(opened);
    // Nothing changes until the refresh.
    assert_eq!(
        gateway.handle(&report, Some(&admin()), || async {}).await,
        GatewayOutcome::Denied(DenyReason::DeniedByPolicy)
    );

    gateway.refresh().unwrap();
    assert_eq!(
        gateway.handle::<UserProfile, _, _, _>(&report, None, || async {}).await,
        GatewayOutcome::Completed(())
    );
    assert!(gateway
        .registry()
        .permissions()
        .baseline
        .permissions()
        .contains("ROLE_NOBODY"));

    let mut broken = policy;
    broken.denied_permission = " ".into();
    source.set(broken);
    assert!(gateway.refresh().is_err());
    assert!(gateway.engine().baseline().permissions().contains("ROLE_NOBODY"));
}

#[test]
fn test_from_config_errors() {
    let missing_denied = TollgateConfig::from_yaml_str(
        "tollgate: {security: {base_path: /api}, cache: {url_matcher: {max_size: 8}, users: {max_size: 8}}}",
        "test",
    )
    .unwrap();
    assert!(matches!(
        Gateway::from_config(&missing_denied, endpoints()),
        Err(GatewayError::Policy(_))
    ));

    let zero_cache = TollgateConfig::from_yaml_str(
        "tollgate: {security: {denied_permission: ROLE_DENIED}, cache: {url_matcher: {max_size: 0}, users: {max_size: 8}}}",
        "test",
    )
    .unwrap();
    assert!(matches!(
        Gateway::from_config(&zero_cache, endpoints()),
        Err(GatewayError::Config(_))
    ));
}

#[tokio::test]
async fn test_refresh_rereads_policy_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tollgate.yaml");
    std::fs::write(&path, tollgate_test::policy_yaml()).unwrap();

    let config = TollgateConfig::load_from_dir(dir.path(), "test").unwrap();
    let source = Arc::new(ConfigPolicySource::new(dir.path(), "test"));
    let gateway = Gateway::with_source(&config, source, endpoints()).unwrap();

    let health = RequestContext::new("health", "GET", "/api/health");
    let report = RequestContext::new("report", "GET", "/api/report");
    assert!(gateway
        .handle::<UserProfile, _, _, _>(&health, None, || async {})
        .await
        .completed()
        .is_some());
    assert_eq!(
        gateway.handle::<UserProfile, _, _, _>(&report, None, || async {}).await,
        GatewayOutcome::Denied(DenyReason::NoGrantedAuthorities)
    );

    let edited = tollgate_test::policy_yaml().replace("- /health", "- /report");
    std::fs::write(&path, edited).unwrap();
    gateway.refresh().unwrap();
    assert_eq!(
        gateway.handle::<UserProfile, _, _, _>(&report, None, || async {}).await,
        GatewayOutcome::Completed(())
    );
    assert_eq!(
        gateway.handle::<UserProfile, _, _, _>(&health, None, || async {}).await,
        GatewayOutcome::Denied(DenyReason::NoGrantedAuthorities)
    );

    std::fs::remove_file(&path).unwrap();
    dir.close().unwrap();
    assert!(matches!(gateway.refresh(), Err(PolicyLoadError::Unreadable(_))));
    assert_eq!(
        gateway.handle::<UserProfile, _, _, _>(&report, None, || async {}).await,
        GatewayOutcome::Completed(())
    );
}
