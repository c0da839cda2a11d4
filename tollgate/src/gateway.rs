use std::future::Future;
use std::sync::Arc;

use tollgate_cache::{CacheError, CacheSettings};
use tollgate_core::{ConfigError, Guard, GuardContext, Identity, TollgateConfig};
use tollgate_dedup::{DedupLock, Fingerprint, FingerprintError, KeyStrategy, LockOutcome};
use tollgate_security::{
    AuthorizationEngine, AuthorizationGuard, DenyReason, Endpoint, MultiIndexUserCache,
    PermissionInfo, PolicyLoadError, PolicySource, ResourceRegistry, StaticPolicySource,
    UserCacheSettings,
};

/// Error building a [`Gateway`] from configuration.
#[derive(Debug)]
pub enum GatewayError {
    Config(ConfigError),
    Cache(CacheError),
    Policy(PolicyLoadError),
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayError::Config(err) => write!(f, "Gateway configuration error: {err}"),
            GatewayError::Cache(err) => write!(f, "Gateway cache error: {err}"),
            GatewayError::Policy(err) => write!(f, "Gateway policy error: {err}"),
        }
    }
}

impl std::error::Error for GatewayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GatewayError::Config(err) => Some(err),
            GatewayError::Cache(err) => Some(err),
            GatewayError::Policy(err) => Some(err),
        }
    }
}

impl From<ConfigError> for GatewayError {
    fn from(err: ConfigError) -> Self {
        GatewayError::Config(err)
    }
}

impl From<CacheError> for GatewayError {
    fn from(err: CacheError) -> Self {
        GatewayError::Cache(err)
    }
}

impl From<PolicyLoadError> for GatewayError {
    fn from(err: PolicyLoadError) -> Self {
        GatewayError::Policy(err)
    }
}

/// What the gateway needs to know about an incoming request.
#[derive(Debug, Clone)]
pub struct RequestContext<'a> {
    pub operation: &'static str,
    pub method: &'a str,
    /// Full request path, base path included.
    pub path: &'a str,
    /// Set for idempotency-sensitive endpoints; the strategy derives the
    /// request fingerprint.
    pub idempotent: Option<KeyStrategy>,
}

impl<'a> RequestContext<'a> {
    pub fn new(operation: &'static str, method: &'a str, path: &'a str) -> Self {
        Self {
            operation,
            method,
            path,
            idempotent: None,
        }
    }

    /// Run the handler under the dedup lock, keyed by `strategy`.
    pub fn dedup(mut self, strategy: KeyStrategy) -> Self {
        self.idempotent = Some(strategy);
        self
    }
}

/// Result of pushing one request through the gateway.
#[derive(Debug, PartialEq)]
pub enum GatewayOutcome<T> {
    Completed(T),
    Denied(DenyReason),
    Duplicate(Fingerprint),
    Unkeyed(FingerprintError),
}

impl<T> GatewayOutcome<T> {
    pub fn completed(self) -> Option<T> {
        match self {
            GatewayOutcome::Completed(value) => Some(value),
            _ => None,
        }
    }
}

/// Per-request control flow: authorization first, then the dedup lock for
/// idempotency-sensitive requests, then the handler.
#[derive(Clone)]
pub struct Gateway {
    engine: Arc<AuthorizationEngine>,
    registry: Arc<ResourceRegistry>,
    guard: AuthorizationGuard,
    lock: DedupLock,
    users: Arc<MultiIndexUserCache>,
}

impl Gateway {
    pub fn new(
        engine: Arc<AuthorizationEngine>,
        registry: Arc<ResourceRegistry>,
        lock: DedupLock,
        users: Arc<MultiIndexUserCache>,
    ) -> Self {
        let guard = AuthorizationGuard::new(engine.clone(), registry.clone());
        Self {
            engine,
            registry,
            guard,
            lock,
            users,
        }
    }

    /// Build every component from configuration, with the policy fixed to
    /// what `config` holds.
    pub fn from_config(config: &TollgateConfig, endpoints: Vec<Endpoint>) -> Result<Self, GatewayError> {
        let source = StaticPolicySource::from_config(config)?;
        Self::with_source(config, Arc::new(source), endpoints)
    }

    /// Like [`Gateway::from_config`] but the policy comes from `source`, so
    /// [`Gateway::refresh`] picks up changes made there.
    pub fn with_source(
        config: &TollgateConfig,
        source: Arc<dyn PolicySource>,
        endpoints: Vec<Endpoint>,
    ) -> Result<Self, GatewayError> {
        let policy = source.load()?;
        let matcher_settings = CacheSettings::from_config(config, "url_matcher")?;
        let engine = AuthorizationEngine::from_source(source, matcher_settings)?;
        let registry = ResourceRegistry::new(
            policy.base_path.clone(),
            endpoints,
            (*engine.baseline()).clone(),
        );
        let users = MultiIndexUserCache::new(UserCacheSettings::from_config(config)?)?;
        let lock = DedupLock::from_config(config)?;
        Ok(Self::new(
            Arc::new(engine),
            Arc::new(registry),
            lock,
            Arc::new(users),
        ))
    }

    /// Authorize the request, then run `op`, under the dedup lock when the
    /// request is idempotency-sensitive.
    pub async fn handle<I, T, F, Fut>(
        &self,
        request: &RequestContext<'_>,
        identity: Option<&I>,
        op: F,
    ) -> GatewayOutcome<T>
    where
        I: Identity,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let ctx = GuardContext {
            operation: request.operation,
            method: request.method,
            path: request.path,
            identity,
        };
        if let Err(reason) = self.guard.check(&ctx).await {
            return GatewayOutcome::Denied(reason);
        }
        let Some(strategy) = request.idempotent else {
            return GatewayOutcome::Completed(op().await);
        };
        let key = strategy.derive(
            request.operation,
            identity.map(|i| i.sub()),
            Some(request.path),
        );
        match self.lock.wrap(key, op).await {
            LockOutcome::Completed(value) => GatewayOutcome::Completed(value),
            LockOutcome::Duplicate(fingerprint) => GatewayOutcome::Duplicate(fingerprint),
            LockOutcome::Unkeyed(err) => GatewayOutcome::Unkeyed(err),
        }
    }

    /// [`Gateway::handle`] with the caller resolved from a session token. An
    /// unknown or absent token is handled as an anonymous request.
    pub async fn handle_session<T, F, Fut>(
        &self,
        request: &RequestContext<'_>,
        token: Option<&str>,
        op: F,
    ) -> GatewayOutcome<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let profile = token.and_then(|token| self.users.get_by_token(token));
        self.handle(request, profile.as_deref(), op).await
    }

    /// Install the permission table the registry resolves required
    /// permissions from.
    pub fn load_permissions(&self, permissions: Vec<PermissionInfo>) {
        self.registry
            .reload(permissions, (*self.engine.baseline()).clone());
    }

    /// Reload the policy and carry the new baseline into the registry. On
    /// failure nothing changes.
    pub fn refresh(&self) -> Result<(), PolicyLoadError> {
        self.engine.refresh()?;
        let table = self.registry.permissions();
        self.registry
            .reload(table.permissions.clone(), (*self.engine.baseline()).clone());
        Ok(())
    }

    pub fn engine(&self) -> &Arc<AuthorizationEngine> {
        &self.engine
    }

    pub fn registry(&self) -> &Arc<ResourceRegistry> {
        &self.registry
    }

    pub fn lock(&self) -> &DedupLock {
        &self.lock
    }

    pub fn users(&self) -> &Arc<MultiIndexUserCache> {
        &self.users
    }
}

