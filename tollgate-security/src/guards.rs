use std::sync::Arc;

use tollgate_core::{Guard, GuardContext, Identity};

use crate::decision::{AuthorizationEngine, Decision, DenyReason, Grant};
use crate::registry::ResourceRegistry;

/// Guard running the authorization decision for the request in the context.
///
/// Exempt paths pass without consulting the registry. Otherwise the
/// required permissions come from the [`ResourceRegistry`] and the caller's
/// authorities from the identity (none when anonymous).
#[derive(Clone)]
pub struct AuthorizationGuard {
    engine: Arc<AuthorizationEngine>,
    registry: Arc<ResourceRegistry>,
}

impl AuthorizationGuard {
    pub fn new(engine: Arc<AuthorizationEngine>, registry: Arc<ResourceRegistry>) -> Self {
        Self { engine, registry }
    }

    /// Synchronous form of [`Guard::check`].
    pub fn decide<I: Identity>(&self, ctx: &GuardContext<'_, I>) -> Decision {
        if !self.engine.requires_verification(ctx.path) {
            return Decision::Allow(Grant::Exempt);
        }
        let required = self.registry.required_permissions(ctx.method, ctx.path);
        self.engine.decide(&ctx.authorities(), ctx.path, &required)
    }
}

impl<I: Identity> Guard<I> for AuthorizationGuard {
    type Rejection = DenyReason;

    fn check(
        &self,
        ctx: &GuardContext<'_, I>,
    ) -> impl std::future::Future<Output = Result<(), Self::Rejection>> + Send {
        let result = match self.decide(ctx) {
            Decision::Allow(_) => Ok(()),
            Decision::Deny(reason) => {
                tracing::debug!(
                    operation = ctx.operation,
                    caller = ctx.identity_sub().unwrap_or("anonymous"),
                    reason = reason.code(),
                    "request rejected"
                );
                Err(reason)
            }
        };
        std::future::ready(result)
    }
}
