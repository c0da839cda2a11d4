use std::collections::BTreeSet;

/// Trait representing a resolved caller (user, service account, etc.).
///
/// Token verification happens upstream; by the time a request reaches the
/// gateway the identity only needs to expose who it is and what it holds.
#[diagnostic::on_unimplemented(
    message = "`{Self}` does not implement `Identity`",
    label = "this type cannot be used as an identity",
    note = "implement `Identity` for your type, or use `UserProfile` from `tollgate-security` which implements it"
)]
pub trait Identity: Send + Sync {
    /// Unique subject identifier (the user name for cached profiles).
    fn sub(&self) -> &str;

    /// Authorities (permission identifiers) granted to this identity.
    fn authorities(&self) -> BTreeSet<String>;
}

/// Sentinel type representing the absence of an identity.
pub struct NoIdentity;

impl Identity for NoIdentity {
    fn sub(&self) -> &str {
        ""
    }

    fn authorities(&self) -> BTreeSet<String> {
        BTreeSet::new()
    }
}

/// Context available to guards before the protected operation runs.
pub struct GuardContext<'a, I: Identity> {
    /// Logical operation name (e.g. `"role.update_permission"`).
    pub operation: &'static str,
    /// HTTP method of the request (`"GET"`, `"POST"`, ...).
    pub method: &'a str,
    /// Request path including the base path.
    pub path: &'a str,
    pub identity: Option<&'a I>,
}

impl<'a, I: Identity> GuardContext<'a, I> {
    /// Convenience accessor for the identity subject.
    pub fn identity_sub(&self) -> Option<&str> {
        self.identity.map(|i| i.sub())
    }

    /// Authorities of the identity, empty when the request is anonymous.
    pub fn authorities(&self) -> BTreeSet<String> {
        self.identity.map(|i| i.authorities()).unwrap_or_default()
    }
}

/// Check that runs before an operation.
/// Returns `Ok(())` to proceed, `Err(Self::Rejection)` to short-circuit.
///
/// Guards are the admission counterpart of [`Interceptor`](crate::Interceptor),
/// which wraps the execution itself.
#[diagnostic::on_unimplemented(
    message = "`{Self}` does not implement `Guard<{I}>`",
    label = "this type cannot be used as a guard",
    note = "implement `Guard<I>` for your type"
)]
pub trait Guard<I: Identity>: Send + Sync {
    type Rejection: Send;

    fn check(
        &self,
        ctx: &GuardContext<'_, I>,
    ) -> impl std::future::Future<Output = Result<(), Self::Rejection>> + Send;
}
