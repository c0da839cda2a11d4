//! Tollgate: the authorization and idempotency layer in front of an
//! application's endpoints.
//!
//! For each request the [`Gateway`] decides whether the path needs
//! authorization, evaluates the caller's authorities against the permissions
//! the resource requires, and, for idempotency-sensitive operations, makes sure
//! only one copy of a logical request runs at a time.
//!
//! ```ignore
//! use tollgate::prelude::*;
//!
//! let config = TollgateConfig::load("prod")?;
//! let gateway = Gateway::from_config(&config, endpoints)?;
//! let request = RequestContext::new("role.update", "POST", "/api/role/permission")
//!     .dedup(KeyStrategy::PerCaller);
//! match gateway.handle(&request, Some(&profile), || update_role()).await {
//!     GatewayOutcome::Completed(result) => result,
//!     GatewayOutcome::Denied(reason) => forbidden(reason),
//!     GatewayOutcome::Duplicate(_) => conflict(),
//!     GatewayOutcome::Unkeyed(err) => bad_request(err),
//! }
//! ```
//!
//! # Feature flags
//!
//! | Feature    | Default | Crate                |
//! |------------|---------|----------------------|
//! | `security` | **yes** | `tollgate-security`  |
//! | `dedup`    | **yes** | `tollgate-dedup`     |
//!
//! [`Gateway`] needs both.

pub extern crate tollgate_cache;
pub extern crate tollgate_core;

pub use tollgate_core::*;

#[cfg(feature = "security")]
pub use tollgate_security;

#[cfg(feature = "dedup")]
pub use tollgate_dedup;

#[cfg(all(feature = "security", feature = "dedup"))]
pub mod gateway;

#[cfg(all(feature = "security", feature = "dedup"))]
pub use gateway::{Gateway, GatewayError, GatewayOutcome, RequestContext};

pub mod prelude {
    //! Re-exports of the most commonly used types.
    pub use tollgate_cache::{BoundedCache, CacheSettings};
    pub use tollgate_core::prelude::*;

    #[cfg(feature = "security")]
    pub use tollgate_security::{
        AuthorizationEngine, Decision, DenyReason, Endpoint, MethodCategory, MultiIndexUserCache,
        ProfileService, ResourceRegistry, UrlAccessMatcher, UserProfile,
    };

    #[cfg(feature = "dedup")]
    pub use tollgate_dedup::{DedupLock, Fingerprint, KeyStrategy, LockOutcome, RepeatLock};

    #[cfg(all(feature = "security", feature = "dedup"))]
    pub use crate::gateway::{Gateway, GatewayOutcome, RequestContext};
}
