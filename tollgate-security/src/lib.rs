pub mod admin;
pub mod decision;
pub mod directory;
pub mod error;
pub mod guards;
pub mod matcher;
pub mod pattern;
pub mod policy;
pub mod profile;
pub mod registry;
pub mod service;
pub mod user_cache;

pub use admin::{AuthorityAdmin, NewPermission, PermissionStore, PermissionUpdate, RolePermissionChange};
pub use decision::{AuthorizationEngine, Decision, DenyReason, Grant};
pub use directory::UserDirectory;
pub use error::{AdminError, PolicyLoadError, ProfileError, StoreError};
pub use guards::AuthorizationGuard;
pub use matcher::UrlAccessMatcher;
pub use pattern::PathPattern;
pub use policy::{ConfigPolicySource, DeniedBaseline, PolicySource, SecurityPolicy, StaticPolicySource};
pub use profile::{MethodCategory, PermissionInfo, RoleInfo, UserProfile, UserRecord, UserStatus};
pub use registry::{Endpoint, ResourceRegistry};
pub use service::ProfileService;
pub use user_cache::{MultiIndexUserCache, UserCacheSettings};
