use tollgate_core::ConfigError;

use crate::profile::MethodCategory;

/// The policy source could not produce a usable policy.
///
/// Fatal: initialization stops and a failed refresh leaves the previous
/// policy in place.
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyLoadError {
    /// The source could not be read at all (missing directory, I/O error, bad YAML).
    Unreadable(String),

    /// The source was read but its content is not a valid policy.
    Malformed(String),

    /// A required key is missing or has the wrong type.
    Config(ConfigError),
}

impl std::fmt::Display for PolicyLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolicyLoadError::Unreadable(msg) => write!(f, "Policy source unreadable: {msg}"),
            PolicyLoadError::Malformed(msg) => write!(f, "Malformed policy: {msg}"),
            PolicyLoadError::Config(err) => write!(f, "Policy configuration error: {err}"),
        }
    }
}

impl std::error::Error for PolicyLoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PolicyLoadError::Config(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ConfigError> for PolicyLoadError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Load(msg) => PolicyLoadError::Unreadable(msg),
            other => PolicyLoadError::Config(other),
        }
    }
}

/// Failure reported by an external data store (user directory or permission store).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreError(pub String);

impl StoreError {
    pub fn new(msg: impl Into<String>) -> Self {
        StoreError(msg.into())
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Store error: {}", self.0)
    }
}

impl std::error::Error for StoreError {}

/// Errors raised while resolving or refreshing user profiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileError {
    /// No user matches the id or name.
    NotFound(String),

    /// The user exists but has been disabled.
    Disabled(String),

    /// The user's role does not exist.
    MissingRole { user: String, role_id: u64 },

    /// Some of the requested ids or names do not exist.
    UnknownIds(Vec<String>),

    /// The user directory failed.
    Directory(String),
}

impl std::fmt::Display for ProfileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProfileError::NotFound(who) => write!(f, "User not found: {who}"),
            ProfileError::Disabled(who) => write!(f, "User is disabled: {who}"),
            ProfileError::MissingRole { user, role_id } => {
                write!(f, "Role {role_id} of user {user} does not exist")
            }
            ProfileError::UnknownIds(ids) => write!(f, "Unknown users: {}", ids.join(", ")),
            ProfileError::Directory(msg) => write!(f, "User directory error: {msg}"),
        }
    }
}

impl std::error::Error for ProfileError {}

impl From<StoreError> for ProfileError {
    fn from(err: StoreError) -> Self {
        ProfileError::Directory(err.0)
    }
}

/// Errors raised by permission and role administration.
#[derive(Debug, Clone, PartialEq)]
pub enum AdminError {
    /// Another permission already uses this name.
    DuplicateName(String),

    /// The URL does not correspond to a registered endpoint for the method category.
    UnregisteredUrl { category: MethodCategory, url: String },

    /// The permission or role does not exist.
    NotFound(String),

    /// The request itself is inconsistent (empty id list, partial update, ...).
    InvalidRequest(String),

    /// The permission store failed.
    Store(String),

    /// Profiles of affected users could not be refreshed.
    Profile(ProfileError),

    /// The change was persisted but the policy could not be reloaded.
    Policy(PolicyLoadError),
}

impl std::fmt::Display for AdminError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdminError::DuplicateName(name) => write!(f, "Permission name already in use: {name}"),
            AdminError::UnregisteredUrl { category, url } => {
                write!(f, "No {} endpoint registered for {url}", category.as_str())
            }
            AdminError::NotFound(what) => write!(f, "Not found: {what}"),
            AdminError::InvalidRequest(msg) => write!(f, "Invalid request: {msg}"),
            AdminError::Store(msg) => write!(f, "Permission store error: {msg}"),
            AdminError::Profile(err) => write!(f, "Profile refresh failed: {err}"),
            AdminError::Policy(err) => write!(f, "Policy reload failed: {err}"),
        }
    }
}

impl std::error::Error for AdminError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AdminError::Profile(err) => Some(err),
            AdminError::Policy(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for AdminError {
    fn from(err: StoreError) -> Self {
        AdminError::Store(err.0)
    }
}

impl From<ProfileError> for AdminError {
    fn from(err: ProfileError) -> Self {
        AdminError::Profile(err)
    }
}

impl From<PolicyLoadError> for AdminError {
    fn from(err: PolicyLoadError) -> Self {
        AdminError::Policy(err)
    }
}
