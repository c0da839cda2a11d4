use std::fmt;

/// Identifies one logical request for deduplication.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(key: impl Into<String>) -> Self {
        Fingerprint(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The context needed to derive a fingerprint was not available.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FingerprintError {
    MissingCaller,
    MissingPath,
}

impl fmt::Display for FingerprintError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FingerprintError::MissingCaller => write!(f, "no resolved caller to derive a request key from"),
            FingerprintError::MissingPath => write!(f, "no request path to derive a request key from"),
        }
    }
}

impl std::error::Error for FingerprintError {}

/// Which request attributes, besides the operation name, make up a fingerprint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KeyStrategy {
    /// One in-flight call per operation and caller.
    #[default]
    PerCaller,
    /// One in-flight call per operation and path, whoever the caller.
    PerPath,
    /// One in-flight call per operation, caller and path.
    PerCallerAndPath,
}

impl KeyStrategy {
    /// Derive `operation:caller`, `operation:path` or `operation:caller:path`.
    pub fn derive(
        &self,
        operation: &str,
        caller: Option<&str>,
        path: Option<&str>,
    ) -> Result<Fingerprint, FingerprintError> {
        let caller = || caller.ok_or(FingerprintError::MissingCaller);
        let path = || path.ok_or(FingerprintError::MissingPath);
        let key = match self {
            KeyStrategy::PerCaller => format!("{operation}:{}", caller()?),
            KeyStrategy::PerPath => format!("{operation}:{}", path()?),
            KeyStrategy::PerCallerAndPath => format!("{operation}:{}:{}", caller()?, path()?),
        };
        Ok(Fingerprint(key))
    }
}
