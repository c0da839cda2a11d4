use std::collections::BTreeSet;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::pattern::PathPattern;
use crate::policy::DeniedBaseline;
use crate::profile::{MethodCategory, PermissionInfo};

/// A route the application serves, relative to the base path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub method: MethodCategory,
    pub pattern: PathPattern,
}

impl Endpoint {
    pub fn new(method: MethodCategory, pattern: impl Into<PathPattern>) -> Self {
        Self {
            method,
            pattern: pattern.into(),
        }
    }

    pub fn get(pattern: &str) -> Self {
        Self::new(MethodCategory::Get, pattern)
    }

    pub fn post(pattern: &str) -> Self {
        Self::new(MethodCategory::Post, pattern)
    }

    pub fn put(pattern: &str) -> Self {
        Self::new(MethodCategory::Put, pattern)
    }

    pub fn delete(pattern: &str) -> Self {
        Self::new(MethodCategory::Delete, pattern)
    }
}

/// Permissions currently in force plus the baseline returned for unguarded resources.
#[derive(Debug, Default)]
pub struct PermissionTable {
    pub permissions: Vec<PermissionInfo>,
    pub baseline: DeniedBaseline,
}

/// Maps a request to the permissions that guard it.
///
/// Endpoints are fixed at construction. The permission table is swapped
/// wholesale by [`reload`](Self::reload).
pub struct ResourceRegistry {
    base_path: String,
    endpoints: Vec<Endpoint>,
    table: ArcSwap<PermissionTable>,
}

impl ResourceRegistry {
    pub fn new(base_path: impl Into<String>, endpoints: Vec<Endpoint>, baseline: DeniedBaseline) -> Self {
        Self {
            base_path: base_path.into(),
            endpoints,
            table: ArcSwap::from_pointee(PermissionTable {
                permissions: Vec::new(),
                baseline,
            }),
        }
    }

    /// Permission names guarding `method path`, where `path` includes the
    /// base path.
    ///
    /// A resource no permission covers requires the denied baseline, so it
    /// is refused to everyone.
    pub fn required_permissions(&self, method: &str, path: &str) -> BTreeSet<String> {
        let relative = self.strip_base(path);
        let table = self.table.load();
        let routes: Vec<&str> = self
            .endpoints
            .iter()
            .filter(|e| e.method.covers(method) && e.pattern.matches(relative))
            .map(|e| e.pattern.as_str())
            .collect();
        let required: BTreeSet<String> = table
            .permissions
            .iter()
            .filter(|p| p.category.covers(method) && routes.contains(&p.url.as_str()))
            .map(|p| p.name.clone())
            .collect();
        if required.is_empty() {
            table.baseline.permissions().clone()
        } else {
            required
        }
    }

    /// Whether `url` is a registered endpoint pattern for `category`.
    /// `ALL` accepts an endpoint of any method.
    pub fn is_registered(&self, category: MethodCategory, url: &str) -> bool {
        self.endpoints
            .iter()
            .any(|e| e.pattern.as_str() == url && (category.includes(e.method) || e.method.includes(category)))
    }

    /// Swap in a new permission table.
    pub fn reload(&self, permissions: Vec<PermissionInfo>, baseline: DeniedBaseline) {
        let count = permissions.len();
        self.table.store(Arc::new(PermissionTable {
            permissions,
            baseline,
        }));
        tracing::debug!(permissions = count, "permission table reloaded");
    }

    pub fn permissions(&self) -> Arc<PermissionTable> {
        self.table.load_full()
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    fn strip_base<'p>(&self, path: &'p str) -> &'p str {
        if self.base_path.is_empty() {
            return path;
        }
        match path.strip_prefix(self.base_path.as_str()) {
            Some(rest) if rest.is_empty() => "/",
            Some(rest) if rest.starts_with('/') => rest,
            _ => path,
        }
    }
}
