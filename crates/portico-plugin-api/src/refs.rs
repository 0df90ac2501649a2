//! Service and extension point references
//!
//! References are plain identifiers. Two references with the same id are the
//! same reference, regardless of where they were constructed.

use std::fmt;

/// Scope a service instance lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceScope {
    /// One instance for the whole process
    Root,
    /// One instance per plugin id
    Plugin,
}

impl fmt::Display for ServiceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => write!(f, "root"),
            Self::Plugin => write!(f, "plugin"),
        }
    }
}

/// Reference to a cross-plugin service resolved through the service registry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceRef {
    id: String,
    scope: ServiceScope,
}

impl ServiceRef {
    /// Create a reference to a root-scoped service
    pub fn root(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            scope: ServiceScope::Root,
        }
    }

    /// Create a reference to a plugin-scoped service
    pub fn plugin(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            scope: ServiceScope::Plugin,
        }
    }

    /// Service id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Scope of the service
    pub fn scope(&self) -> ServiceScope {
        self.scope
    }
}

impl fmt::Display for ServiceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "serviceRef{{{}}}", self.id)
    }
}

/// Reference to a contract a plugin exposes to its own modules
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExtensionPointRef {
    id: String,
}

impl ExtensionPointRef {
    /// Create an extension point reference
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// Extension point id
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for ExtensionPointRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "extensionPoint{{{}}}", self.id)
    }
}

/// Anything an init function may declare as a dependency
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DependencyRef {
    /// A registry service
    Service(ServiceRef),
    /// An extension point of the same plugin
    ExtensionPoint(ExtensionPointRef),
}

impl DependencyRef {
    /// Identifier shared by services and extension points
    pub fn id(&self) -> &str {
        match self {
            Self::Service(service) => service.id(),
            Self::ExtensionPoint(extension_point) => extension_point.id(),
        }
    }
}

impl fmt::Display for DependencyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Service(service) => service.fmt(f),
            Self::ExtensionPoint(extension_point) => extension_point.fmt(f),
        }
    }
}

impl From<ServiceRef> for DependencyRef {
    fn from(service: ServiceRef) -> Self {
        Self::Service(service)
    }
}

impl From<&ServiceRef> for DependencyRef {
    fn from(service: &ServiceRef) -> Self {
        Self::Service(service.clone())
    }
}

impl From<ExtensionPointRef> for DependencyRef {
    fn from(extension_point: ExtensionPointRef) -> Self {
        Self::ExtensionPoint(extension_point)
    }
}

impl From<&ExtensionPointRef> for DependencyRef {
    fn from(extension_point: &ExtensionPointRef) -> Self {
        Self::ExtensionPoint(extension_point.clone())
    }
}
