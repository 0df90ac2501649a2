//! Backend features and their registrations

use std::sync::Arc;

use crate::deps::ServiceInstance;
use crate::error::Result;
use crate::init::InitDescriptor;
use crate::refs::ExtensionPointRef;
use crate::service::ServiceFactory;

/// The only backend feature version the initializer accepts
pub const FEATURE_VERSION: &str = "v1";

/// A unit of registration handed to the backend initializer
#[derive(Debug, Clone)]
pub enum Feature {
    /// A raw service factory, added straight to the service registry
    Service(ServiceFactory),
    /// A plugin or module bundle
    Backend(BackendFeature),
}

impl Feature {
    /// Short description used in log lines
    pub fn describe(&self) -> String {
        match self {
            Self::Service(factory) => format!("service factory for '{}'", factory.service().id()),
            Self::Backend(feature) => feature.description().to_string(),
        }
    }
}

impl From<ServiceFactory> for Feature {
    fn from(factory: ServiceFactory) -> Self {
        Self::Service(factory)
    }
}

impl From<BackendFeature> for Feature {
    fn from(feature: BackendFeature) -> Self {
        Self::Backend(feature)
    }
}

/// Produces the registrations of a backend feature
pub type RegistrationsFn = Arc<dyn Fn() -> Result<Vec<Registration>> + Send + Sync>;

/// A plugin, a module, or any bundle of registrations
#[derive(Clone)]
pub struct BackendFeature {
    version: String,
    description: String,
    registrations: RegistrationsFn,
}

impl BackendFeature {
    /// Create a feature from its raw parts
    ///
    /// Plugin authors normally go through
    /// [`create_backend_plugin`](crate::plugin::create_backend_plugin) or
    /// [`create_backend_module`](crate::plugin::create_backend_module); this
    /// constructor exists for loaders that build features from other sources.
    pub fn from_parts<F>(
        version: impl Into<String>,
        description: impl Into<String>,
        registrations: F,
    ) -> Self
    where
        F: Fn() -> Result<Vec<Registration>> + Send + Sync + 'static,
    {
        Self {
            version: version.into(),
            description: description.into(),
            registrations: Arc::new(registrations),
        }
    }

    /// Feature format version
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Short description, e.g. `plugin 'catalog'`
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Enumerate the feature's registrations
    pub fn registrations(&self) -> Result<Vec<Registration>> {
        (self.registrations)()
    }
}

impl std::fmt::Debug for BackendFeature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendFeature")
            .field("version", &self.version)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// One init unit of a plugin or module
#[derive(Debug, Clone)]
pub struct Registration {
    /// Plugin the registration belongs to
    pub plugin_id: String,
    /// Module id; `None` for plugin-level registrations
    pub module_id: Option<String>,
    /// Extension points provided, with their implementation objects
    pub extension_points: Vec<(ExtensionPointRef, ServiceInstance)>,
    /// Dependencies and init function
    pub init: InitDescriptor,
}

impl Registration {
    /// Whether this is a plugin-level registration
    pub fn is_plugin(&self) -> bool {
        self.module_id.is_none()
    }
}
