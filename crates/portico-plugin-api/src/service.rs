//! Service factories
//!
//! A [`ServiceFactory`] tells the registry how to build one service. The
//! registry decides when: lazily on first use, or eagerly at startup when the
//! factory is marked eager.
//!
//! ```ignore
//! let factory = ServiceFactory::builder(ServiceRef::root("acme.clock"))
//!     .dependency("logger", core_services::logger())
//!     .eager()
//!     .factory(|ctx| async move { Ok(SystemClock::new(ctx.plugin_id())) });
//! ```

use std::any::Any;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::deps::{ResolvedDeps, ServiceInstance, into_instance};
use crate::error::Result;
use crate::refs::{ServiceRef, ServiceScope};

/// What a factory function receives
#[derive(Debug, Clone)]
pub struct ServiceContext {
    plugin_id: String,
    deps: ResolvedDeps,
}

impl ServiceContext {
    /// Create a factory context
    pub fn new(plugin_id: impl Into<String>, deps: ResolvedDeps) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            deps,
        }
    }

    /// Plugin the instance is built for (`root` for root-scoped services)
    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    /// Resolved factory dependencies
    pub fn deps(&self) -> &ResolvedDeps {
        &self.deps
    }
}

/// Boxed factory function
pub type FactoryFn =
    Arc<dyn Fn(ServiceContext) -> BoxFuture<'static, Result<ServiceInstance>> + Send + Sync>;

/// Recipe for building one service
#[derive(Clone)]
pub struct ServiceFactory {
    service: ServiceRef,
    deps: BTreeMap<String, ServiceRef>,
    eager: bool,
    factory: FactoryFn,
}

impl ServiceFactory {
    /// Start building a factory for `service`
    pub fn builder(service: ServiceRef) -> ServiceFactoryBuilder {
        ServiceFactoryBuilder {
            service,
            deps: BTreeMap::new(),
            eager: false,
        }
    }

    /// Service this factory provides
    pub fn service(&self) -> &ServiceRef {
        &self.service
    }

    /// Scope of the provided service
    pub fn scope(&self) -> ServiceScope {
        self.service.scope()
    }

    /// Declared dependencies by name
    pub fn deps(&self) -> &BTreeMap<String, ServiceRef> {
        &self.deps
    }

    /// Whether the service is built at startup
    pub fn is_eager(&self) -> bool {
        self.eager
    }

    /// Run the factory function
    pub fn create(&self, ctx: ServiceContext) -> BoxFuture<'static, Result<ServiceInstance>> {
        (self.factory)(ctx)
    }
}

impl std::fmt::Debug for ServiceFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceFactory")
            .field("service", &self.service)
            .field("deps", &self.deps)
            .field("eager", &self.eager)
            .finish_non_exhaustive()
    }
}

/// Builder returned by [`ServiceFactory::builder`]
#[derive(Debug)]
pub struct ServiceFactoryBuilder {
    service: ServiceRef,
    deps: BTreeMap<String, ServiceRef>,
    eager: bool,
}

impl ServiceFactoryBuilder {
    /// Declare a dependency on another service
    pub fn dependency(mut self, name: impl Into<String>, service: ServiceRef) -> Self {
        self.deps.insert(name.into(), service);
        self
    }

    /// Build the service at startup instead of on first use
    pub fn eager(mut self) -> Self {
        self.eager = true;
        self
    }

    /// Finish with a factory producing a concrete value
    pub fn factory<T, F, Fut>(self, f: F) -> ServiceFactory
    where
        T: Any + Send + Sync,
        F: Fn(ServiceContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let factory: FactoryFn = Arc::new(move |ctx| f(ctx).map(|r| r.map(into_instance)).boxed());
        ServiceFactory {
            service: self.service,
            deps: self.deps,
            eager: self.eager,
            factory,
        }
    }
}
