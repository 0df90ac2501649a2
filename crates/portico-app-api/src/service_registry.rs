//! Service Registry
//!
//! Owns the service factories and memoizes the instances they produce.
//!
//! ```text
//!  get(ref, plugin) ──▶ factory scope ──▶ instance key
//!                         root    →  (id, "root")
//!                         plugin  →  (id, plugin)
//!                                          │
//!                             OnceCell per key (at-most-once)
//! ```

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, try_join_all};
use portico_plugin_api::core_services::{PLUGIN_METADATA_ID, PluginMetadata};
use portico_plugin_api::{
    Error, ResolvedDeps, Result, ServiceContext, ServiceFactory, ServiceInstance, ServiceRef,
    ServiceScope, into_instance,
};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::constants::ROOT_PLUGIN_ID;
use crate::dependency_graph::{DependencyGraph, DependencyNode};

type InstanceKey = (String, String);

/// Registry of service factories with per-scope instance caching
pub struct ServiceRegistry {
    /// Factories by service id
    factories: DashMap<String, Arc<ServiceFactory>>,
    /// One memoizing cell per (service id, scope key)
    instances: DashMap<InstanceKey, Arc<OnceCell<ServiceInstance>>>,
}

impl ServiceRegistry {
    /// Create a registry from an initial set of factories
    pub fn create<I>(factories: I) -> Result<Self>
    where
        I: IntoIterator<Item = ServiceFactory>,
    {
        let registry = Self {
            factories: DashMap::new(),
            instances: DashMap::new(),
        };
        for factory in factories {
            registry.add(factory)?;
        }
        Ok(registry)
    }

    /// Register one more factory
    pub fn add(&self, factory: ServiceFactory) -> Result<()> {
        let service_id = factory.service().id().to_string();

        if self.is_instantiated(&service_id) {
            return Err(Error::service_instantiation(
                &service_id,
                ROOT_PLUGIN_ID,
                "unable to set service factory, service has already been instantiated",
            ));
        }

        match self.factories.entry(service_id) {
            Entry::Occupied(entry) => Err(Error::DuplicateService {
                service_id: entry.key().clone(),
            }),
            Entry::Vacant(entry) => {
                debug!(service = %entry.key(), scope = %factory.scope(), "Registered service factory");
                entry.insert(Arc::new(factory));
                Ok(())
            }
        }
    }

    /// Whether a factory is registered for `service_id`
    pub fn has(&self, service_id: &str) -> bool {
        self.factories.contains_key(service_id)
    }

    /// Ids of every registered service, sorted
    pub fn service_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.factories.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Get the instance of `service` for the scope of `plugin_id`
    ///
    /// Returns `Ok(None)` when no factory is registered; whether that is fatal
    /// is up to the caller.
    pub fn get<'a>(
        &'a self,
        service: &'a ServiceRef,
        plugin_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<ServiceInstance>>> {
        async move {
            let Some(factory) = self.factory(service.id()) else {
                if service.id() == PLUGIN_METADATA_ID {
                    return Ok(Some(into_instance(PluginMetadata::new(plugin_id))));
                }
                return Ok(None);
            };

            let scope_key = match factory.scope() {
                ServiceScope::Root => ROOT_PLUGIN_ID,
                ServiceScope::Plugin => plugin_id,
            };
            let key = (service.id().to_string(), scope_key.to_string());
            let cell = Arc::clone(self.instances.entry(key).or_default().value());

            let instance = cell
                .get_or_try_init(|| self.instantiate(&factory, scope_key))
                .await?;
            Ok(Some(Arc::clone(instance)))
        }
        .boxed()
    }

    /// The instance of `service` for the scope of `plugin_id`, if already built
    ///
    /// Never runs a factory.
    pub fn get_if_instantiated(&self, service: &ServiceRef, plugin_id: &str) -> Option<ServiceInstance> {
        let factory = self.factory(service.id())?;
        let scope_key = match factory.scope() {
            ServiceScope::Root => ROOT_PLUGIN_ID,
            ServiceScope::Plugin => plugin_id,
        };
        let key = (service.id().to_string(), scope_key.to_string());
        let cell = self.instances.get(&key)?;
        cell.value().get().map(Arc::clone)
    }

    async fn instantiate(&self, factory: &ServiceFactory, plugin_id: &str) -> Result<ServiceInstance> {
        let service_id = factory.service().id();
        let mut deps = ResolvedDeps::new();
        let mut missing = Vec::new();

        for (name, dep) in factory.deps() {
            if factory.scope() == ServiceScope::Root && self.scope_of(dep) == ServiceScope::Plugin {
                return Err(Error::service_instantiation(
                    service_id,
                    plugin_id,
                    format!(
                        "'root' scoped service cannot depend on 'plugin' scoped service '{}'",
                        dep.id()
                    ),
                ));
            }
            match self.get(dep, plugin_id).await? {
                Some(instance) => deps.insert(name.clone(), instance),
                None => missing.push(dep.to_string()),
            }
        }

        if !missing.is_empty() {
            return Err(Error::service_instantiation(
                service_id,
                plugin_id,
                format!(
                    "the following dependent services are missing: {}",
                    missing.join(", ")
                ),
            ));
        }

        debug!(service = %service_id, plugin_id = %plugin_id, "Instantiating service");
        factory
            .create(ServiceContext::new(plugin_id, deps))
            .await
            .map_err(|e| Error::ServiceInstantiation {
                service_id: service_id.to_string(),
                plugin_id: plugin_id.to_string(),
                message: format!("factory failed: {e}"),
                source: Some(Box::new(e)),
            })
    }

    /// Fail if service factories depend on each other in a cycle
    pub fn check_for_circular_deps(&self) -> Result<()> {
        let mut factories: Vec<Arc<ServiceFactory>> =
            self.factories.iter().map(|e| Arc::clone(e.value())).collect();
        factories.sort_by(|a, b| a.service().id().cmp(b.service().id()));

        // The graph ignores self-edges; a factory needing itself never resolves
        if let Some(factory) = factories
            .iter()
            .find(|f| f.deps().values().any(|dep| dep.id() == f.service().id()))
        {
            let service_id = factory.service().id().to_string();
            return Err(Error::CircularServiceDependency {
                cycle: vec![service_id.clone(), service_id],
            });
        }

        let graph = DependencyGraph::from_iterable(factories.iter().map(|factory| {
            DependencyNode::new(
                factory.service().id().to_string(),
                [factory.service().id()],
                factory.deps().values().map(ServiceRef::id),
            )
        }));

        match graph.detect_circular_dependency() {
            Some(cycle) => Err(Error::CircularServiceDependency {
                cycle: cycle.into_iter().cloned().collect(),
            }),
            None => Ok(()),
        }
    }

    /// Instantiate every eager factory of `scope`
    ///
    /// `plugin_id` selects the plugin for plugin-scoped services and is
    /// ignored for root-scoped ones.
    pub async fn initialize_eager_services_with_scope(
        &self,
        scope: ServiceScope,
        plugin_id: Option<&str>,
    ) -> Result<()> {
        let plugin_id = plugin_id.unwrap_or(ROOT_PLUGIN_ID);
        let eager: Vec<ServiceRef> = self
            .factories
            .iter()
            .filter(|e| e.value().is_eager() && e.value().scope() == scope)
            .map(|e| e.value().service().clone())
            .collect();

        if eager.is_empty() {
            return Ok(());
        }

        info!(scope = %scope, plugin_id = %plugin_id, count = eager.len(), "Initializing eager services");
        try_join_all(eager.iter().map(|service| self.get(service, plugin_id))).await?;
        Ok(())
    }

    fn factory(&self, service_id: &str) -> Option<Arc<ServiceFactory>> {
        self.factories.get(service_id).map(|e| Arc::clone(e.value()))
    }

    fn scope_of(&self, service: &ServiceRef) -> ServiceScope {
        self.factory(service.id())
            .map_or(service.scope(), |factory| factory.scope())
    }

    fn is_instantiated(&self, service_id: &str) -> bool {
        self.instances
            .iter()
            .any(|e| e.key().0 == service_id && e.value().initialized())
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("services", &self.service_ids())
            .field("instances", &self.instances.len())
            .finish()
    }
}
