//! Backend Initializer
//!
//! Collects features, wires their dependencies and drives startup.
//!
//! ## Startup sequence
//!
//! ```text
//! queued features ──▶ classify ──▶ feature discovery ──▶ service cycle check
//!                                                              │
//!                                     root eager services ◀────┘
//!                                              │
//!                       extension point index + plugin/module records
//!                                              │
//!            ┌─────────────────────────────────┼──────────────────────┐
//!            ▼                                 ▼                      ▼
//!     plugin "a" branch                 plugin "b" branch           ...     (concurrent)
//!     eager plugin services             eager plugin services
//!     modules (inverted topo order)     modules (inverted topo order)
//!     plugin init                       plugin init
//!            └─────────────────────────────────┼──────────────────────┘
//!                                              ▼
//!                                  root command dispatcher
//! ```

use std::collections::btree_map::Entry as BTreeEntry;
use std::collections::hash_map::Entry as HashEntry;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use portico_plugin_api::core_services::{
    self, FeatureDiscoveryService, RootCommandDispatcher, RootLifecycleService,
};
use portico_plugin_api::{
    BackendFeature, DependencyRef, Error, ExtensionPointRef, FEATURE_VERSION, Feature,
    InitDescriptor, Registration, ResolvedDeps, Result, ServiceFactory, ServiceInstance,
    ServiceRef, ServiceScope, downcast_instance,
};
use tokio::sync::watch;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::constants::ROOT_PLUGIN_ID;
use crate::dependency_graph::{DependencyGraph, DependencyNode, TraversalError};
use crate::service_registry::ServiceRegistry;

/// Lifecycle phase of a [`BackendInitializer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupPhase {
    /// Accepting features, `start()` not called yet
    Idle,
    /// `start()` is in flight
    Starting,
    /// Startup completed
    Running,
    /// Startup failed or was abandoned
    Failed,
}

struct InitRecord {
    provides: Vec<ExtensionPointRef>,
    consumes: Vec<DependencyRef>,
    init: InitDescriptor,
}

struct ExtensionPointEntry {
    implementation: ServiceInstance,
    plugin_id: String,
}

type ExtensionPointIndex = HashMap<String, ExtensionPointEntry>;
type PendingFeature = BoxFuture<'static, Result<Feature>>;

/// Marks the phase as failed if `start()` is dropped before it settles
struct PhaseGuard<'a> {
    phase: &'a watch::Sender<StartupPhase>,
    armed: bool,
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!("Backend startup was abandoned before completing");
            self.phase.send_replace(StartupPhase::Failed);
        }
    }
}

/// Orchestrates registration and startup of backend features
pub struct BackendInitializer {
    registry: ServiceRegistry,
    pending: Mutex<Vec<PendingFeature>>,
    phase: watch::Sender<StartupPhase>,
    args: Vec<String>,
}

impl BackendInitializer {
    /// Create an initializer with the default service factories
    pub fn new<I>(default_factories: I) -> Result<Self>
    where
        I: IntoIterator<Item = ServiceFactory>,
    {
        let (phase, _) = watch::channel(StartupPhase::Idle);
        Ok(Self {
            registry: ServiceRegistry::create(default_factories)?,
            pending: Mutex::new(Vec::new()),
            phase,
            args: Vec::new(),
        })
    }

    /// Arguments handed to the root command dispatcher after startup
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> StartupPhase {
        *self.phase.borrow()
    }

    /// The registry backing this initializer
    pub fn service_registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// Queue a feature
    pub fn add(&self, feature: impl Into<Feature>) -> Result<()> {
        self.add_async(futures::future::ready(Ok(feature.into())))
    }

    /// Queue a feature that is still being produced
    pub fn add_async<F>(&self, feature: F) -> Result<()>
    where
        F: Future<Output = Result<Feature>> + Send + 'static,
    {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if self.phase() != StartupPhase::Idle {
            return Err(Error::AddAfterStart);
        }
        pending.push(feature.boxed());
        Ok(())
    }

    /// Run the startup sequence
    ///
    /// Can only be called once. Every plugin branch runs to settlement even
    /// when a sibling fails; the call fails if any branch failed.
    pub async fn start(&self) -> Result<()> {
        let pending = {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            if self.phase() != StartupPhase::Idle {
                return Err(Error::AlreadyStarted);
            }
            self.phase.send_replace(StartupPhase::Starting);
            std::mem::take(&mut *pending)
        };

        let mut guard = PhaseGuard {
            phase: &self.phase,
            armed: true,
        };
        info!(features = pending.len(), "Starting backend");
        let result = self.do_start(pending).await;
        guard.armed = false;

        match &result {
            Ok(()) => {
                self.phase.send_replace(StartupPhase::Running);
                info!("Backend started");
            }
            Err(e) => {
                self.phase.send_replace(StartupPhase::Failed);
                error!(error = %e, "Backend startup failed");
            }
        }
        result
    }

    /// Wait for startup to settle and run shutdown hooks
    ///
    /// A failed startup is not reported again; only shutdown hook failures
    /// make this return an error.
    pub async fn stop(&self) -> Result<()> {
        let mut phase = self.phase.subscribe();
        let current = *phase.borrow();
        if current == StartupPhase::Idle {
            return Ok(());
        }

        // The startup outcome is irrelevant here; cleanup runs either way.
        let _ = phase
            .wait_for(|p| matches!(p, StartupPhase::Running | StartupPhase::Failed))
            .await;

        info!("Stopping backend");
        // Hooks can only exist if some plugin already resolved the service
        let Some(instance) = self
            .registry
            .get_if_instantiated(&core_services::root_lifecycle(), ROOT_PLUGIN_ID)
        else {
            debug!("Root lifecycle service was never used, no shutdown hooks to run");
            info!("Backend stopped");
            return Ok(());
        };
        let Some(lifecycle) = downcast_instance::<RootLifecycleService>(&instance) else {
            return Err(Error::Shutdown {
                failures: vec!["Unexpected root lifecycle service implementation".to_string()],
            });
        };

        let failures = lifecycle.shutdown().await;
        if failures.is_empty() {
            info!("Backend stopped");
            Ok(())
        } else {
            Err(Error::Shutdown { failures })
        }
    }

    async fn do_start(&self, pending: Vec<PendingFeature>) -> Result<()> {
        let mut features = Vec::new();
        for feature in pending {
            self.add_feature(feature.await?, &mut features)?;
        }
        self.registry.check_for_circular_deps()?;

        if let Some(discovery) = self
            .root_service::<Arc<dyn FeatureDiscoveryService>>(
                &core_services::feature_discovery(),
                "feature discovery",
            )
            .await?
        {
            let discovered = discovery.get_backend_features().await?;
            info!(count = discovered.len(), "Discovered additional backend features");
            for feature in discovered {
                self.add_feature(feature, &mut features)?;
            }
            self.registry.check_for_circular_deps()?;
        }

        self.registry
            .initialize_eager_services_with_scope(ServiceScope::Root, None)
            .await?;

        let mut extension_points = ExtensionPointIndex::new();
        let mut plugin_inits: BTreeMap<String, InitRecord> = BTreeMap::new();
        let mut module_inits: BTreeMap<String, BTreeMap<String, InitRecord>> = BTreeMap::new();

        for feature in &features {
            for registration in feature.registrations()? {
                Self::record_registration(
                    registration,
                    &mut extension_points,
                    &mut plugin_inits,
                    &mut module_inits,
                )?;
            }
        }

        // Modules may be installed without their plugin
        let plugin_ids: BTreeSet<&String> = plugin_inits.keys().chain(module_inits.keys()).collect();
        info!(plugins = plugin_ids.len(), "Initializing plugins");

        let outcomes = join_all(plugin_ids.iter().map(|plugin_id| {
            let span = info_span!("plugin", plugin_id = %plugin_id);
            self.initialize_plugin(
                plugin_id,
                plugin_inits.get(*plugin_id),
                module_inits.get(*plugin_id),
                &extension_points,
            )
            .instrument(span)
        }))
        .await;

        let errors: Vec<Error> = outcomes.into_iter().filter_map(Result::err).collect();
        if !errors.is_empty() {
            return Err(Error::aggregate(errors));
        }

        self.dispatch_root_command().await;
        Ok(())
    }

    fn add_feature(&self, feature: Feature, features: &mut Vec<BackendFeature>) -> Result<()> {
        debug!(feature = %feature.describe(), "Adding feature");
        match feature {
            Feature::Service(factory) => self.registry.add(factory),
            Feature::Backend(feature) => {
                if feature.version() != FEATURE_VERSION {
                    return Err(Error::invalid_feature(format!(
                        "invalid version '{}'",
                        feature.version()
                    )));
                }
                features.push(feature);
                Ok(())
            }
        }
    }

    fn record_registration(
        registration: Registration,
        extension_points: &mut ExtensionPointIndex,
        plugin_inits: &mut BTreeMap<String, InitRecord>,
        module_inits: &mut BTreeMap<String, BTreeMap<String, InitRecord>>,
    ) -> Result<()> {
        let Registration {
            plugin_id,
            module_id,
            extension_points: provided,
            init,
        } = registration;

        let mut provides = Vec::with_capacity(provided.len());
        for (extension_point, implementation) in provided {
            match extension_points.entry(extension_point.id().to_string()) {
                HashEntry::Occupied(entry) => {
                    return Err(Error::DuplicateExtensionPoint {
                        id: entry.key().clone(),
                    });
                }
                HashEntry::Vacant(entry) => {
                    entry.insert(ExtensionPointEntry {
                        implementation,
                        plugin_id: plugin_id.clone(),
                    });
                }
            }
            provides.push(extension_point);
        }

        let record = InitRecord {
            provides,
            consumes: init.deps().values().cloned().collect(),
            init,
        };

        match module_id {
            None => match plugin_inits.entry(plugin_id) {
                BTreeEntry::Occupied(entry) => Err(Error::DuplicatePlugin {
                    plugin_id: entry.key().clone(),
                }),
                BTreeEntry::Vacant(entry) => {
                    entry.insert(record);
                    Ok(())
                }
            },
            Some(module_id) => {
                let modules = module_inits.entry(plugin_id.clone()).or_default();
                match modules.entry(module_id) {
                    BTreeEntry::Occupied(entry) => Err(Error::DuplicateModule {
                        plugin_id,
                        module_id: entry.key().clone(),
                    }),
                    BTreeEntry::Vacant(entry) => {
                        entry.insert(record);
                        Ok(())
                    }
                }
            }
        }
    }

    async fn initialize_plugin(
        &self,
        plugin_id: &str,
        plugin_init: Option<&InitRecord>,
        modules: Option<&BTreeMap<String, InitRecord>>,
        extension_points: &ExtensionPointIndex,
    ) -> Result<()> {
        self.registry
            .initialize_eager_services_with_scope(ServiceScope::Plugin, Some(plugin_id))
            .await
            .map_err(|e| Error::plugin_startup(plugin_id, e))?;

        // Modules run before the plugin so they can contribute to its extension points
        if let Some(modules) = modules {
            self.initialize_modules(plugin_id, modules, extension_points)
                .await?;
        }

        if let Some(record) = plugin_init {
            debug!("Initializing plugin");
            let deps = self
                .resolve_init_deps(record.init.deps(), plugin_id, None, extension_points)
                .await
                .map_err(|e| Error::plugin_startup(plugin_id, e))?;
            record
                .init
                .call(deps)
                .await
                .map_err(|e| Error::plugin_startup(plugin_id, e))?;
        }

        info!("Plugin initialized");
        Ok(())
    }

    async fn initialize_modules(
        &self,
        plugin_id: &str,
        modules: &BTreeMap<String, InitRecord>,
        extension_points: &ExtensionPointIndex,
    ) -> Result<()> {
        // Inverted edges: a module providing extension point A runs after
        // every module of the plugin that consumes A.
        let graph = DependencyGraph::from_iterable(modules.iter().map(|(module_id, record)| {
            DependencyNode::new(
                (module_id.as_str(), record),
                record.consumes.iter().map(DependencyRef::id),
                record.provides.iter().map(ExtensionPointRef::id),
            )
        }));

        if let Some(cycle) = graph.detect_circular_dependency() {
            return Err(Error::CircularModuleDependency {
                plugin_id: plugin_id.to_string(),
                cycle: cycle.into_iter().map(|(id, _)| (*id).to_string()).collect(),
            });
        }

        graph
            .parallel_topological_traversal(|&(module_id, record)| async move {
                debug!(module_id, "Initializing module");
                let deps = self
                    .resolve_init_deps(record.init.deps(), plugin_id, Some(module_id), extension_points)
                    .await
                    .map_err(|e| Error::module_startup(plugin_id, module_id, e))?;
                record
                    .init
                    .call(deps)
                    .await
                    .map_err(|e| Error::module_startup(plugin_id, module_id, e))
            })
            .await
            .map(|_| ())
            .map_err(|e| match e {
                TraversalError::Visit(errors) => Error::aggregate(errors),
                TraversalError::Unvisited { skipped } => Error::internal(format!(
                    "{skipped} module(s) of plugin '{plugin_id}' were never initialized"
                )),
            })
    }

    async fn resolve_init_deps(
        &self,
        deps: &BTreeMap<String, DependencyRef>,
        plugin_id: &str,
        module_id: Option<&str>,
        extension_points: &ExtensionPointIndex,
    ) -> Result<ResolvedDeps> {
        let mut resolved = ResolvedDeps::new();
        let mut missing = Vec::new();

        for (name, dep) in deps {
            if let Some(entry) = extension_points.get(dep.id()) {
                if entry.plugin_id != plugin_id {
                    return Err(Error::illegal_extension_point_access(
                        plugin_id,
                        module_id,
                        dep.id(),
                        &entry.plugin_id,
                    ));
                }
                resolved.insert(name.clone(), Arc::clone(&entry.implementation));
                continue;
            }

            let instance = match dep {
                DependencyRef::Service(service) => self.registry.get(service, plugin_id).await?,
                DependencyRef::ExtensionPoint(_) => None,
            };
            match instance {
                Some(instance) => resolved.insert(name.clone(), instance),
                None => missing.push(dep.to_string()),
            }
        }

        if !missing.is_empty() {
            return Err(Error::MissingDependencies { refs: missing });
        }
        Ok(resolved)
    }

    async fn dispatch_root_command(&self) {
        let dispatcher = match self
            .root_service::<Arc<dyn RootCommandDispatcher>>(
                &core_services::root_commander(),
                "root commander",
            )
            .await
        {
            Ok(Some(dispatcher)) => dispatcher,
            Ok(None) => {
                debug!("No root command dispatcher registered");
                return;
            }
            Err(e) => {
                error!(error = %e, "Failed to resolve root command dispatcher");
                return;
            }
        };

        if let Err(e) = dispatcher.dispatch(self.args.clone()).await {
            if e.exit_code == 0 {
                debug!(message = %e, "Root command exited");
            } else {
                error!(exit_code = e.exit_code, error = %e, "Root command failed");
            }
        }
    }

    async fn root_service<T>(&self, service: &ServiceRef, label: &str) -> Result<Option<Arc<T>>>
    where
        T: std::any::Any + Send + Sync,
    {
        let Some(instance) = self.registry.get(service, ROOT_PLUGIN_ID).await? else {
            return Ok(None);
        };
        downcast_instance::<T>(&instance)
            .map(Some)
            .ok_or_else(|| Error::internal(format!("Unexpected {label} service implementation")))
    }
}

impl std::fmt::Debug for BackendInitializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendInitializer")
            .field("phase", &self.phase())
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
