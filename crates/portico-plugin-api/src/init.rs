//! Init descriptors for plugins and modules

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::deps::ResolvedDeps;
use crate::error::Result;
use crate::refs::DependencyRef;

/// Boxed init function
pub type InitFn = Arc<dyn Fn(ResolvedDeps) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Named dependencies plus the async function that consumes them
#[derive(Clone)]
pub struct InitDescriptor {
    deps: BTreeMap<String, DependencyRef>,
    func: InitFn,
}

impl InitDescriptor {
    /// Start building a descriptor
    pub fn builder() -> InitDescriptorBuilder {
        InitDescriptorBuilder {
            deps: BTreeMap::new(),
        }
    }

    /// Declared dependencies by name
    pub fn deps(&self) -> &BTreeMap<String, DependencyRef> {
        &self.deps
    }

    /// Run the init function
    pub fn call(&self, deps: ResolvedDeps) -> BoxFuture<'static, Result<()>> {
        (self.func)(deps)
    }
}

impl std::fmt::Debug for InitDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitDescriptor")
            .field("deps", &self.deps)
            .finish_non_exhaustive()
    }
}

/// Builder returned by [`InitDescriptor::builder`]
#[derive(Debug)]
pub struct InitDescriptorBuilder {
    deps: BTreeMap<String, DependencyRef>,
}

impl InitDescriptorBuilder {
    /// Declare a dependency on a service or an extension point
    pub fn dependency(mut self, name: impl Into<String>, dep: impl Into<DependencyRef>) -> Self {
        self.deps.insert(name.into(), dep.into());
        self
    }

    /// Finish with the init function
    pub fn init<F, Fut>(self, f: F) -> InitDescriptor
    where
        F: Fn(ResolvedDeps) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        InitDescriptor {
            deps: self.deps,
            func: Arc::new(move |deps| f(deps).boxed()),
        }
    }
}
