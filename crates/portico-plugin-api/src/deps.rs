//! Type-erased dependency instances

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};

/// A type-erased service or extension point implementation
///
/// Trait-object services are stored as `Arc<dyn Trait>` inside the erased
/// value, so they are read back with `get::<Arc<dyn Trait>>()`.
pub type ServiceInstance = Arc<dyn Any + Send + Sync>;

/// Erase a concrete value into a [`ServiceInstance`]
pub fn into_instance<T: Any + Send + Sync>(value: T) -> ServiceInstance {
    Arc::new(value)
}

/// Read a concrete value back out of a [`ServiceInstance`]
pub fn downcast_instance<T: Any + Send + Sync>(instance: &ServiceInstance) -> Option<Arc<T>> {
    Arc::clone(instance).downcast::<T>().ok()
}

/// Dependencies resolved for one init or factory call, keyed by the names
/// declared in the descriptor
#[derive(Clone, Default)]
pub struct ResolvedDeps {
    values: HashMap<String, ServiceInstance>,
}

impl ResolvedDeps {
    /// Create an empty dependency map
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a resolved dependency
    pub fn insert(&mut self, name: impl Into<String>, instance: ServiceInstance) {
        self.values.insert(name.into(), instance);
    }

    /// Typed access to a dependency
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>> {
        self.values
            .get(name)
            .and_then(downcast_instance::<T>)
            .ok_or_else(|| Error::DependencyType {
                name: name.to_string(),
                expected: type_name::<T>(),
            })
    }

    /// Untyped access to a dependency
    pub fn raw(&self, name: &str) -> Option<&ServiceInstance> {
        self.values.get(name)
    }

    /// Whether a dependency with this name was resolved
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Number of resolved dependencies
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when nothing was resolved
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl std::fmt::Debug for ResolvedDeps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.values.keys().collect();
        names.sort();
        f.debug_struct("ResolvedDeps").field("names", &names).finish()
    }
}
