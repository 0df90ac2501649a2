//! # Portico Plugin API
//!
//! The contract plugin authors program against. Nothing in this crate runs a
//! backend; it only describes what a backend is made of.
//!
//! ## Module Categories
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`refs`] | Service and extension point references |
//! | [`service`] | Service factories and their builder |
//! | [`init`] | Init descriptors for plugins and modules |
//! | [`feature`] | Features and registrations |
//! | [`plugin`] | `create_backend_plugin` / `create_backend_module` |
//! | [`core_services`] | Well-known service refs and built-in service types |
//! | [`deps`] | Type-erased instances and resolved dependency maps |
//! | [`error`] | Error taxonomy |

pub mod core_services;
pub mod deps;
pub mod error;
pub mod feature;
pub mod init;
pub mod plugin;
pub mod refs;
pub mod service;

pub use deps::{ResolvedDeps, ServiceInstance, downcast_instance, into_instance};
pub use error::{DispatchError, Error, Result};
pub use feature::{BackendFeature, FEATURE_VERSION, Feature, Registration};
pub use init::InitDescriptor;
pub use plugin::{RegistrationEnv, create_backend_module, create_backend_plugin};
pub use refs::{DependencyRef, ExtensionPointRef, ServiceRef, ServiceScope};
pub use service::{ServiceContext, ServiceFactory};
