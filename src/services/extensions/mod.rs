//! Extensions
//!
//! Registration, dependency-ordered activation and per-extension context.

pub mod context;
pub mod dependency;
pub mod factory;
pub mod manager;
pub mod models;

pub use context::{EventBus, ExtensionContext, ExtensionEvent, ExtensionLogger, RegistryView};
pub use dependency::DependencyResolver;
pub use factory::{ExtensionFactory, ExtensionFactoryRegistry};
pub use manager::{ActiveExtension, ExtensionManager};
pub use models::{
    Extension, ExtensionCapability, ExtensionDependencies, ExtensionInfo, ExtensionMetadata,
};
