//! Contextual dependency injection container for Bindery
//!
//! The container resolves services by id. Each id has a [`BindingRule`]
//! naming the concrete class to build and how: constructor arguments,
//! whether the instance is shared, and substitutions that apply only while
//! that class's own dependencies are being resolved.
//!
//! ## Quick Start
//!
//! ```rust
//! use bindery_di::{ClassDescriptor, Container, Parameter, TypeRegistry};
//!
//! struct FileLogger {
//!     path: String,
//! }
//!
//! let registry = TypeRegistry::new();
//! registry.register(ClassDescriptor::interface("Logger"));
//! registry.register(
//!     ClassDescriptor::builder::<FileLogger>("FileLogger")
//!         .implements("Logger")
//!         .param(Parameter::data("path").with_default("app.log"))
//!         .constructor(|args| Ok(FileLogger { path: args.data("path")? }))
//!         .build(),
//! );
//!
//! let container = Container::with_registry(registry);
//! container.singleton("Logger", "FileLogger").unwrap();
//!
//! let logger = container.get_typed::<FileLogger>("Logger").unwrap();
//! assert_eq!(logger.path, "app.log");
//! ```
//!
//! [`Container::in_context_of`] returns a view in which a class's
//! substitutions are in force; see the [`resolver`] module.

pub mod cache;
mod construct;
pub mod container;
pub mod error;
pub mod provider;
pub mod registration;
pub mod registry;
pub mod resolver;
pub mod rule;
pub mod service_id;
pub mod table;
pub mod value;

pub use cache::{CacheKey, InstanceCache};
pub use container::Container;
pub use error::{ContainerError, ContainerResult, ErrorCategory};
pub use provider::{expand_provider, Lifetime, ProviderSpec};
pub use registration::{discovered_class_count, list_discovered_classes, ClassRegistration};
pub use registry::{
    ClassDescriptor, ClassKind, DescriptorBuilder, Injectable, Parameter, ResolvedArgs,
    TypeRegistry,
};
pub use rule::{BindingRule, Substitution, SubstitutionKey};
pub use service_id::{ServiceId, DEFAULT_RULE_ID};
pub use table::BindingTable;
pub use value::{Args, Object, Value};

// Re-exported so downstream crates can submit registrations without a direct dependency
pub use inventory;
