//! Bindery configuration
//!
//! Bindings, providers and logging settings can be declared in a TOML, YAML
//! or JSON file, overridden from `BINDERY_*` environment variables, and
//! applied to a [`bindery_di::Container`].

pub mod apply;
pub mod error;
pub mod manager;
pub mod types;

pub use error::{ConfigError, Result};
pub use manager::{ConfigManager, DEFAULT_ENV_PREFIX};
pub use types::{BindingConfig, ContainerConfig, ProviderConfig, RuleConfig, ValueConfig};
