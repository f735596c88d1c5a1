//! Configuration types
//!
//! ```toml
//! eager = ["Cache"]
//!
//! [logging]
//! level = "debug"
//!
//! [bindings]
//! Logger = "FileLogger"
//!
//! [bindings.Cache]
//! target = "MemCache"
//! shared = true
//! args = [128]
//!
//! [bindings.Mailer.substitutions]
//! Transport = "SmtpTransport"
//! "$host" = "smtp.local"
//!
//! [[providers]]
//! id = "SqlStore"
//! lifetime = "singleton | service_singleton"
//! ```

use std::collections::BTreeMap;

use bindery_common::logging::LoggingConfig;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Top-level container configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ContainerConfig {
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Binding rules keyed by service id
    pub bindings: BTreeMap<String, BindingConfig>,
    /// Providers to register, in order
    pub providers: Vec<ProviderConfig>,
    /// Services resolved when the application starts
    pub eager: Vec<String>,
}

impl ContainerConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    pub fn from_yaml_str(source: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(source)?)
    }

    pub fn from_json_str(source: &str) -> Result<Self> {
        Ok(serde_json::from_str(source)?)
    }
}

/// A bare target name, or a full rule table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum BindingConfig {
    Target(String),
    Rule(RuleConfig),
}

/// Full binding rule
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RuleConfig {
    /// Concrete class; the service id itself when unset
    pub target: Option<String>,
    /// Share the first instance
    pub shared: bool,
    /// Apply to subclasses of the target
    pub inherit: bool,
    /// Default constructor arguments
    pub args: Vec<ValueConfig>,
    /// Contextual substitutions; `$name` keys address parameters
    pub substitutions: BTreeMap<String, ValueConfig>,
    /// Ids shared by reference within one construction tree
    pub share_instances: Vec<String>,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            target: None,
            shared: false,
            inherit: true,
            args: Vec::new(),
            substitutions: BTreeMap::new(),
            share_instances: Vec::new(),
        }
    }
}

/// A configured value.
///
/// A plain string under a type key names a class. `{ value = ... }` is always
/// data and `{ service = "..." }` always a service reference.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ValueConfig {
    Data { value: serde_json::Value },
    Service { service: String },
    Plain(serde_json::Value),
}

/// A provider registration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ProviderConfig {
    /// Provider class
    pub id: String,
    /// Services to bind; every declared service when unset
    pub services: Option<Vec<String>>,
    /// Declared services to skip
    pub except: Vec<String>,
    /// Lifetime flags such as `"singleton | service_singleton"`; `inherit` when unset
    pub lifetime: Option<String>,
}
