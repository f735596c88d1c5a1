//! Configuration manager implementation

use std::path::{Path, PathBuf};

use config::{Config, Environment};
use tracing::debug;

use crate::{
    error::{ConfigError, Result},
    types::ContainerConfig,
};

/// Default environment prefix; `BINDERY_LOGGING__LEVEL=debug` sets `logging.level`
pub const DEFAULT_ENV_PREFIX: &str = "BINDERY";

/// Configuration manager
pub struct ConfigManager {
    /// Configuration file path
    config_path: PathBuf,
    /// Whether a missing file is an error
    required: bool,
    /// Environment prefix
    env_prefix: String,
}

impl ConfigManager {
    /// Manager reading the default config file, if it exists
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
            required: false,
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
        }
    }

    /// Manager reading `path`, which must exist
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
            required: true,
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
        }
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Get default config path
    fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bindery")
            .join("bindery.toml")
    }

    /// Load the file (format taken from its extension), apply environment
    /// overrides and validate the result.
    ///
    /// The file is parsed as is so `$param` keys keep their case; only the
    /// environment goes through `config`, whose keys come out lower-cased.
    pub fn load(&self) -> Result<ContainerConfig> {
        if self.required && !self.config_path.exists() {
            return Err(ConfigError::NotFound(
                self.config_path.display().to_string(),
            ));
        }

        let mut document = self.read_file()?;
        let overrides: serde_json::Value = Config::builder()
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        merge(&mut document, overrides);

        let container_config: ContainerConfig = serde_json::from_value(document)?;
        self.validate(&container_config)?;
        debug!(
            "Loaded configuration from {} ({} binding(s))",
            self.config_path.display(),
            container_config.bindings.len()
        );
        Ok(container_config)
    }

    fn read_file(&self) -> Result<serde_json::Value> {
        if !self.config_path.exists() {
            return Ok(serde_json::Value::Object(serde_json::Map::new()));
        }
        let contents = std::fs::read_to_string(&self.config_path)?;
        let extension = self
            .config_path
            .extension()
            .and_then(|extension| extension.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let document: serde_json::Value = match extension.as_str() {
            "toml" => toml::from_str(&contents)?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)?,
            "json" => serde_json::from_str(&contents)?,
            other => {
                return Err(ConfigError::Parse(format!(
                    "unsupported config format '{other}' for {}",
                    self.config_path.display()
                )))
            }
        };
        Ok(match document {
            serde_json::Value::Null => serde_json::Value::Object(serde_json::Map::new()),
            document => document,
        })
    }

    pub fn validate(&self, config: &ContainerConfig) -> Result<()> {
        config.validate()
    }
}

/// Overlay `overrides` onto `base`; object keys match ignoring case
fn merge(base: &mut serde_json::Value, overrides: serde_json::Value) {
    match (base, overrides) {
        (serde_json::Value::Object(base), serde_json::Value::Object(overrides)) => {
            for (key, value) in overrides {
                let existing = base
                    .keys()
                    .find(|candidate| candidate.eq_ignore_ascii_case(&key))
                    .cloned();
                match existing {
                    Some(existing) => {
                        if let Some(slot) = base.get_mut(&existing) {
                            merge(slot, value);
                        }
                    }
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
