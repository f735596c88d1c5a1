//! Validation and application of a [`ContainerConfig`] to a container

use std::str::FromStr;

use bindery_di::{
    BindingRule, Container, Lifetime, ServiceId, Substitution, SubstitutionKey, Value,
};
use tracing::{debug, info};

use crate::error::{ConfigError, Result};
use crate::types::{BindingConfig, ContainerConfig, ProviderConfig, ValueConfig};

impl ContainerConfig {
    /// Check every binding and provider without touching a container
    pub fn validate(&self) -> Result<()> {
        bindery_common::logging::parse_log_level(&self.logging.level)
            .map_err(|err| ConfigError::validation(err.to_string()))?;

        for (id, binding) in &self.bindings {
            binding
                .to_rule(id)?
                .validate()
                .map_err(|err| ConfigError::validation(format!("binding '{id}': {err}")))?;
        }
        for provider in &self.providers {
            provider.parse_lifetime()?;
        }
        if let Some(empty) = self.eager.iter().find(|id| id.trim().is_empty()) {
            return Err(ConfigError::validation(format!(
                "eager service id '{empty}' is empty"
            )));
        }
        Ok(())
    }

    /// Register providers, then write the bindings, so explicit bindings win
    pub fn apply(&self, container: &Container) -> Result<()> {
        self.validate()?;

        for provider in &self.providers {
            let services: Option<Vec<ServiceId>> = provider
                .services
                .as_ref()
                .map(|services| services.iter().map(ServiceId::from).collect());
            let except: Vec<ServiceId> = provider.except.iter().map(ServiceId::from).collect();
            container.provider(
                provider.id.as_str(),
                services.as_deref(),
                &except,
                provider.parse_lifetime()?,
            )?;
            debug!("Registered provider {}", provider.id);
        }

        for (id, binding) in &self.bindings {
            container.bind_rule(id.as_str(), binding.to_rule(id)?)?;
        }

        info!(
            "Applied {} binding(s) and {} provider(s)",
            self.bindings.len(),
            self.providers.len()
        );
        Ok(())
    }

    /// Eager service ids in declaration order
    pub fn eager_services(&self) -> Vec<ServiceId> {
        self.eager.iter().map(ServiceId::from).collect()
    }
}

impl BindingConfig {
    /// Rule for service `id`
    pub fn to_rule(&self, id: &str) -> Result<BindingRule> {
        if id.trim().is_empty() {
            return Err(ConfigError::validation("binding id is empty"));
        }
        let service = ServiceId::new(id);

        let rule = match self {
            BindingConfig::Target(target) => with_target(BindingRule::new(), &service, target)?,
            BindingConfig::Rule(config) => {
                let mut rule = match &config.target {
                    Some(target) => with_target(BindingRule::new(), &service, target)?,
                    None => BindingRule::new(),
                }
                .with_shared(config.shared)
                .with_inherit(config.inherit)
                .with_args(config.args.iter().map(ValueConfig::to_arg).collect());

                for (key, value) in &config.substitutions {
                    let key = SubstitutionKey::parse(key);
                    let substitution = value.to_substitution(&key);
                    rule = rule.with_substitution(key, substitution);
                }
                for shared in &config.share_instances {
                    rule = rule.with_share_instance(shared.as_str());
                }
                rule
            }
        };
        Ok(rule)
    }
}

fn with_target(rule: BindingRule, service: &ServiceId, target: &str) -> Result<BindingRule> {
    let target = ServiceId::new(target);
    if target.is_empty() {
        return Err(ConfigError::validation(format!(
            "binding '{service}' has an empty target"
        )));
    }
    Ok(if target == *service {
        rule
    } else {
        rule.with_target(target)
    })
}

impl ValueConfig {
    fn to_arg(&self) -> Value {
        match self {
            ValueConfig::Data { value } | ValueConfig::Plain(value) => Value::Data(value.clone()),
            ValueConfig::Service { service } => Value::service(service.as_str()),
        }
    }

    fn to_substitution(&self, key: &SubstitutionKey) -> Substitution {
        match (self, key) {
            (ValueConfig::Service { service }, _) => Substitution::class(service.as_str()),
            (ValueConfig::Plain(serde_json::Value::String(class)), SubstitutionKey::Type(_)) => {
                Substitution::class(class.as_str())
            }
            (ValueConfig::Data { value } | ValueConfig::Plain(value), _) => {
                Substitution::value(value.clone())
            }
        }
    }
}

impl ProviderConfig {
    pub fn parse_lifetime(&self) -> Result<Lifetime> {
        if self.id.trim().is_empty() {
            return Err(ConfigError::validation("provider id is empty"));
        }
        match &self.lifetime {
            Some(lifetime) => Lifetime::from_str(lifetime).map_err(|err| {
                ConfigError::validation(format!("provider '{}': {err}", self.id))
            }),
            None => Ok(Lifetime::INHERIT),
        }
    }
}
