//! Service providers: classes that declare which services they satisfy
//!
//! A provider's [`ProviderSpec`] lists the service interfaces it implements,
//! the lifetime it wants and the contextual bindings to apply whenever it is
//! constructed. [`expand_provider`] turns that metadata into binding rules.

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use tracing::debug;

use crate::error::{ContainerError, ContainerResult};
use crate::registry::TypeRegistry;
use crate::rule::{BindingRule, Substitution, SubstitutionKey};
use crate::service_id::ServiceId;
use crate::table::BindingTable;

bitflags! {
    /// Lifetime policy of a provider; flags may be combined
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Lifetime: u8 {
        /// New instance on every resolution
        const TRANSIENT = 1;
        /// One instance of the provider for the container
        const SINGLETON = 1 << 1;
        /// One instance per service the provider is bound to
        const SERVICE_SINGLETON = 1 << 2;
        /// Take the lifetime declared by the provider or its services
        const INHERIT = 1 << 3;
    }
}

impl Default for Lifetime {
    fn default() -> Self {
        Lifetime::INHERIT
    }
}

impl FromStr for Lifetime {
    type Err = ContainerError;

    /// Parses `"singleton"`, `"singleton | service_singleton"` and the like
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut lifetime = Lifetime::empty();
        for part in s.split('|') {
            lifetime |= match part.trim().to_ascii_lowercase().replace('-', "_").as_str() {
                "transient" => Lifetime::TRANSIENT,
                "singleton" => Lifetime::SINGLETON,
                "service_singleton" => Lifetime::SERVICE_SINGLETON,
                "inherit" => Lifetime::INHERIT,
                other => {
                    return Err(ContainerError::configuration(format!(
                        "unknown lifetime '{other}'"
                    )))
                }
            };
        }
        if lifetime.is_empty() {
            return Err(ContainerError::configuration("empty lifetime"));
        }
        Ok(lifetime)
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self
            .iter_names()
            .map(|(name, _)| name.to_ascii_lowercase())
            .collect();
        f.write_str(&names.join(" | "))
    }
}

/// Static metadata of a provider class
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderSpec {
    pub services: Vec<ServiceId>,
    pub lifetime: Lifetime,
    /// Substitutions applied while the provider's own dependencies resolve
    pub bindings: Vec<(SubstitutionKey, Substitution)>,
}

impl ProviderSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn service(mut self, id: impl Into<ServiceId>) -> Self {
        let id = id.into();
        if !self.services.contains(&id) {
            self.services.push(id);
        }
        self
    }

    pub fn lifetime(mut self, lifetime: Lifetime) -> Self {
        self.lifetime = lifetime;
        self
    }

    pub fn binding(mut self, key: impl Into<SubstitutionKey>, substitution: Substitution) -> Self {
        self.bindings.push((key.into(), substitution));
        self
    }
}

/// Resolve `INHERIT` against the provider's declared lifetime, then against
/// the hints of the selected service interfaces
pub fn effective_lifetime(
    registry: &TypeRegistry,
    requested: Lifetime,
    declared: Lifetime,
    services: &[ServiceId],
) -> Lifetime {
    let mut lifetime = requested;
    if lifetime.contains(Lifetime::INHERIT) {
        lifetime = (lifetime - Lifetime::INHERIT) | declared;
    }
    if lifetime.contains(Lifetime::INHERIT) {
        lifetime -= Lifetime::INHERIT;
        for service in services {
            if let Some(hint) = registry
                .describe(service)
                .and_then(|descriptor| descriptor.lifetime_hint())
            {
                lifetime |= hint - Lifetime::INHERIT;
            }
        }
    }
    if lifetime.is_empty() {
        Lifetime::TRANSIENT
    } else {
        lifetime
    }
}

/// Copy a provider's contextual bindings into its own rule and mark it applied.
///
/// Used on first context entry for providers that were never registered.
pub(crate) fn apply_provider_bindings(
    table: &mut BindingTable,
    registry: &TypeRegistry,
    id: &ServiceId,
) -> ContainerResult<bool> {
    if table.provider_applied(id) {
        return Ok(false);
    }
    let Some(spec) = registry
        .describe(id)
        .and_then(|descriptor| descriptor.provider().cloned())
    else {
        return Ok(false);
    };

    if !spec.bindings.is_empty() {
        let mut rule = table
            .get_rule(id)
            .map(|rule| (*rule).clone())
            .unwrap_or_default();
        for (key, substitution) in spec.bindings {
            rule.substitutions.entry(key).or_insert(substitution);
        }
        table.set_rule(id.clone(), rule)?;
    }
    table.mark_provider(id.clone());
    debug!("Applied contextual bindings of provider {}", id);
    Ok(true)
}

/// Expand a provider into binding rules for itself and its services.
///
/// Returns the service ids that were bound.
pub fn expand_provider(
    table: &mut BindingTable,
    registry: &TypeRegistry,
    id: &ServiceId,
    services: Option<&[ServiceId]>,
    except: &[ServiceId],
    lifetime: Lifetime,
) -> ContainerResult<Vec<ServiceId>> {
    let descriptor = registry
        .describe(id)
        .ok_or_else(|| ContainerError::configuration(format!("{id} is not a registered class")))?;
    let spec = descriptor.provider().ok_or_else(|| {
        ContainerError::configuration(format!("{id} does not declare provider metadata"))
    })?;

    for service in &spec.services {
        if !registry.is_a(id, service) {
            return Err(ContainerError::configuration(format!(
                "{id} does not implement service {service}"
            )));
        }
    }

    let selected: Vec<ServiceId> = match services {
        Some(requested) => {
            for service in requested {
                if !spec.services.contains(service) || !registry.is_a(id, service) {
                    return Err(ContainerError::configuration(format!(
                        "{id} does not implement service {service}"
                    )));
                }
            }
            requested.to_vec()
        }
        None => spec.services.clone(),
    };
    let selected: Vec<ServiceId> = selected
        .into_iter()
        .filter(|service| !except.contains(service))
        .collect();

    let lifetime = effective_lifetime(registry, lifetime, spec.lifetime, &selected);
    let singleton = lifetime.contains(Lifetime::SINGLETON);
    let per_service = lifetime.contains(Lifetime::SERVICE_SINGLETON);

    let mut rule = table
        .get_rule(id)
        .map(|rule| (*rule).clone())
        .unwrap_or_default();
    rule.target = None;
    rule.shared = singleton;
    if singleton && per_service {
        rule.inherit = false;
    }
    for (key, substitution) in &spec.bindings {
        rule.substitutions.insert(key.clone(), substitution.clone());
    }
    table.set_rule(id.clone(), rule)?;

    for service in &selected {
        let service_rule = BindingRule::to(id.clone())
            .with_shared(per_service)
            .with_inherit(!per_service);
        table.set_rule(service.clone(), service_rule)?;
        table.unpin(service);
    }
    table.mark_provider(id.clone());

    debug!(
        "Registered provider {} ({}) for {} service(s)",
        id,
        lifetime,
        selected.len()
    );
    Ok(selected)
}
