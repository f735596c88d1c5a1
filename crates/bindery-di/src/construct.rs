//! Resolution and construction
//!
//! Parameter filling order for one constructor:
//!
//! 1. call-time positional objects, matched by declared type
//! 2. call-time named values, matched by parameter name
//! 3. call-time leftovers: objects by type, then the rest by position
//! 4. the rule's constructor args, by the same pool logic
//! 5. substitutions of the consumer rule, then of the default rule
//! 6. instances shared within the current construction tree
//! 7. a nested resolution of the declared type, when the container has it
//! 8. the parameter default, then `null` for nullable parameters

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::cache::CacheKey;
use crate::container::Container;
use crate::error::{ContainerError, ContainerResult};
use crate::registry::{Parameter, ResolvedArgs, TypeRegistry};
use crate::rule::{BindingRule, Substitution, SubstitutionKey};
use crate::service_id::ServiceId;
use crate::value::{Args, Object, Value};

/// State of one top-level `get` call
#[derive(Default)]
pub(crate) struct Resolution {
    /// Classes currently under construction, outermost first
    stack: Vec<ServiceId>,
    /// Ids forwarded since the innermost construction began
    aliases: Vec<ServiceId>,
    /// Instances shared by reference within the construction tree
    shared: HashMap<ServiceId, Object>,
}

fn circular(path: &[ServiceId], id: &ServiceId) -> ContainerError {
    let chain = path
        .iter()
        .chain(std::iter::once(id))
        .map(ServiceId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ");
    ContainerError::CircularDependency { chain }
}

impl Resolution {
    fn enter_alias(&mut self, id: &ServiceId) -> ContainerResult<()> {
        if self.aliases.contains(id) {
            return Err(circular(&self.aliases, id));
        }
        self.aliases.push(id.clone());
        Ok(())
    }

    fn shared_for(&self, class: &ServiceId, registry: &TypeRegistry) -> Option<Object> {
        if let Some(object) = self.shared.get(class) {
            return Some(object.clone());
        }
        self.shared
            .values()
            .find(|object| registry.is_a(object.class(), class))
            .cloned()
    }
}

impl Container {
    pub(crate) fn resolve(
        &self,
        id: &ServiceId,
        as_service: &ServiceId,
        args: Args,
        resolution: &mut Resolution,
    ) -> ContainerResult<Object> {
        let table = self.snapshot();

        if let Some(instance) = table.pinned(id) {
            if !args.is_empty() {
                return Err(ContainerError::unusable_arguments(id.as_str()));
            }
            return Ok(instance.clone());
        }

        let rule = table.rule(id, &self.registry);
        let key = CacheKey::for_rule(id, &rule);
        let cache = self.cache_for(id);
        if rule.shared {
            if let Some(instance) = cache.get_shared(&key) {
                if !args.is_empty() {
                    return Err(ContainerError::unusable_arguments(id.as_str()));
                }
                return Ok(instance);
            }
        }

        let substitution = if table.has_rule(id) {
            None
        } else {
            table
                .default_rule()
                .substitution(&SubstitutionKey::Type(id.clone()))
        };

        let instance = match substitution {
            Some(substitution) => {
                resolution.enter_alias(id)?;
                let result = self
                    .substitute(id, substitution, resolution)
                    .and_then(|value| self.expect_object(id, value, resolution));
                resolution.aliases.pop();
                return result;
            }
            None => self.build(id, as_service, &rule, args, resolution)?,
        };

        if rule.shared {
            debug!("Sharing instance of {} as {}", instance.class(), id);
            return Ok(cache.put_shared(key, instance));
        }
        Ok(instance)
    }

    fn build(
        &self,
        id: &ServiceId,
        as_service: &ServiceId,
        rule: &BindingRule,
        args: Args,
        resolution: &mut Resolution,
    ) -> ContainerResult<Object> {
        let class = rule.concrete_for(id);
        if rule.is_alias() && class != *id {
            resolution.enter_alias(id)?;
            let result = self.resolve(&class, as_service, args, resolution);
            resolution.aliases.pop();
            return result;
        }

        let effective = if class == *id {
            rule.clone()
        } else {
            rule.merge_over(&self.snapshot().rule(&class, &self.registry))
        };
        self.construct(&class, as_service, &effective, args, resolution)
    }

    fn construct(
        &self,
        class: &ServiceId,
        as_service: &ServiceId,
        rule: &BindingRule,
        args: Args,
        resolution: &mut Resolution,
    ) -> ContainerResult<Object> {
        if resolution.stack.contains(class) {
            return Err(circular(&resolution.stack, class));
        }
        resolution.stack.push(class.clone());
        // Ids met again below this class may be forwarded by a different view
        let aliases = std::mem::take(&mut resolution.aliases);
        let result = self.instantiate(class, as_service, rule, args, resolution);
        resolution.aliases = aliases;
        resolution.stack.pop();
        result
    }

    fn instantiate(
        &self,
        class: &ServiceId,
        as_service: &ServiceId,
        rule: &BindingRule,
        args: Args,
        resolution: &mut Resolution,
    ) -> ContainerResult<Object> {
        let descriptor = self
            .registry
            .describe(class)
            .ok_or_else(|| ContainerError::not_instantiable(class.as_str()))?;
        let constructor = match descriptor.constructor() {
            Some(constructor) if descriptor.is_instantiable() => Arc::clone(constructor),
            _ => return Err(ContainerError::not_instantiable(class.as_str())),
        };

        debug!("Constructing {} for {}", class, as_service);
        let context = self.in_context_of(class.clone())?;

        let mut activated = Vec::new();
        let mut outcome = Ok(());
        for shared_id in &rule.share_instances {
            if resolution.shared.contains_key(shared_id) {
                continue;
            }
            match context.resolve(shared_id, shared_id, Args::new(), resolution) {
                Ok(instance) => {
                    resolution.shared.insert(shared_id.clone(), instance);
                    activated.push(shared_id.clone());
                }
                Err(err) => {
                    outcome = Err(err);
                    break;
                }
            }
        }

        let result = outcome.and_then(|()| {
            let values = context.fill_params(class, descriptor.params(), rule, args, resolution)?;
            let mut resolved = ResolvedArgs::new(class.clone(), values);
            constructor(&mut resolved)
        });
        for shared_id in &activated {
            resolution.shared.remove(shared_id);
        }
        let mut boxed = result?;

        if let Some(hook) = descriptor.container_hook() {
            hook(&mut *boxed, &context);
        }
        if let Some(hook) = descriptor.service_name_hook() {
            hook(&mut *boxed, as_service);
        }

        Ok(Object::with_casts(
            class.clone(),
            Arc::from(boxed),
            Arc::clone(descriptor.casts()),
        ))
    }

    /// Runs on the consumer's context view
    fn fill_params(
        &self,
        class: &ServiceId,
        params: &[Parameter],
        rule: &BindingRule,
        args: Args,
        resolution: &mut Resolution,
    ) -> ContainerResult<Vec<(String, Value)>> {
        let mut slots: Vec<Option<Value>> = vec![None; params.len()];
        let (mut positional, named) = args.into_parts();

        for (slot, param) in slots.iter_mut().zip(params) {
            let Some(declared) = &param.class else {
                continue;
            };
            if let Some(index) = positional
                .iter()
                .position(|value| self.matches_type(value, declared))
            {
                *slot = Some(positional.remove(index));
            }
        }

        let mut leftovers = positional;
        for (name, value) in named {
            match params.iter().position(|param| param.name == name) {
                Some(index) if slots[index].is_none() => slots[index] = Some(value),
                _ => leftovers.push(value),
            }
        }

        self.fill_from_pool(params, &mut slots, leftovers);
        self.fill_from_pool(params, &mut slots, rule.constructor_args.clone());

        let table = self.snapshot();
        let default_rule = table.default_rule();
        let mut values = Vec::with_capacity(params.len());
        for (slot, param) in slots.into_iter().zip(params) {
            let value = match slot {
                Some(value) => value,
                None => self.fill_missing(class, param, rule, default_rule, resolution)?,
            };
            let value = match value {
                Value::Service(service) => {
                    Value::Object(self.resolve(&service, &service, Args::new(), resolution)?)
                }
                other => other,
            };
            values.push((param.name.clone(), value));
        }
        Ok(values)
    }

    fn fill_missing(
        &self,
        class: &ServiceId,
        param: &Parameter,
        rule: &BindingRule,
        default_rule: &BindingRule,
        resolution: &mut Resolution,
    ) -> ContainerResult<Value> {
        let by_name = SubstitutionKey::Param(param.name.clone());
        let by_type = param.class.clone().map(SubstitutionKey::Type);
        for source in [rule, default_rule] {
            if let Some(substitution) = source.substitution(&by_name) {
                return self.substitute(class, substitution, resolution);
            }
            if let Some(substitution) = by_type.as_ref().and_then(|key| source.substitution(key)) {
                return self.substitute(class, substitution, resolution);
            }
        }

        if let Some(declared) = &param.class {
            if let Some(instance) = resolution.shared_for(declared, &self.registry) {
                return Ok(Value::Object(instance));
            }
            if self.has(declared.clone()) {
                return self
                    .resolve(declared, declared, Args::new(), resolution)
                    .map(Value::Object);
            }
        }

        if let Some(default) = &param.default {
            return Ok(default.clone());
        }
        if param.nullable {
            return Ok(Value::null());
        }

        let reason = match &param.class {
            Some(declared) => format!("no argument, binding or default for {declared}"),
            None => "no argument, binding or default".to_string(),
        };
        Err(ContainerError::unresolved(class.as_str(), &param.name, reason))
    }

    /// Typed parameters take matching objects first; the remaining values go
    /// in order to untyped parameters
    fn fill_from_pool(&self, params: &[Parameter], slots: &mut [Option<Value>], mut pool: Vec<Value>) {
        if pool.is_empty() {
            return;
        }
        for (slot, param) in slots.iter_mut().zip(params) {
            if slot.is_some() {
                continue;
            }
            let Some(declared) = &param.class else {
                continue;
            };
            if let Some(index) = pool.iter().position(|value| self.matches_type(value, declared)) {
                *slot = Some(pool.remove(index));
            }
        }

        let mut rest = pool.into_iter();
        for (slot, param) in slots.iter_mut().zip(params) {
            if slot.is_some() || param.class.is_some() {
                continue;
            }
            match rest.next() {
                Some(value) => *slot = Some(value),
                None => break,
            }
        }
    }

    fn matches_type(&self, value: &Value, declared: &ServiceId) -> bool {
        match value {
            Value::Object(object) => self.registry.is_a(object.class(), declared),
            Value::Service(service) => self.registry.is_a(service, declared),
            Value::Data(_) => false,
        }
    }

    fn substitute(
        &self,
        consumer: &ServiceId,
        substitution: &Substitution,
        resolution: &mut Resolution,
    ) -> ContainerResult<Value> {
        match substitution {
            Substitution::Class(class) => self
                .resolve(class, class, Args::new(), resolution)
                .map(Value::Object),
            Substitution::Instance(instance) => Ok(Value::Object(instance.clone())),
            Substitution::Value(value) => Ok(value.clone()),
            Substitution::Factory(factory) => factory(self).map_err(|err| match err {
                ContainerError::Factory { .. } => err,
                other => ContainerError::factory(consumer.as_str(), other.to_string()),
            }),
        }
    }

    fn expect_object(
        &self,
        id: &ServiceId,
        value: Value,
        resolution: &mut Resolution,
    ) -> ContainerResult<Object> {
        match value {
            Value::Object(object) => Ok(object),
            Value::Service(service) => self.resolve(&service, &service, Args::new(), resolution),
            Value::Data(_) => Err(ContainerError::type_mismatch(id.as_str(), "object")),
        }
    }
}
