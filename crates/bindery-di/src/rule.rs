//! Binding rules and contextual substitutions

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::container::Container;
use crate::error::{ContainerError, ContainerResult};
use crate::service_id::ServiceId;
use crate::value::{Object, Value};

/// What a substitution replaces: a dependency type or a parameter name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SubstitutionKey {
    Type(ServiceId),
    Param(String),
}

impl SubstitutionKey {
    /// `"$name"` is a parameter key, anything else a type key
    pub fn parse(key: &str) -> Self {
        match key.trim().strip_prefix('$') {
            Some(param) => SubstitutionKey::Param(param.to_string()),
            None => SubstitutionKey::Type(ServiceId::new(key)),
        }
    }

    pub fn param(name: &str) -> Self {
        SubstitutionKey::Param(name.strip_prefix('$').unwrap_or(name).to_string())
    }

    pub fn of_type(id: impl Into<ServiceId>) -> Self {
        SubstitutionKey::Type(id.into())
    }

    pub fn as_type(&self) -> Option<&ServiceId> {
        match self {
            SubstitutionKey::Type(id) => Some(id),
            SubstitutionKey::Param(_) => None,
        }
    }
}

impl fmt::Display for SubstitutionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubstitutionKey::Type(id) => write!(f, "{id}"),
            SubstitutionKey::Param(name) => write!(f, "${name}"),
        }
    }
}

impl From<&str> for SubstitutionKey {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

/// Callback producing a substitution value on demand
pub type SubstitutionFactory = Arc<dyn Fn(&Container) -> ContainerResult<Value> + Send + Sync>;

/// Replacement used while resolving the dependencies of one rule's target
#[derive(Clone)]
pub enum Substitution {
    /// Resolve this class instead
    Class(ServiceId),
    /// Use this exact instance
    Instance(Object),
    /// Use this value
    Value(Value),
    /// Call back into the container
    Factory(SubstitutionFactory),
}

impl Substitution {
    pub fn class(id: impl Into<ServiceId>) -> Self {
        Substitution::Class(id.into())
    }

    pub fn value(value: impl Into<Value>) -> Self {
        Substitution::Value(value.into())
    }

    pub fn factory<F>(factory: F) -> Self
    where
        F: Fn(&Container) -> ContainerResult<Value> + Send + Sync + 'static,
    {
        Substitution::Factory(Arc::new(factory))
    }
}

impl PartialEq for Substitution {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Substitution::Class(a), Substitution::Class(b)) => a == b,
            (Substitution::Instance(a), Substitution::Instance(b)) => a.ptr_eq(b),
            (Substitution::Value(a), Substitution::Value(b)) => a == b,
            (Substitution::Factory(a), Substitution::Factory(b)) => std::ptr::eq(
                Arc::as_ptr(a) as *const (),
                Arc::as_ptr(b) as *const (),
            ),
            _ => false,
        }
    }
}

impl fmt::Debug for Substitution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Substitution::Class(id) => f.debug_tuple("Class").field(id).finish(),
            Substitution::Instance(object) => f.debug_tuple("Instance").field(object).finish(),
            Substitution::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Substitution::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

/// How one service identifier resolves
#[derive(Debug, Clone, PartialEq)]
pub struct BindingRule {
    /// Concrete class to build; `None` means the identifier itself
    pub target: Option<ServiceId>,
    /// Default positional arguments, merged after call-time arguments
    pub constructor_args: Vec<Value>,
    /// Cache the first instance and reuse it
    pub shared: bool,
    /// Replacements applied while resolving the target's dependencies
    pub substitutions: BTreeMap<SubstitutionKey, Substitution>,
    /// Services built once per construction tree and shared by reference in it
    pub share_instances: Vec<ServiceId>,
    /// Whether subclasses of the bound id pick this rule up
    pub inherit: bool,
}

impl Default for BindingRule {
    fn default() -> Self {
        Self {
            target: None,
            constructor_args: Vec::new(),
            shared: false,
            substitutions: BTreeMap::new(),
            share_instances: Vec::new(),
            inherit: true,
        }
    }
}

impl BindingRule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rule that only points at `target`
    pub fn to(target: impl Into<ServiceId>) -> Self {
        Self {
            target: Some(target.into()),
            ..Self::default()
        }
    }

    pub fn with_target(mut self, target: impl Into<ServiceId>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.constructor_args = args;
        self
    }

    pub fn with_shared(mut self, shared: bool) -> Self {
        self.shared = shared;
        self
    }

    pub fn with_inherit(mut self, inherit: bool) -> Self {
        self.inherit = inherit;
        self
    }

    pub fn with_substitution(
        mut self,
        key: impl Into<SubstitutionKey>,
        substitution: Substitution,
    ) -> Self {
        self.substitutions.insert(key.into(), substitution);
        self
    }

    pub fn with_share_instance(mut self, id: impl Into<ServiceId>) -> Self {
        let id = id.into();
        if !self.share_instances.contains(&id) {
            self.share_instances.push(id);
        }
        self
    }

    pub fn substitution(&self, key: &SubstitutionKey) -> Option<&Substitution> {
        self.substitutions.get(key)
    }

    /// The concrete class this rule builds when bound to `id`
    pub fn concrete_for(&self, id: &ServiceId) -> ServiceId {
        self.target.clone().unwrap_or_else(|| id.clone())
    }

    pub fn resolves_to(&self, id: &ServiceId, class: &ServiceId) -> bool {
        self.target.as_ref().unwrap_or(id) == class
    }

    /// The rule only redirects to its target and carries nothing of its own.
    ///
    /// A shared rule is never an alias: it owns the instance cached under its id.
    pub fn is_alias(&self) -> bool {
        self.target.is_some()
            && !self.shared
            && self.constructor_args.is_empty()
            && self.substitutions.is_empty()
            && self.share_instances.is_empty()
    }

    /// Layer this rule over `base`: own args replace, substitutions and shared
    /// instances are merged with this rule winning, flags come from this rule.
    pub fn merge_over(&self, base: &BindingRule) -> BindingRule {
        let mut merged = base.clone();
        merged.target = self.target.clone();
        if !self.constructor_args.is_empty() {
            merged.constructor_args = self.constructor_args.clone();
        }
        for (key, substitution) in &self.substitutions {
            merged.substitutions.insert(key.clone(), substitution.clone());
        }
        for id in &self.share_instances {
            if !merged.share_instances.contains(id) {
                merged.share_instances.push(id.clone());
            }
        }
        merged.shared = self.shared;
        merged.inherit = self.inherit;
        merged
    }

    /// A type substitution must not also be listed in `share_instances`
    pub fn validate(&self) -> ContainerResult<()> {
        for id in &self.share_instances {
            if self
                .substitutions
                .contains_key(&SubstitutionKey::Type(id.clone()))
            {
                return Err(ContainerError::configuration(format!(
                    "{id} is both substituted and listed in share_instances"
                )));
            }
        }
        if matches!(&self.target, Some(target) if target.is_empty()) {
            return Err(ContainerError::configuration("rule target is empty"));
        }
        Ok(())
    }
}
