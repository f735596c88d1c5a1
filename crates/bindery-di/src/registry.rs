//! Type registry: class metadata standing in for runtime reflection
//!
//! The container never inspects Rust types directly. Every class it can build
//! is described by a [`ClassDescriptor`]: its parents, its constructor
//! parameters with their declared types and defaults, and a constructor
//! closure. Subtype checks (`is_a`) operate on these descriptors.

use std::any::{type_name, Any, TypeId};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::container::Container;
use crate::error::{ContainerError, ContainerResult};
use crate::provider::{Lifetime, ProviderSpec};
use crate::service_id::ServiceId;
use crate::value::{CastFn, CastTable, Object, Value};

/// Type-erased constructor
pub type Constructor =
    Arc<dyn Fn(&mut ResolvedArgs) -> ContainerResult<Box<dyn Any + Send + Sync>> + Send + Sync>;

/// Hook handing a fresh instance the container that built it
pub type ContainerHook = Arc<dyn Fn(&mut (dyn Any + Send + Sync), &Container) + Send + Sync>;

/// Hook telling a fresh instance which service id it was resolved as
pub type ServiceNameHook = Arc<dyn Fn(&mut (dyn Any + Send + Sync), &ServiceId) + Send + Sync>;

/// A constructor parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    /// Declared class or interface; `None` for plain data
    pub class: Option<ServiceId>,
    pub default: Option<Value>,
    pub nullable: bool,
}

impl Parameter {
    /// Untyped (data) parameter
    pub fn data(name: &str) -> Self {
        Self {
            name: name.trim_start_matches('$').to_string(),
            class: None,
            default: None,
            nullable: false,
        }
    }

    /// Parameter declared with a class or interface type
    pub fn typed(name: &str, class: impl Into<ServiceId>) -> Self {
        Self {
            class: Some(class.into()),
            ..Self::data(name)
        }
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Accept `null` when nothing else fills the parameter
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    Concrete,
    Abstract,
    Interface,
}

/// Everything the container knows about one class
#[derive(Clone)]
pub struct ClassDescriptor {
    name: ServiceId,
    kind: ClassKind,
    parents: Vec<ServiceId>,
    params: Vec<Parameter>,
    constructor: Option<Constructor>,
    on_container: Option<ContainerHook>,
    on_service_name: Option<ServiceNameHook>,
    provider: Option<ProviderSpec>,
    lifetime_hint: Option<Lifetime>,
    casts: Arc<CastTable>,
}

impl ClassDescriptor {
    fn bare(name: impl Into<ServiceId>, kind: ClassKind) -> Self {
        Self {
            name: name.into(),
            kind,
            parents: Vec::new(),
            params: Vec::new(),
            constructor: None,
            on_container: None,
            on_service_name: None,
            provider: None,
            lifetime_hint: None,
            casts: Arc::default(),
        }
    }

    /// Start describing a concrete class whose instances are `T`
    pub fn builder<T: Any + Send + Sync>(name: impl Into<ServiceId>) -> DescriptorBuilder<T> {
        DescriptorBuilder {
            descriptor: Self::bare(name, ClassKind::Concrete),
            casts: CastTable::new(),
            _marker: PhantomData,
        }
    }

    pub fn interface(name: impl Into<ServiceId>) -> Self {
        Self::bare(name, ClassKind::Interface)
    }

    pub fn abstract_class(name: impl Into<ServiceId>) -> Self {
        Self::bare(name, ClassKind::Abstract)
    }

    /// Add a direct parent (superclass or interface)
    pub fn extends(mut self, parent: impl Into<ServiceId>) -> Self {
        let parent = parent.into();
        if !self.parents.contains(&parent) {
            self.parents.push(parent);
        }
        self
    }

    /// Lifetime contributed to providers registered with `Lifetime::INHERIT`
    pub fn with_lifetime_hint(mut self, lifetime: Lifetime) -> Self {
        self.lifetime_hint = Some(lifetime);
        self
    }

    pub fn name(&self) -> &ServiceId {
        &self.name
    }

    pub fn kind(&self) -> ClassKind {
        self.kind
    }

    pub fn parents(&self) -> &[ServiceId] {
        &self.parents
    }

    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    pub fn provider(&self) -> Option<&ProviderSpec> {
        self.provider.as_ref()
    }

    pub fn lifetime_hint(&self) -> Option<Lifetime> {
        self.lifetime_hint
    }

    pub fn is_instantiable(&self) -> bool {
        self.kind == ClassKind::Concrete && self.constructor.is_some()
    }

    pub(crate) fn constructor(&self) -> Option<&Constructor> {
        self.constructor.as_ref()
    }

    pub(crate) fn container_hook(&self) -> Option<&ContainerHook> {
        self.on_container.as_ref()
    }

    pub(crate) fn service_name_hook(&self) -> Option<&ServiceNameHook> {
        self.on_service_name.as_ref()
    }

    pub(crate) fn casts(&self) -> &Arc<CastTable> {
        &self.casts
    }
}

impl fmt::Debug for ClassDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("parents", &self.parents)
            .field("params", &self.params)
            .field("instantiable", &self.is_instantiable())
            .field("provider", &self.provider)
            .field("lifetime_hint", &self.lifetime_hint)
            .finish()
    }
}

/// Typed builder for concrete class descriptors
pub struct DescriptorBuilder<T> {
    descriptor: ClassDescriptor,
    casts: CastTable,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> DescriptorBuilder<T> {
    pub fn extends(mut self, parent: impl Into<ServiceId>) -> Self {
        self.descriptor = self.descriptor.extends(parent);
        self
    }

    /// Declare an implemented interface without a trait-object view
    pub fn implements(self, interface: impl Into<ServiceId>) -> Self {
        self.extends(interface)
    }

    /// Declare an implemented interface and how to view `T` as `I`, so that
    /// [`Object::cast`] and [`ResolvedArgs::interface`] can hand out `Arc<I>`
    pub fn implements_as<I, F>(mut self, interface: impl Into<ServiceId>, cast: F) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<T>) -> Arc<I> + Send + Sync + 'static,
    {
        let cast: CastFn = Arc::new(move |any: Arc<dyn Any + Send + Sync>| {
            any.downcast::<T>()
                .ok()
                .map(|concrete| Box::new(cast(concrete)) as Box<dyn Any>)
        });
        self.casts.insert(TypeId::of::<Arc<I>>(), cast);
        self.extends(interface)
    }

    pub fn param(mut self, param: Parameter) -> Self {
        self.descriptor.params.push(param);
        self
    }

    pub fn constructor<F>(mut self, constructor: F) -> Self
    where
        F: Fn(&mut ResolvedArgs) -> ContainerResult<T> + Send + Sync + 'static,
    {
        self.descriptor.constructor = Some(Arc::new(move |args: &mut ResolvedArgs| {
            constructor(args).map(|value| Box::new(value) as Box<dyn Any + Send + Sync>)
        }));
        self
    }

    pub fn on_container<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut T, &Container) + Send + Sync + 'static,
    {
        self.descriptor.on_container = Some(Arc::new(
            move |instance: &mut (dyn Any + Send + Sync), container: &Container| {
                if let Some(instance) = instance.downcast_mut::<T>() {
                    hook(instance, container);
                }
            },
        ));
        self
    }

    pub fn on_service_name<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut T, &ServiceId) + Send + Sync + 'static,
    {
        self.descriptor.on_service_name = Some(Arc::new(
            move |instance: &mut (dyn Any + Send + Sync), service: &ServiceId| {
                if let Some(instance) = instance.downcast_mut::<T>() {
                    hook(instance, service);
                }
            },
        ));
        self
    }

    /// Static provider metadata: implemented services, lifetime, contextual bindings
    pub fn provider(mut self, spec: ProviderSpec) -> Self {
        self.descriptor.provider = Some(spec);
        self
    }

    pub fn lifetime_hint(mut self, lifetime: Lifetime) -> Self {
        self.descriptor.lifetime_hint = Some(lifetime);
        self
    }

    pub fn build(mut self) -> ClassDescriptor {
        self.descriptor.casts = Arc::new(self.casts);
        self.descriptor
    }
}

/// Types that carry their own class metadata
pub trait Injectable: Any + Send + Sync {
    fn describe() -> ClassDescriptor;
}

/// Arguments handed to a constructor, looked up by parameter name
#[derive(Debug)]
pub struct ResolvedArgs {
    service: ServiceId,
    values: Vec<(String, Value)>,
}

impl ResolvedArgs {
    pub fn new(service: ServiceId, values: Vec<(String, Value)>) -> Self {
        Self { service, values }
    }

    /// Class being constructed
    pub fn service(&self) -> &ServiceId {
        &self.service
    }

    pub fn value(&self, name: &str) -> ContainerResult<&Value> {
        self.values
            .iter()
            .find(|(param, _)| param == name)
            .map(|(_, value)| value)
            .ok_or_else(|| ContainerError::unresolved(self.service.as_str(), name, "not supplied"))
    }

    /// Move a value out, leaving `null` behind
    pub fn take(&mut self, name: &str) -> ContainerResult<Value> {
        let service = &self.service;
        self.values
            .iter_mut()
            .find(|(param, _)| param == name)
            .map(|(_, value)| std::mem::replace(value, Value::null()))
            .ok_or_else(|| ContainerError::unresolved(service.as_str(), name, "not supplied"))
    }

    pub fn raw_object(&self, name: &str) -> ContainerResult<Object> {
        match self.value(name)? {
            Value::Object(object) => Ok(object.clone()),
            _ => Err(ContainerError::unresolved(
                self.service.as_str(),
                name,
                "expected an object",
            )),
        }
    }

    pub fn object<T: Any + Send + Sync>(&self, name: &str) -> ContainerResult<Arc<T>> {
        self.raw_object(name)?
            .downcast::<T>()
            .ok_or_else(|| ContainerError::type_mismatch(self.service.as_str(), type_name::<T>()))
    }

    /// `None` when the parameter resolved to `null`
    pub fn optional_object<T: Any + Send + Sync>(
        &self,
        name: &str,
    ) -> ContainerResult<Option<Arc<T>>> {
        if self.value(name)?.is_null() {
            return Ok(None);
        }
        self.object::<T>(name).map(Some)
    }

    pub fn interface<I: ?Sized + 'static>(&self, name: &str) -> ContainerResult<Arc<I>> {
        self.raw_object(name)?
            .cast::<I>()
            .ok_or_else(|| ContainerError::type_mismatch(self.service.as_str(), type_name::<I>()))
    }

    pub fn optional_interface<I: ?Sized + 'static>(
        &self,
        name: &str,
    ) -> ContainerResult<Option<Arc<I>>> {
        if self.value(name)?.is_null() {
            return Ok(None);
        }
        self.interface::<I>(name).map(Some)
    }

    pub fn data<T: DeserializeOwned>(&self, name: &str) -> ContainerResult<T> {
        match self.value(name)? {
            Value::Data(data) => serde_json::from_value(data.clone()).map_err(|err| {
                ContainerError::unresolved(self.service.as_str(), name, err.to_string())
            }),
            _ => Err(ContainerError::unresolved(
                self.service.as_str(),
                name,
                "expected plain data",
            )),
        }
    }

    pub fn optional_data<T: DeserializeOwned>(&self, name: &str) -> ContainerResult<Option<T>> {
        if self.value(name)?.is_null() {
            return Ok(None);
        }
        self.data::<T>(name).map(Some)
    }
}

/// Registry of class descriptors
#[derive(Default)]
pub struct TypeRegistry {
    classes: RwLock<HashMap<ServiceId, Arc<ClassDescriptor>>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with every class submitted through `inventory`
    pub fn discover() -> Self {
        let registry = Self::new();
        registry.register_discovered();
        registry
    }

    /// Load every `inventory` submitted class, returning how many were loaded
    pub fn register_discovered(&self) -> usize {
        crate::registration::register_discovered_classes(self)
    }

    /// Add or replace a descriptor
    pub fn register(&self, descriptor: ClassDescriptor) {
        let name = descriptor.name().clone();
        let replaced = self
            .classes
            .write()
            .insert(name.clone(), Arc::new(descriptor))
            .is_some();
        if replaced {
            debug!("Replaced class descriptor for {}", name);
        } else {
            debug!("Registered class descriptor for {}", name);
        }
    }

    pub fn register_type<T: Injectable>(&self) {
        self.register(T::describe());
    }

    pub fn describe(&self, id: &ServiceId) -> Option<Arc<ClassDescriptor>> {
        self.classes.read().get(id).cloned()
    }

    pub fn contains(&self, id: &ServiceId) -> bool {
        self.classes.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.classes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.read().is_empty()
    }

    pub fn is_instantiable(&self, id: &ServiceId) -> bool {
        self.classes
            .read()
            .get(id)
            .is_some_and(|descriptor| descriptor.is_instantiable())
    }

    /// Every ancestor of `id`, nearest first. `id` itself is not included.
    pub fn ancestors(&self, id: &ServiceId) -> Vec<ServiceId> {
        let classes = self.classes.read();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        let mut ancestors = Vec::new();

        seen.insert(id.clone());
        queue.push_back(id.clone());
        while let Some(current) = queue.pop_front() {
            let Some(descriptor) = classes.get(&current) else {
                continue;
            };
            for parent in descriptor.parents() {
                if seen.insert(parent.clone()) {
                    ancestors.push(parent.clone());
                    queue.push_back(parent.clone());
                }
            }
        }
        ancestors
    }

    /// Reflexive, transitive subtype check
    pub fn is_a(&self, class: &ServiceId, ancestor: &ServiceId) -> bool {
        class == ancestor || self.ancestors(class).contains(ancestor)
    }

    /// Wrap an existing value as an instance of `class`, attaching the
    /// interface views registered for it
    pub fn wrap<T: Any + Send + Sync>(&self, class: impl Into<ServiceId>, value: T) -> Object {
        let class = class.into();
        let casts = self
            .describe(&class)
            .map(|descriptor| Arc::clone(descriptor.casts()))
            .unwrap_or_default();
        Object::with_casts(class, Arc::new(value), casts)
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let classes = self.classes.read();
        let mut names: Vec<&ServiceId> = classes.keys().collect();
        names.sort();
        f.debug_struct("TypeRegistry").field("classes", &names).finish()
    }
}
