//! Container facade
//!
//! A [`Container`] is a cheap handle onto one view of the bindings. Every
//! view derived from the same root shares the type registry and the shared
//! instance cache; each view owns a copy-on-write binding table and its
//! context stack.
//!
//! Rebinding a service in a derived view gives that service a cache of its
//! own in the view, so the root's instance stays untouched.

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::cache::{CacheKey, InstanceCache};
use crate::construct::Resolution;
use crate::error::{ContainerError, ContainerResult};
use crate::provider::{apply_provider_bindings, expand_provider, Lifetime};
use crate::registry::TypeRegistry;
use crate::resolver::contextual_table;
use crate::rule::{BindingRule, SubstitutionKey};
use crate::service_id::ServiceId;
use crate::table::BindingTable;
use crate::value::{Args, Object, Value};

pub(crate) struct ViewState {
    pub(crate) table: RwLock<Arc<BindingTable>>,
    pub(crate) contexts: Vec<ServiceId>,
    /// Caches of services rebound in this view or the view it was derived from
    pub(crate) local_caches: RwLock<HashMap<ServiceId, Arc<InstanceCache>>>,
}

#[derive(Clone)]
pub struct Container {
    pub(crate) registry: Arc<TypeRegistry>,
    pub(crate) cache: Arc<InstanceCache>,
    pub(crate) view: Arc<ViewState>,
}

impl Default for Container {
    fn default() -> Self {
        Self::new(Arc::new(TypeRegistry::new()))
    }
}

impl Container {
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self {
            registry,
            cache: Arc::new(InstanceCache::new()),
            view: Arc::new(ViewState {
                table: RwLock::new(Arc::new(BindingTable::new())),
                contexts: Vec::new(),
                local_caches: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn with_registry(registry: TypeRegistry) -> Self {
        Self::new(Arc::new(registry))
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Current binding table snapshot
    pub fn snapshot(&self) -> Arc<BindingTable> {
        Arc::clone(&self.view.table.read())
    }

    /// Apply `update` to a copy of the table and commit it only on success
    fn update_table<R>(
        &self,
        update: impl FnOnce(&mut BindingTable) -> ContainerResult<R>,
    ) -> ContainerResult<R> {
        let mut table = self.view.table.write();
        let mut next = Arc::clone(&table);
        let result = update(Arc::make_mut(&mut next))?;
        *table = next;
        Ok(result)
    }

    fn write_rule(&self, id: ServiceId, rule: BindingRule) -> ContainerResult<&Self> {
        self.update_table(|table| {
            table.unpin(&id);
            table.set_rule(id.clone(), rule)
        })?;
        self.evict(&id);
        Ok(self)
    }

    fn is_root(&self) -> bool {
        self.view.contexts.is_empty()
    }

    /// Forget shared instances of `id` as seen from this view
    fn evict(&self, id: &ServiceId) {
        if self.is_root() {
            self.cache.evict(id);
        } else {
            debug!("Detaching shared instances of {} in context {:?}", id, self.view.contexts);
            self.view
                .local_caches
                .write()
                .insert(id.clone(), Arc::new(InstanceCache::new()));
        }
    }

    /// Cache holding the shared instances of `id` for this view
    pub(crate) fn cache_for(&self, id: &ServiceId) -> Arc<InstanceCache> {
        self.view
            .local_caches
            .read()
            .get(id)
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.cache))
    }

    fn local_caches(&self) -> Vec<Arc<InstanceCache>> {
        let mut caches: Vec<Arc<InstanceCache>> = Vec::new();
        for cache in self.view.local_caches.read().values() {
            if !caches.iter().any(|seen| Arc::ptr_eq(seen, cache)) {
                caches.push(Arc::clone(cache));
            }
        }
        caches
    }

    fn is_bound(&self, id: &ServiceId) -> bool {
        let table = self.snapshot();
        table.has_rule(id) || table.pinned(id).is_some()
    }

    fn simple_rule(id: &ServiceId, target: ServiceId, args: Vec<Value>, shared: bool) -> BindingRule {
        let rule = BindingRule::new().with_args(args).with_shared(shared);
        if target == *id {
            rule
        } else {
            rule.with_target(target)
        }
    }

    /// Bind `id` to `target`; pass `id` itself to build it directly
    pub fn bind(
        &self,
        id: impl Into<ServiceId>,
        target: impl Into<ServiceId>,
    ) -> ContainerResult<&Self> {
        self.bind_args(id, target, Vec::new())
    }

    pub fn bind_args(
        &self,
        id: impl Into<ServiceId>,
        target: impl Into<ServiceId>,
        args: Vec<Value>,
    ) -> ContainerResult<&Self> {
        let id = id.into();
        let rule = Self::simple_rule(&id, target.into(), args, false);
        self.write_rule(id, rule)
    }

    /// `bind` unless `id` already has a binding
    pub fn bind_if(
        &self,
        id: impl Into<ServiceId>,
        target: impl Into<ServiceId>,
    ) -> ContainerResult<&Self> {
        let id = id.into();
        if self.is_bound(&id) {
            return Ok(self);
        }
        self.bind(id, target)
    }

    /// Bind `id` to `target` and share the first instance
    pub fn singleton(
        &self,
        id: impl Into<ServiceId>,
        target: impl Into<ServiceId>,
    ) -> ContainerResult<&Self> {
        self.singleton_args(id, target, Vec::new())
    }

    pub fn singleton_args(
        &self,
        id: impl Into<ServiceId>,
        target: impl Into<ServiceId>,
        args: Vec<Value>,
    ) -> ContainerResult<&Self> {
        let id = id.into();
        let rule = Self::simple_rule(&id, target.into(), args, true);
        self.write_rule(id, rule)
    }

    pub fn singleton_if(
        &self,
        id: impl Into<ServiceId>,
        target: impl Into<ServiceId>,
    ) -> ContainerResult<&Self> {
        let id = id.into();
        if self.is_bound(&id) {
            return Ok(self);
        }
        self.singleton(id, target)
    }

    /// Resolve `id` to this exact instance in this view
    pub fn instance(&self, id: impl Into<ServiceId>, instance: Object) -> ContainerResult<&Self> {
        let id = id.into();
        debug!("Registering instance of {} as {}", instance.class(), id);
        self.update_table(|table| {
            table.pin(id.clone(), instance);
            Ok(())
        })?;
        self.evict(&id);
        Ok(self)
    }

    pub fn instance_if(&self, id: impl Into<ServiceId>, instance: Object) -> ContainerResult<&Self> {
        let id = id.into();
        if self.is_bound(&id) {
            return Ok(self);
        }
        self.instance(id, instance)
    }

    /// Store a fully specified rule
    pub fn bind_rule(&self, id: impl Into<ServiceId>, rule: BindingRule) -> ContainerResult<&Self> {
        self.write_rule(id.into(), rule)
    }

    /// Forget the rule and instances of `id`
    pub fn unbind(&self, id: impl Into<ServiceId>) -> ContainerResult<&Self> {
        let id = id.into();
        self.update_table(|table| {
            table.remove_rule(&id);
            table.unpin(&id);
            Ok(())
        })?;
        self.evict(&id);
        debug!("Unbound {}", id);
        Ok(self)
    }

    /// Register `id` as a provider of its declared services.
    ///
    /// `services` narrows the declared list; `except` removes entries from it.
    pub fn provider(
        &self,
        id: impl Into<ServiceId>,
        services: Option<&[ServiceId]>,
        except: &[ServiceId],
        lifetime: Lifetime,
    ) -> ContainerResult<&Self> {
        let id = id.into();
        let bound = self.update_table(|table| {
            expand_provider(table, &self.registry, &id, services, except, lifetime)
        })?;
        self.evict(&id);
        for service in &bound {
            self.evict(service);
        }
        Ok(self)
    }

    /// Register a provider for all of its declared services with its declared lifetime
    pub fn register_provider(&self, id: impl Into<ServiceId>) -> ContainerResult<&Self> {
        self.provider(id, None, &[], Lifetime::INHERIT)
    }

    /// Providers whose bindings are applied in this view
    pub fn providers(&self) -> Vec<ServiceId> {
        self.snapshot().providers().cloned().collect()
    }

    /// View used while resolving the dependencies of `id`.
    ///
    /// Returns a handle onto this same view when entering the context changes
    /// no binding.
    pub fn in_context_of(&self, id: impl Into<ServiceId>) -> ContainerResult<Container> {
        let id = id.into();
        let table = self.snapshot();
        if !table.provider_applied(&id)
            && self
                .registry
                .describe(&id)
                .is_some_and(|descriptor| descriptor.provider().is_some())
        {
            self.update_table(|table| apply_provider_bindings(table, &self.registry, &id))?;
        }

        let current = self.snapshot();
        let next = contextual_table(&current, &self.registry, &id);
        if Arc::ptr_eq(&current, &next) {
            return Ok(self.clone());
        }

        let mut contexts = self.view.contexts.clone();
        contexts.push(id);
        Ok(Self {
            registry: Arc::clone(&self.registry),
            cache: Arc::clone(&self.cache),
            view: Arc::new(ViewState {
                table: RwLock::new(next),
                contexts,
                local_caches: RwLock::new(self.view.local_caches.read().clone()),
            }),
        })
    }

    /// Innermost context of this view
    pub fn current_context(&self) -> ContainerResult<ServiceId> {
        self.view
            .contexts
            .last()
            .cloned()
            .ok_or_else(|| ContainerError::logic("not in a context"))
    }

    pub fn context_stack(&self) -> &[ServiceId] {
        &self.view.contexts
    }

    /// Both handles see the same binding table snapshot
    pub fn same_view(&self, other: &Container) -> bool {
        Arc::ptr_eq(&self.snapshot(), &other.snapshot())
    }

    pub fn get(&self, id: impl Into<ServiceId>) -> ContainerResult<Object> {
        let id = id.into();
        self.get_as_with(id.clone(), id, Args::new())
    }

    pub fn get_with(&self, id: impl Into<ServiceId>, args: Args) -> ContainerResult<Object> {
        let id = id.into();
        self.get_as_with(id.clone(), id, args)
    }

    /// Like `get`, but the service name hook receives `as_service`
    pub fn get_as(
        &self,
        id: impl Into<ServiceId>,
        as_service: impl Into<ServiceId>,
    ) -> ContainerResult<Object> {
        self.get_as_with(id, as_service, Args::new())
    }

    pub fn get_as_with(
        &self,
        id: impl Into<ServiceId>,
        as_service: impl Into<ServiceId>,
        args: Args,
    ) -> ContainerResult<Object> {
        let id = id.into();
        let as_service = as_service.into();
        let mut resolution = Resolution::default();
        self.resolve(&id, &as_service, args, &mut resolution)
    }

    /// Resolve and downcast to the concrete type
    pub fn get_typed<T: Any + Send + Sync>(&self, id: impl Into<ServiceId>) -> ContainerResult<Arc<T>> {
        let id = id.into();
        self.get(id.clone())?
            .downcast::<T>()
            .ok_or_else(|| ContainerError::type_mismatch(id.as_str(), type_name::<T>()))
    }

    /// Resolve and view through an interface declared with `implements_as`
    pub fn get_interface<I: ?Sized + 'static>(
        &self,
        id: impl Into<ServiceId>,
    ) -> ContainerResult<Arc<I>> {
        let id = id.into();
        self.get(id.clone())?
            .cast::<I>()
            .ok_or_else(|| ContainerError::type_mismatch(id.as_str(), type_name::<I>()))
    }

    /// Whether `get(id)` can produce an instance
    pub fn has(&self, id: impl Into<ServiceId>) -> bool {
        let table = self.snapshot();
        let mut id = id.into();
        let mut visited = Vec::new();
        loop {
            if table.pinned(&id).is_some() {
                return true;
            }
            if !table.has_rule(&id)
                && table
                    .default_rule()
                    .substitution(&SubstitutionKey::Type(id.clone()))
                    .is_some()
            {
                return true;
            }
            let rule = table.rule(&id, &self.registry);
            if rule.shared && self.cache_for(&id).is_shared(&CacheKey::for_rule(&id, &rule)) {
                return true;
            }
            let target = rule.concrete_for(&id);
            if rule.is_alias() && target != id && !visited.contains(&target) {
                visited.push(id);
                id = target;
                continue;
            }
            return self.registry.is_instantiable(&target);
        }
    }

    /// Effective rule for `id` in this view
    pub fn rule(&self, id: impl Into<ServiceId>) -> Arc<BindingRule> {
        self.snapshot().rule(&id.into(), &self.registry)
    }

    /// Drop every shared instance visible from this view
    pub fn unload(&self) {
        let count = self.shared_count();
        self.cache.clear();
        for cache in self.local_caches() {
            cache.clear();
        }
        debug!("Unloaded {} shared instance(s)", count);
    }

    /// Number of shared instances visible from this view
    pub fn shared_count(&self) -> usize {
        self.cache.len()
            + self
                .local_caches()
                .iter()
                .map(|cache| cache.len())
                .sum::<usize>()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.snapshot();
        f.debug_struct("Container")
            .field("rules", &table.ids())
            .field("contexts", &self.view.contexts)
            .field("shared", &self.shared_count())
            .finish()
    }
}
