//! Shared instance cache

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::debug;

use crate::rule::BindingRule;
use crate::service_id::ServiceId;
use crate::value::Object;

/// Key of a shared instance
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub service: ServiceId,
    /// Concrete class, only set for rules that disable inheritance
    pub concrete: Option<ServiceId>,
}

impl CacheKey {
    pub fn new(service: impl Into<ServiceId>) -> Self {
        Self {
            service: service.into(),
            concrete: None,
        }
    }

    pub fn for_rule(id: &ServiceId, rule: &BindingRule) -> Self {
        let concrete = rule.concrete_for(id);
        Self {
            service: id.clone(),
            concrete: (!rule.inherit && concrete != *id).then_some(concrete),
        }
    }
}

/// Instances of shared rules, common to every view of one root container
/// except for services a derived view rebinds
#[derive(Debug, Default)]
pub struct InstanceCache {
    instances: RwLock<HashMap<CacheKey, Object>>,
}

impl InstanceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_shared(&self, key: &CacheKey) -> Option<Object> {
        self.instances.read().get(key).cloned()
    }

    /// Store `instance` unless another one won the race; returns the stored one
    pub fn put_shared(&self, key: CacheKey, instance: Object) -> Object {
        self.instances
            .write()
            .entry(key)
            .or_insert(instance)
            .clone()
    }

    pub fn is_shared(&self, key: &CacheKey) -> bool {
        self.instances.read().contains_key(key)
    }

    /// Drop every instance cached for `service`, returning how many were dropped
    pub fn evict(&self, service: &ServiceId) -> usize {
        let mut instances = self.instances.write();
        let before = instances.len();
        instances.retain(|key, _| key.service != *service);
        let evicted = before - instances.len();
        if evicted > 0 {
            debug!("Evicted {} shared instance(s) of {}", evicted, service);
        }
        evicted
    }

    pub fn clear(&self) {
        self.instances.write().clear();
    }

    pub fn len(&self) -> usize {
        self.instances.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.read().is_empty()
    }
}
