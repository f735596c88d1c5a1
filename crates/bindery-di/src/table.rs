//! Binding table: service id to rule
//!
//! Tables are cheap to copy (rules are behind `Arc`) and are held by the
//! container behind an `Arc` of their own, so a contextual view copies on write.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::debug;

use crate::error::ContainerResult;
use crate::registry::TypeRegistry;
use crate::rule::BindingRule;
use crate::service_id::ServiceId;
use crate::value::Object;

#[derive(Debug, Clone, PartialEq)]
pub struct BindingTable {
    rules: HashMap<ServiceId, Arc<BindingRule>>,
    default_rule: Arc<BindingRule>,
    /// Instances registered with `instance()` or pinned by a context
    pinned: HashMap<ServiceId, Object>,
    providers: BTreeSet<ServiceId>,
}

impl Default for BindingTable {
    fn default() -> Self {
        Self::new()
    }
}

impl BindingTable {
    pub fn new() -> Self {
        Self {
            rules: HashMap::new(),
            default_rule: Arc::new(BindingRule::default()),
            pinned: HashMap::new(),
            providers: BTreeSet::new(),
        }
    }

    /// Insert or replace the rule for `id`; `"*"` replaces the default rule
    pub fn set_rule(&mut self, id: ServiceId, rule: BindingRule) -> ContainerResult<()> {
        rule.validate()?;
        debug!(
            service = %id,
            concrete = ?rule.target.as_ref().map(ServiceId::as_str),
            shared = rule.shared,
            "Setting binding rule"
        );
        if id.is_default_rule() {
            self.default_rule = Arc::new(rule);
        } else {
            self.rules.insert(id, Arc::new(rule));
        }
        Ok(())
    }

    /// Insert a rule known to be valid, such as a bare redirect
    pub(crate) fn insert_rule(&mut self, id: ServiceId, rule: BindingRule) {
        self.rules.insert(id, Arc::new(rule));
    }

    /// Explicit rule for `id`, if any
    pub fn get_rule(&self, id: &ServiceId) -> Option<Arc<BindingRule>> {
        self.rules.get(id).cloned()
    }

    pub fn has_rule(&self, id: &ServiceId) -> bool {
        self.rules.contains_key(id)
    }

    pub fn remove_rule(&mut self, id: &ServiceId) -> Option<Arc<BindingRule>> {
        self.rules.remove(id)
    }

    /// Effective rule: the explicit rule, else the nearest ancestor's rule
    /// when it has no target and allows inheritance, else the default rule
    pub fn rule(&self, id: &ServiceId, registry: &TypeRegistry) -> Arc<BindingRule> {
        if let Some(rule) = self.rules.get(id) {
            return Arc::clone(rule);
        }
        if !self.rules.is_empty() {
            for ancestor in registry.ancestors(id) {
                if let Some(rule) = self.rules.get(&ancestor) {
                    if rule.target.is_none() && rule.inherit {
                        return Arc::clone(rule);
                    }
                }
            }
        }
        Arc::clone(&self.default_rule)
    }

    pub fn default_rule(&self) -> &BindingRule {
        &self.default_rule
    }

    pub fn default_rule_mut(&mut self) -> &mut BindingRule {
        Arc::make_mut(&mut self.default_rule)
    }

    pub fn pin(&mut self, id: ServiceId, instance: Object) {
        self.pinned.insert(id, instance);
    }

    pub fn unpin(&mut self, id: &ServiceId) -> Option<Object> {
        self.pinned.remove(id)
    }

    pub fn pinned(&self, id: &ServiceId) -> Option<&Object> {
        self.pinned.get(id)
    }

    pub fn mark_provider(&mut self, id: ServiceId) {
        self.providers.insert(id);
    }

    pub fn provider_applied(&self, id: &ServiceId) -> bool {
        self.providers.contains(id)
    }

    pub fn providers(&self) -> impl Iterator<Item = &ServiceId> {
        self.providers.iter()
    }

    /// Number of explicit rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.pinned.is_empty()
    }

    /// Ids with an explicit rule, sorted
    pub fn ids(&self) -> Vec<ServiceId> {
        let mut ids: Vec<ServiceId> = self.rules.keys().cloned().collect();
        ids.sort();
        ids
    }
}
