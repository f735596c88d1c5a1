//! Contextual resolver
//!
//! Entering the context of a class layers the substitutions of that class's
//! rule over the binding table. The result is a new table snapshot; the table
//! it was derived from is never touched.

use std::sync::Arc;

use crate::registry::TypeRegistry;
use crate::rule::{BindingRule, Substitution, SubstitutionKey};
use crate::service_id::ServiceId;
use crate::table::BindingTable;
use crate::value::Value;

/// Table seen while resolving the dependencies of `context`.
///
/// Returns `current` itself (same `Arc`) when the context changes nothing, so
/// callers can detect a no-op entry with `Arc::ptr_eq`.
pub fn contextual_table(
    current: &Arc<BindingTable>,
    registry: &TypeRegistry,
    context: &ServiceId,
) -> Arc<BindingTable> {
    let rule = current.rule(context, registry);
    if rule.substitutions.is_empty() {
        return Arc::clone(current);
    }

    let mut next = Arc::clone(current);
    for (key, substitution) in &rule.substitutions {
        match (key, substitution) {
            (SubstitutionKey::Type(dependency), Substitution::Class(class)) => {
                let effective = next.rule(dependency, registry);
                let overridden = !next.has_rule(dependency)
                    && next
                        .default_rule()
                        .substitution(&SubstitutionKey::Type(dependency.clone()))
                        .is_some();
                let unchanged = effective.resolves_to(dependency, class)
                    && !overridden
                    && next.pinned(dependency).is_none();
                if !unchanged {
                    let table = Arc::make_mut(&mut next);
                    table.insert_rule(dependency.clone(), BindingRule::to(class.clone()));
                    table.unpin(dependency);
                }
            }
            (SubstitutionKey::Type(dependency), Substitution::Instance(instance))
            | (
                SubstitutionKey::Type(dependency),
                Substitution::Value(Value::Object(instance)),
            ) => {
                let unchanged = next
                    .pinned(dependency)
                    .is_some_and(|pinned| pinned.ptr_eq(instance));
                if !unchanged {
                    Arc::make_mut(&mut next).pin(dependency.clone(), instance.clone());
                }
            }
            _ => {
                let unchanged = next.default_rule().substitution(key) == Some(substitution)
                    && key.as_type().map_or(true, |dependency| {
                        !next.has_rule(dependency) && next.pinned(dependency).is_none()
                    });
                if !unchanged {
                    let table = Arc::make_mut(&mut next);
                    table
                        .default_rule_mut()
                        .substitutions
                        .insert(key.clone(), substitution.clone());
                    if let Some(dependency) = key.as_type() {
                        table.remove_rule(dependency);
                        table.unpin(dependency);
                    }
                }
            }
        }
    }

    if !Arc::ptr_eq(&next, current) && *next == **current {
        return Arc::clone(current);
    }
    next
}
